use crate::atlas::{Atlas, CountyView, TownView};
use crate::config::AtlasConfig;
use crate::scale::ColorScale;
use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

pub const TOWNS_FILE: &str = "towns.geojson";
pub const COUNTIES_FILE: &str = "counties.geojson";
pub const SERIES_FILE: &str = "series.json";

/// Write paint-ready layers: every feature carries its fill colors.
pub fn generate_layers(config: &AtlasConfig, atlas: &Atlas) -> Result<()> {
    let dir = &config.output.dir;
    fs::create_dir_all(dir).with_context(|| format!("Failed to create output directory: {:?}", dir))?;

    info!("Writing {} towns and {} counties to {:?}", atlas.towns.len(), atlas.counties.len(), dir);
    write_json(&dir.join(TOWNS_FILE), &town_layer(atlas))?;
    write_json(&dir.join(COUNTIES_FILE), &county_layer(atlas))?;
    write_json(&dir.join(SERIES_FILE), &series_table(atlas))?;
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string(value)?;
    fs::write(path, text).with_context(|| format!("Failed to write {:?}", path))
}

pub fn town_layer(atlas: &Atlas) -> FeatureCollection {
    collection(atlas.towns.iter().map(town_feature).collect(), json!({
        "population": legend(atlas.population_scale.domain(), atlas.population_scale.colors().iter().map(|c| c.to_string()).collect()),
        "change": legend(atlas.change_scale.domain(), Vec::new()),
    }))
}

pub fn county_layer(atlas: &Atlas) -> FeatureCollection {
    collection(atlas.counties.iter().map(county_feature).collect(), json!({
        "reference_year": atlas.reference_year,
        "reference": legend(atlas.reference_scale.domain(), Vec::new()),
    }))
}

/// County key to full series, for charts drawn on demand.
pub fn series_table(atlas: &Atlas) -> BTreeMap<String, Value> {
    atlas
        .counties
        .iter()
        .filter_map(|c| c.series.as_ref().map(|s| (c.region.key.clone(), json!(s))))
        .collect()
}

fn legend(domain: Vec<f64>, colors: Vec<String>) -> Value {
    json!({ "domain": domain, "colors": colors })
}

fn collection(features: Vec<Feature>, scales: Value) -> FeatureCollection {
    let mut foreign_members = JsonObject::new();
    foreign_members.insert("scales".to_string(), scales);
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign_members),
    }
}

fn town_feature(town: &TownView) -> Feature {
    let leaf = &town.leaf;
    let properties = json!({
        "id": leaf.id,
        "name": leaf.name,
        "county": leaf.group_key,
        "pop_start": leaf.pop_start,
        "pop_end": leaf.pop_end,
        "change": leaf.change(),
        "population_fill": town.population_fill,
        "change_fill": town.change_fill,
    });
    feature(&leaf.geometry, properties)
}

fn county_feature(county: &CountyView) -> Feature {
    let region = &county.region;
    let properties = json!({
        "key": region.key,
        "join_key": region.join_key,
        "name": region.name,
        "towns": region.members,
        "value": county.reference_value,
        "has_series": county.series.is_some(),
        "fill": county.fill,
    });
    feature(&region.geometry, properties)
}

fn feature(geometry: &geo::MultiPolygon<f64>, properties: Value) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::from(geometry))),
        id: None,
        properties: properties.as_object().cloned(),
        foreign_members: None,
    }
}

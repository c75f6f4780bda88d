use crate::config::{AtlasConfig, FieldConfig};
use crate::error::InputError;
use crate::types::{LeafFeature, TimeSeriesRow};
use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use geo::MultiPolygon;
use geojson::{FeatureCollection, GeoJson};
use serde_json::{Map, Number, Value};
use shapefile::dbase::FieldValue;
use shapefile::Reader;
use std::io::Read;
use std::path::Path;
use topojson::TopoJson;
use tracing::{debug, info};

/// Everything read from disk for one run.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    pub leaves: Vec<LeafFeature>,
    pub rows: Vec<TimeSeriesRow>,
}

/// Load geometry and table concurrently. Either failing fails the whole load.
pub async fn load_inputs(config: &AtlasConfig) -> Result<Inputs> {
    info!("Loading data...");
    let (leaves, rows) = tokio::try_join!(load_geometry(config), load_table(config))?;
    info!("Loaded {} leaf features and {} table rows", leaves.len(), rows.len());
    Ok(Inputs { leaves, rows })
}

async fn load_geometry(config: &AtlasConfig) -> Result<Vec<LeafFeature>> {
    let path = config.input.geometry.clone();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| InputError::MissingExtension(path.clone()))?;

    match extension.as_str() {
        "shp" => {
            let fields = config.fields.clone();
            tokio::task::spawn_blocking(move || load_shapefile(&path, &fields))
                .await
                .context("Shapefile loader task failed")?
        }
        "json" | "geojson" | "topojson" => {
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to open geometry file: {:?}", path))?;
            parse_geometry(&text, config.input.object.as_deref(), &config.fields)
                .with_context(|| format!("Failed to parse geometry file: {:?}", path))
        }
        _ => Err(InputError::UnsupportedFormat(extension).into()),
    }
}

async fn load_table(config: &AtlasConfig) -> Result<Vec<TimeSeriesRow>> {
    let path = &config.input.table;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to open CSV file: {:?}", path))?;
    parse_table(bytes.as_slice(), &config.fields)
        .with_context(|| format!("Failed to parse CSV file: {:?}", path))
}

/// Read the long-format table, keeping the four configured columns as raw text.
pub fn parse_table<R: Read>(reader: R, fields: &FieldConfig) -> Result<Vec<TimeSeriesRow>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}') == name)
            .ok_or_else(|| InputError::MissingColumn(name.to_string()))
    };
    let name_idx = column(&fields.area_name)?;
    let id_idx = column(&fields.area_id)?;
    let year_idx = column(&fields.year)?;
    let value_idx = column(&fields.value)?;

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let cell = |i: usize| record.get(i).unwrap_or("").to_string();
        rows.push(TimeSeriesRow {
            area_name: cell(name_idx),
            id: cell(id_idx),
            year: cell(year_idx),
            value: cell(value_idx),
        });
    }

    Ok(rows)
}

/// Parse a TopoJSON topology or a GeoJSON FeatureCollection.
///
/// For a topology, `object` selects the collection to read; the first one is used when unset.
pub fn parse_geometry(text: &str, object: Option<&str>, fields: &FieldConfig) -> Result<Vec<LeafFeature>> {
    let doc: Value = serde_json::from_str(text).context("Geometry file is not valid JSON")?;

    let collection = if doc.get("type").and_then(Value::as_str) == Some("Topology") {
        let name = topology_object(&doc, object)?;
        topology_features(text, &name)?
    } else {
        feature_collection(doc)?
    };

    features_to_leaves(collection, fields)
}

fn feature_collection(doc: Value) -> Result<FeatureCollection> {
    match GeoJson::from_json_value(doc).context("Failed to parse GeoJSON")? {
        GeoJson::FeatureCollection(fc) => Ok(fc),
        _ => Err(InputError::NotFeatureCollection.into()),
    }
}

/// Name of the topology object to read: the configured one, else the first in document order.
fn topology_object(doc: &Value, object: Option<&str>) -> Result<String> {
    let objects = doc.get("objects").and_then(Value::as_object);
    match object {
        Some(name) => {
            if !objects.is_some_and(|o| o.contains_key(name)) {
                return Err(InputError::MissingObject(name.to_string()).into());
            }
            Ok(name.to_string())
        }
        None => objects
            .and_then(|o| o.keys().next().cloned())
            .ok_or_else(|| InputError::EmptyTopology.into()),
    }
}

fn topology_features(text: &str, name: &str) -> Result<FeatureCollection> {
    let topology = match text.parse::<TopoJson>() {
        Ok(TopoJson::Topology(t)) => t,
        Ok(_) => return Err(anyhow!("TopoJSON document is not a Topology")),
        Err(e) => return Err(anyhow!("Failed to parse TopoJSON: {:?}", e)),
    };
    debug!("Reading topology object '{}'", name);

    let decoded = topojson::to_geojson(&topology, name)
        .map_err(|e| anyhow!("Failed to decode topology object '{}': {:?}", name, e))?;
    // topojson builds on its own geojson release; carry the result over as plain JSON
    let value = serde_json::to_value(&decoded).context("Failed to re-encode topology features")?;
    feature_collection(value)
}

fn features_to_leaves(collection: FeatureCollection, fields: &FieldConfig) -> Result<Vec<LeafFeature>> {
    let mut leaves = Vec::new();

    for (index, feature) in collection.features.into_iter().enumerate() {
        let id = match &feature.id {
            Some(geojson::feature::Id::String(s)) => s.clone(),
            Some(geojson::feature::Id::Number(n)) => n.to_string(),
            None => index.to_string(),
        };

        let geometry = match feature.geometry {
            Some(geom) => {
                let valid_geo: geo::Geometry<f64> = geom
                    .value
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert geojson geometry: {:?}", e))?;

                match valid_geo {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => continue, // Skip points/lines
                }
            }
            None => continue,
        };

        let properties = feature.properties.unwrap_or_default();
        leaves.push(LeafFeature::from_properties(id, properties, geometry, fields));
    }

    Ok(leaves)
}

fn load_shapefile(path: &Path, fields: &FieldConfig) -> Result<Vec<LeafFeature>> {
    info!("Loading Shapefile from {:?}...", path);
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open Shapefile: {:?}", path))?;

    let mut leaves = Vec::new();

    for (index, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result?;

        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygon: {:?}", e))?,
            shapefile::Shape::PolygonM(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygonM: {:?}", e))?,
            shapefile::Shape::PolygonZ(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygonZ: {:?}", e))?,
            _ => continue, // Skip non-polygon shapes
        };

        let properties: Map<String, Value> = record
            .into_iter()
            .map(|(name, value)| (name, field_to_json(value)))
            .collect();

        leaves.push(LeafFeature::from_properties(index.to_string(), properties, geometry, fields));
    }

    Ok(leaves)
}

fn field_to_json(value: FieldValue) -> Value {
    let number = |n: f64| Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null);
    match value {
        FieldValue::Character(Some(s)) => Value::String(s.trim().to_string()),
        FieldValue::Numeric(Some(n)) => number(n),
        FieldValue::Float(Some(f)) => number(f64::from(f)),
        FieldValue::Integer(i) => Value::from(i),
        FieldValue::Double(d) => number(d),
        FieldValue::Currency(c) => number(c),
        FieldValue::Logical(Some(b)) => Value::Bool(b),
        FieldValue::Memo(s) => Value::String(s),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOWNS_GEOJSON: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "id": "agawam",
             "properties": {"TOWN": "AGAWAM", "FIPS_STCO": 25013, "POP1980": 26271, "POP2010": 28438},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
            {"type": "Feature",
             "properties": {"TOWN": "MARKER", "FIPS_STCO": 25013},
             "geometry": {"type": "Point", "coordinates": [0.5, 0.5]}},
            {"type": "Feature",
             "properties": {"TOWN": "EMPTY"},
             "geometry": null}
        ]
    }"#;

    // Two unit squares sharing the arc between (1,0) and (1,1).
    const TOWNS_TOPOJSON: &str = r#"{
        "type": "Topology",
        "objects": {
            "towns": {
                "type": "GeometryCollection",
                "geometries": [
                    {"type": "Polygon", "arcs": [[0, 1]], "properties": {"TOWN": "WEST", "FIPS_STCO": "25013"}},
                    {"type": "Polygon", "arcs": [[2, -1]], "properties": {"TOWN": "EAST", "FIPS_STCO": "25013"}}
                ]
            }
        },
        "arcs": [
            [[1, 0], [1, 1]],
            [[1, 1], [0, 1], [0, 0], [1, 0]],
            [[1, 0], [2, 0], [2, 1], [1, 1]]
        ]
    }"#;

    #[test]
    fn geojson_polygons_only() {
        let leaves = parse_geometry(TOWNS_GEOJSON, None, &FieldConfig::default()).unwrap();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].id, "agawam");
        assert_eq!(leaves[0].name, "AGAWAM");
        assert_eq!(leaves[0].group_key.as_deref(), Some("25013"));
        assert_eq!(leaves[0].pop_end, 28438.0);
    }

    #[test]
    fn geojson_must_be_a_collection() {
        let single = r#"{"type": "Feature", "properties": {}, "geometry": null}"#;
        let err = parse_geometry(single, None, &FieldConfig::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::NotFeatureCollection)));
    }

    #[test]
    fn topology_object_is_decoded() {
        let leaves = parse_geometry(TOWNS_TOPOJSON, None, &FieldConfig::default()).unwrap();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].name, "WEST");
        assert_eq!(leaves[1].group_key.as_deref(), Some("25013"));

        let named = parse_geometry(TOWNS_TOPOJSON, Some("towns"), &FieldConfig::default()).unwrap();
        assert_eq!(named.len(), 2);
    }

    #[test]
    fn first_topology_object_in_document_order() {
        let topology = r#"{
            "type": "Topology",
            "objects": {
                "zeta_towns": {"type": "GeometryCollection", "geometries": [
                    {"type": "Polygon", "arcs": [[0]], "properties": {"TOWN": "FROM_FIRST_OBJECT"}}
                ]},
                "alpha_other": {"type": "GeometryCollection", "geometries": [
                    {"type": "Polygon", "arcs": [[0]], "properties": {"TOWN": "FROM_SECOND_OBJECT"}}
                ]}
            },
            "arcs": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]]
        }"#;
        let leaves = parse_geometry(topology, None, &FieldConfig::default()).unwrap();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].name, "FROM_FIRST_OBJECT");

        let chosen = parse_geometry(topology, Some("alpha_other"), &FieldConfig::default()).unwrap();
        assert_eq!(chosen[0].name, "FROM_SECOND_OBJECT");
    }

    #[test]
    fn topology_without_objects() {
        let empty = r#"{"type": "Topology", "objects": {}, "arcs": []}"#;
        let err = parse_geometry(empty, None, &FieldConfig::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::EmptyTopology)));
    }

    #[test]
    fn missing_topology_object() {
        let err = parse_geometry(TOWNS_TOPOJSON, Some("counties"), &FieldConfig::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::MissingObject(name)) if name == "counties"));
    }

    #[test]
    fn table_reads_configured_columns() {
        let csv = "id,Geographic Area Name,year,Estimate!!Gini Index,extra\n\
                   25013,\"Hampden County, Massachusetts\",2019,0.47,x\n\
                   25013,\"Hampden County, Massachusetts\",2018,,x\n";
        let rows = parse_table(csv.as_bytes(), &FieldConfig::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].area_name, "Hampden County, Massachusetts");
        assert_eq!(rows[0].id, "25013");
        assert_eq!(rows[0].value, "0.47");
        assert_eq!(rows[1].value, "");
    }

    #[test]
    fn table_missing_column() {
        let csv = "id,year,value\n1,2019,0.4\n";
        let err = parse_table(csv.as_bytes(), &FieldConfig::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::MissingColumn(c)) if c == "Geographic Area Name"));
    }

    #[test]
    fn dbase_values_map_to_json() {
        assert_eq!(field_to_json(FieldValue::Character(Some(" LENOX ".into()))), Value::from("LENOX"));
        assert_eq!(field_to_json(FieldValue::Character(None)), Value::Null);
        assert_eq!(field_to_json(FieldValue::Numeric(Some(25003.0))), serde_json::json!(25003.0));
        assert_eq!(field_to_json(FieldValue::Integer(7)), Value::from(7));
    }
}

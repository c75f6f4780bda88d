//! Binds towns and counties to their values and colors.

use crate::aggregate::aggregate;
use crate::color::{blues, Rgb};
use crate::config::AtlasConfig;
use crate::data::Inputs;
use crate::normalize::{coerce_number, index_name, town_key};
use crate::resolve::Resolver;
use crate::scale::{ColorScale, DivergingScale, QuantizeScale, SequentialScale};
use crate::series::SeriesIndex;
use crate::types::{LeafFeature, NumericKey, Region, TimeSeries};
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone)]
pub struct TownView {
    pub leaf: LeafFeature,
    pub population_fill: Rgb,
    pub change_fill: Rgb,
}

#[derive(Debug, Clone)]
pub struct CountyView {
    pub region: Region,
    pub series: Option<TimeSeries>,
    pub reference_value: Option<f64>,
    pub fill: Rgb,
}

#[derive(Debug, Clone)]
pub struct Atlas {
    pub towns: Vec<TownView>,
    pub counties: Vec<CountyView>,
    pub population_scale: QuantizeScale,
    pub change_scale: DivergingScale,
    pub reference_scale: SequentialScale,
    pub reference_year: f64,
    state_suffix: String,
    town_by_name: HashMap<String, usize>,
    county_by_key: HashMap<NumericKey, usize>,
    county_by_name: HashMap<String, usize>,
}

impl Atlas {
    /// Run the whole integration: aggregate, index, resolve, then color.
    pub fn build(config: &AtlasConfig, inputs: Inputs) -> Self {
        let Inputs { leaves, rows } = inputs;
        let suffix = config.join.state_suffix.as_str();
        let year = config.join.reference_year;
        let no_data = config.style.no_data;

        let regions = aggregate(&leaves, &config.fields);
        let index = SeriesIndex::build(rows, suffix);
        info!(
            "Indexed {} series by id and {} by name",
            index.key_count(),
            index.name_count()
        );
        let resolver = Resolver::new(&index, suffix);

        let population_scale = QuantizeScale::from_values(
            leaves.iter().map(|l| l.pop_start),
            blues(config.style.quantize_steps),
        );
        let change_scale = DivergingScale::from_values(leaves.iter().map(LeafFeature::change));

        let resolved: Vec<(Region, Option<TimeSeries>)> = regions
            .into_vec()
            .into_iter()
            .map(|region| {
                let series = resolver.resolve(&region).cloned();
                (region, series)
            })
            .collect();

        let reference_scale = SequentialScale::from_values(
            resolved
                .iter()
                .filter_map(|(_, s)| s.as_ref().and_then(|s| s.value_at(year))),
        );

        let counties: Vec<CountyView> = resolved
            .into_iter()
            .map(|(region, series)| {
                let reference_value = series.as_ref().and_then(|s| s.value_at(year));
                let fill = reference_value
                    .and_then(|v| reference_scale.color(v))
                    .unwrap_or(no_data);
                CountyView {
                    region,
                    series,
                    reference_value,
                    fill,
                }
            })
            .collect();
        let matched = counties.iter().filter(|c| c.series.is_some()).count();
        info!("Resolved series for {} of {} counties", matched, counties.len());

        let towns: Vec<TownView> = leaves
            .into_iter()
            .map(|leaf| TownView {
                population_fill: population_scale.color(leaf.pop_start).unwrap_or(no_data),
                change_fill: change_scale.color(leaf.change()).unwrap_or(no_data),
                leaf,
            })
            .collect();

        let town_by_name = towns
            .iter()
            .enumerate()
            .map(|(i, t)| (town_key(&t.leaf.name), i))
            .collect();
        let county_by_key = counties
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.region.join_key.map(|k| (k, i)))
            .collect();
        let county_by_name = counties
            .iter()
            .enumerate()
            .map(|(i, c)| (index_name(&c.region.name, suffix), i))
            .collect();

        Self {
            towns,
            counties,
            population_scale,
            change_scale,
            reference_scale,
            reference_year: year,
            state_suffix: suffix.to_string(),
            town_by_name,
            county_by_key,
            county_by_name,
        }
    }

    /// County by numeric key, or by name when the key is not a number.
    pub fn lookup_county(&self, key: &str) -> Option<&CountyView> {
        let by_key = coerce_number(key)
            .and_then(NumericKey::from_f64)
            .and_then(|k| self.county_by_key.get(&k));
        by_key
            .or_else(|| self.county_by_name.get(&index_name(key, &self.state_suffix)))
            .map(|&i| &self.counties[i])
    }

    pub fn lookup_town(&self, name: &str) -> Option<&TownView> {
        self.town_by_name.get(&town_key(name)).map(|&i| &self.towns[i])
    }
}

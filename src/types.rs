use crate::config::FieldConfig;
use crate::normalize::{coerce_number, key_string, present_text};
use geo::MultiPolygon;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Numeric join key. Stored as the bit pattern of a finite `f64` so it can be hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NumericKey(u64);

impl NumericKey {
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        // -0.0 and 0.0 must hash alike
        let value = if value == 0.0 { 0.0 } else { value };
        Some(Self(value.to_bits()))
    }

    pub fn parse(raw: &str) -> Option<Self> {
        coerce_number(raw).and_then(Self::from_f64)
    }

    pub fn value(self) -> f64 {
        f64::from_bits(self.0)
    }
}

impl fmt::Display for NumericKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl Serialize for NumericKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.value())
    }
}

/// A town-level polygon with its attributes, as loaded.
#[derive(Debug, Clone)]
pub struct LeafFeature {
    pub id: String,
    pub name: String,
    pub group_key: Option<String>,
    pub pop_start: f64,
    pub pop_end: f64,
    pub properties: Map<String, Value>,
    pub geometry: MultiPolygon<f64>,
}

impl LeafFeature {
    /// Build a leaf from a raw properties bag, reading attributes through the configured field names.
    ///
    /// Missing or non-numeric population fields read as 0.
    pub fn from_properties(
        id: String,
        properties: Map<String, Value>,
        geometry: MultiPolygon<f64>,
        fields: &FieldConfig,
    ) -> Self {
        let group_key = properties.get(&fields.group_key).and_then(key_string);
        let name = properties
            .get(&fields.town_name)
            .and_then(present_text)
            .unwrap_or_else(|| "Unknown".to_string());
        let pop_start = population(&properties, &fields.pop_start);
        let pop_end = population(&properties, &fields.pop_end);

        Self {
            id,
            name,
            group_key,
            pop_start,
            pop_end,
            properties,
            geometry,
        }
    }

    pub fn change(&self) -> f64 {
        self.pop_end - self.pop_start
    }
}

fn population(properties: &Map<String, Value>, field: &str) -> f64 {
    properties
        .get(field)
        .and_then(key_string)
        .and_then(|s| coerce_number(&s))
        .unwrap_or(0.0)
}

/// A county built from every leaf sharing one group key.
#[derive(Debug, Clone)]
pub struct Region {
    /// Group key as it appeared on the leaves.
    pub key: String,
    pub join_key: Option<NumericKey>,
    pub name: String,
    pub members: usize,
    pub geometry: MultiPolygon<f64>,
}

/// Regions in first-encounter order plus a keyed view over their numeric join keys.
#[derive(Debug, Clone, Default)]
pub struct RegionSet {
    regions: Vec<Region>,
    by_key: HashMap<NumericKey, usize>,
}

impl RegionSet {
    pub fn new(regions: Vec<Region>) -> Self {
        // Keys that coerce to the same number collide here; the later region wins.
        let by_key = regions
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.join_key.map(|k| (k, i)))
            .collect();
        Self { regions, by_key }
    }

    pub fn get(&self, key: NumericKey) -> Option<&Region> {
        self.by_key.get(&key).map(|&i| &self.regions[i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Region> {
        self.regions.iter()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn into_vec(self) -> Vec<Region> {
        self.regions
    }
}

/// One raw line of the long-format table.
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesRow {
    pub area_name: String,
    pub id: String,
    pub year: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    pub year: f64,
    pub value: f64,
}

/// Observations for one entity, ascending by year.
///
/// Equal years keep the order in which they arrived.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TimeSeries(Vec<Observation>);

impl TimeSeries {
    pub fn from_unsorted(mut observations: Vec<Observation>) -> Self {
        // sort_by is stable
        observations.sort_by(|a, b| a.year.total_cmp(&b.year));
        Self(observations)
    }

    pub fn observations(&self) -> &[Observation] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value recorded for exactly `year`. The first match wins when a year repeats.
    pub fn value_at(&self, year: f64) -> Option<f64> {
        self.0.iter().find(|o| o.year == year).map(|o| o.value)
    }

    pub fn latest(&self) -> Option<&Observation> {
        self.0.last()
    }
}

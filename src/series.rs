//! Lookup indices over the long-format table.

use crate::normalize::{coerce_number, index_name};
use crate::types::{NumericKey, Observation, TimeSeries, TimeSeriesRow};
use std::collections::HashMap;
use std::hash::Hash;
use tracing::debug;

/// Per-entity series keyed by numeric id and by normalized name.
///
/// A row with a valid year and value lands in both indices when it has both a
/// numeric id and a non-empty name, so the two views of one entity agree.
#[derive(Debug, Clone, Default)]
pub struct SeriesIndex {
    by_numeric_key: HashMap<NumericKey, TimeSeries>,
    by_normalized_name: HashMap<String, TimeSeries>,
    dropped_rows: usize,
}

impl SeriesIndex {
    pub fn build<I>(rows: I, state_suffix: &str) -> Self
    where
        I: IntoIterator<Item = TimeSeriesRow>,
    {
        let mut by_key: HashMap<NumericKey, Vec<Observation>> = HashMap::new();
        let mut by_name: HashMap<String, Vec<Observation>> = HashMap::new();
        let mut dropped_rows = 0;

        for row in rows {
            let (Some(year), Some(value)) = (coerce_number(&row.year), coerce_number(&row.value)) else {
                dropped_rows += 1;
                continue;
            };
            let observation = Observation { year, value };

            if let Some(key) = NumericKey::parse(&row.id) {
                by_key.entry(key).or_default().push(observation);
            }
            let name = index_name(&row.area_name, state_suffix);
            if !name.is_empty() {
                by_name.entry(name).or_default().push(observation);
            }
        }

        if dropped_rows > 0 {
            debug!("Dropped {} rows without a finite year and value", dropped_rows);
        }

        Self {
            by_numeric_key: finish(by_key),
            by_normalized_name: finish(by_name),
            dropped_rows,
        }
    }

    pub fn by_key(&self, key: NumericKey) -> Option<&TimeSeries> {
        self.by_numeric_key.get(&key)
    }

    /// Look up an already-normalized, lower-cased name.
    pub fn by_name(&self, name: &str) -> Option<&TimeSeries> {
        self.by_normalized_name.get(name)
    }

    pub fn numeric_keys(&self) -> impl Iterator<Item = &NumericKey> {
        self.by_numeric_key.keys()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.by_normalized_name.keys()
    }

    pub fn key_count(&self) -> usize {
        self.by_numeric_key.len()
    }

    pub fn name_count(&self) -> usize {
        self.by_normalized_name.len()
    }

    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }
}

// Sorting happens once here, after every row is grouped.
fn finish<K: Eq + Hash>(groups: HashMap<K, Vec<Observation>>) -> HashMap<K, TimeSeries> {
    groups
        .into_iter()
        .map(|(k, obs)| (k, TimeSeries::from_unsorted(obs)))
        .collect()
}

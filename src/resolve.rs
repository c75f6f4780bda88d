use crate::normalize::index_name;
use crate::series::SeriesIndex;
use crate::types::{Region, TimeSeries};

/// Binds regions to their series: numeric key first, then normalized display name.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    index: &'a SeriesIndex,
    state_suffix: &'a str,
}

impl<'a> Resolver<'a> {
    pub fn new(index: &'a SeriesIndex, state_suffix: &'a str) -> Self {
        Self {
            index,
            state_suffix,
        }
    }

    pub fn resolve(&self, region: &Region) -> Option<&'a TimeSeries> {
        region
            .join_key
            .and_then(|key| self.index.by_key(key))
            .or_else(|| self.resolve_name(&region.name))
    }

    /// Look up a free-text name, normalizing it the way the table names were.
    pub fn resolve_name(&self, name: &str) -> Option<&'a TimeSeries> {
        self.index.by_name(&index_name(name, self.state_suffix))
    }

    /// The region's value for exactly `year`, if it has one.
    pub fn value_at(&self, region: &Region, year: f64) -> Option<f64> {
        self.resolve(region).and_then(|series| series.value_at(year))
    }
}

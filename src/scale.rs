//! Value to color mappings built once from the observed values.
//!
//! Every scale fixes its domain at construction. Non-finite inputs map to `None`;
//! finite inputs outside the domain clamp to its nearest end.

use crate::color::{interpolate_rd_bu, interpolate_sinebow, Rgb};

/// Domain used when no finite value was observed.
pub const FALLBACK_DOMAIN: (f64, f64) = (0.0, 1.0);

pub trait ColorScale {
    fn color(&self, value: f64) -> Option<Rgb>;

    /// Domain breakpoints, ascending.
    fn domain(&self) -> Vec<f64>;
}

/// Min and max over the finite values, or `None` if there are none.
pub fn extent<I: IntoIterator<Item = f64>>(values: I) -> Option<(f64, f64)> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Equal-width buckets over [min, max], one palette color each.
#[derive(Debug, Clone)]
pub struct QuantizeScale {
    min: f64,
    max: f64,
    colors: Vec<Rgb>,
    thresholds: Vec<f64>,
}

impl QuantizeScale {
    pub fn new(min: f64, max: f64, colors: Vec<Rgb>) -> Self {
        let n = colors.len();
        let thresholds = (1..n)
            .map(|i| (i as f64 * max + (n - i) as f64 * min) / n as f64)
            .collect();
        Self {
            min,
            max,
            colors,
            thresholds,
        }
    }

    pub fn from_values<I: IntoIterator<Item = f64>>(values: I, colors: Vec<Rgb>) -> Self {
        let (min, max) = extent(values).unwrap_or(FALLBACK_DOMAIN);
        Self::new(min, max, colors)
    }

    /// Lower bound of every bucket after the first.
    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    fn bucket(&self, value: f64) -> usize {
        // number of thresholds at or below the value
        self.thresholds.partition_point(|&t| t <= value)
    }
}

impl ColorScale for QuantizeScale {
    fn color(&self, value: f64) -> Option<Rgb> {
        if !value.is_finite() {
            return None;
        }
        self.colors.get(self.bucket(value)).copied()
    }

    fn domain(&self) -> Vec<f64> {
        vec![self.min, self.max]
    }
}

/// Symmetric scale over [-M, 0, M] centred on the palette midpoint.
#[derive(Debug, Clone, Copy)]
pub struct DivergingScale {
    max_abs: f64,
}

impl DivergingScale {
    pub fn new(max_abs: f64) -> Self {
        let max_abs = if max_abs.is_finite() && max_abs > 0.0 {
            max_abs
        } else {
            1.0
        };
        Self { max_abs }
    }

    /// M is the largest absolute finite value, or 1 if that is missing or zero.
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let max_abs = values
            .into_iter()
            .filter(|v| v.is_finite())
            .map(f64::abs)
            .fold(0.0, f64::max);
        Self::new(max_abs)
    }

    pub fn max_abs(&self) -> f64 {
        self.max_abs
    }

    fn position(&self, value: f64) -> f64 {
        (0.5 + 0.5 * value / self.max_abs).clamp(0.0, 1.0)
    }
}

impl ColorScale for DivergingScale {
    fn color(&self, value: f64) -> Option<Rgb> {
        if !value.is_finite() {
            return None;
        }
        Some(interpolate_rd_bu(self.position(value)))
    }

    fn domain(&self) -> Vec<f64> {
        vec![-self.max_abs, 0.0, self.max_abs]
    }
}

/// Continuous scale over [min, max].
#[derive(Debug, Clone, Copy)]
pub struct SequentialScale {
    min: f64,
    max: f64,
}

impl SequentialScale {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Domain from the finite values; [`FALLBACK_DOMAIN`] when there are none.
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let (min, max) = extent(values).unwrap_or(FALLBACK_DOMAIN);
        Self::new(min, max)
    }

    fn position(&self, value: f64) -> f64 {
        if self.max == self.min {
            return 0.5;
        }
        ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
    }
}

impl ColorScale for SequentialScale {
    fn color(&self, value: f64) -> Option<Rgb> {
        if !value.is_finite() {
            return None;
        }
        Some(interpolate_sinebow(self.position(value)))
    }

    fn domain(&self) -> Vec<f64> {
        vec![self.min, self.max]
    }
}

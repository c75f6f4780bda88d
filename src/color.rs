//! Colors and the fixed palettes the scales draw from.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Fill for regions without data.
    pub const NO_DATA: Rgb = Rgb::new(0x30, 0x3b, 0x78);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `rrggbb`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self { r, g, b })
    }

    fn from_channels(r: f64, g: f64, b: f64) -> Self {
        Self {
            r: channel(r),
            g: channel(g),
            b: channel(b),
        }
    }
}

fn channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rgb::from_hex(&value).ok_or_else(|| format!("invalid hex color '{value}'"))
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

/// Concatenated 6-digit hex colors, light to dark, for 3 to 9 steps.
const BLUES: [&str; 7] = [
    "deebf79ecae13182bd",
    "eff3ffbdd7e76baed62171b5",
    "eff3ffbdd7e76baed63182bd08519c",
    "eff3ffc6dbef9ecae16baed63182bd08519c",
    "eff3ffc6dbef9ecae16baed64292c62171b5084594",
    "f7fbffdeebf7c6dbef9ecae16baed64292c62171b5084594",
    "f7fbffdeebf7c6dbef9ecae16baed64292c62171b508519c08306b",
];

const RD_BU: &str = "67001fb2182bd6604df4a582fddbc7f7f7f7d1e5f092c5de4393c32166ac053061";

fn decode_scheme(packed: &str) -> Vec<Rgb> {
    packed
        .as_bytes()
        .chunks(6)
        .filter_map(|c| std::str::from_utf8(c).ok().and_then(Rgb::from_hex))
        .collect()
}

/// Discrete Blues palette. `steps` is clamped to 3..=9.
pub fn blues(steps: usize) -> Vec<Rgb> {
    let steps = steps.clamp(3, 9);
    decode_scheme(BLUES[steps - 3])
}

/// Red to blue through near-white at 0.5. `t` is clamped to [0, 1].
pub fn interpolate_rd_bu(t: f64) -> Rgb {
    let stops = decode_scheme(RD_BU);
    basis_ramp(&stops, t)
}

/// Cyclic rainbow with even perceived brightness changes.
pub fn interpolate_sinebow(t: f64) -> Rgb {
    let t = (0.5 - t.clamp(0.0, 1.0)) * PI;
    let sq = |x: f64| {
        let s = x.sin();
        255.0 * s * s
    };
    Rgb::from_channels(sq(t), sq(t + PI / 3.0), sq(t + 2.0 * PI / 3.0))
}

/// Uniform cubic B-spline through `stops`, per channel.
fn basis_ramp(stops: &[Rgb], t: f64) -> Rgb {
    match stops.len() {
        0 => return Rgb::NO_DATA,
        1 => return stops[0],
        _ => {}
    }
    let n = stops.len() - 1;
    let pick = |f: fn(&Rgb) -> u8| -> Vec<f64> { stops.iter().map(|c| f64::from(f(c))).collect() };
    let r = basis(&pick(|c| c.r), n, t);
    let g = basis(&pick(|c| c.g), n, t);
    let b = basis(&pick(|c| c.b), n, t);
    Rgb::from_channels(r, g, b)
}

fn basis(values: &[f64], n: usize, t: f64) -> f64 {
    let (t, i) = if t <= 0.0 {
        (0.0, 0)
    } else if t >= 1.0 {
        (1.0, n - 1)
    } else {
        (t, ((t * n as f64).floor() as usize).min(n - 1))
    };
    let v1 = values[i];
    let v2 = values[i + 1];
    let v0 = if i > 0 { values[i - 1] } else { 2.0 * v1 - v2 };
    let v3 = if i < n - 1 { values[i + 2] } else { 2.0 * v2 - v1 };
    let t1 = (t - i as f64 / n as f64) * n as f64;
    let t2 = t1 * t1;
    let t3 = t2 * t1;
    ((1.0 - 3.0 * t1 + 3.0 * t2 - t3) * v0
        + (4.0 - 6.0 * t2 + 3.0 * t3) * v1
        + (1.0 + 3.0 * t1 + 3.0 * t2 - 3.0 * t3) * v2
        + t3 * v3)
        / 6.0
}

use crate::color::Rgb;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AtlasConfig {
    pub input: InputConfig,
    pub fields: FieldConfig,
    pub join: JoinConfig,
    pub style: StyleConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputConfig {
    /// TopoJSON, GeoJSON or Shapefile of the leaf polygons.
    pub geometry: PathBuf,
    /// Long-format CSV of (area, id, year, value).
    pub table: PathBuf,
    /// Topology object to read. Defaults to the first one.
    pub object: Option<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            geometry: PathBuf::from("data/towns.topojson"),
            table: PathBuf::from("data/gini_index.csv"),
            object: None,
        }
    }
}

/// Names of every attribute read from the two inputs.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FieldConfig {
    pub group_key: String,
    pub town_name: String,
    pub county_name: String,
    pub county_alt: String,
    pub pop_start: String,
    pub pop_end: String,
    pub area_name: String,
    pub area_id: String,
    pub value: String,
    pub year: String,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            group_key: "FIPS_STCO".into(),
            town_name: "TOWN".into(),
            county_name: "COUNTYNAME".into(),
            county_alt: "COUNTY".into(),
            pop_start: "POP1980".into(),
            pop_end: "POP2010".into(),
            area_name: "Geographic Area Name".into(),
            area_id: "id".into(),
            value: "Estimate!!Gini Index".into(),
            year: "year".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct JoinConfig {
    /// Trailing `, <name>` clause stripped from table area names.
    pub state_suffix: String,
    /// Year whose value colors the regions.
    pub reference_year: f64,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            state_suffix: "Massachusetts".into(),
            reference_year: 2019.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StyleConfig {
    /// Number of Blues steps for the population map, 3 to 9.
    pub quantize_steps: usize,
    pub no_data: Rgb,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            quantize_steps: 7,
            no_data: Rgb::NO_DATA,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl AtlasConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AtlasConfig =
            toml::from_str(content).with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}

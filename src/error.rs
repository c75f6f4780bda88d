use std::path::PathBuf;
use thiserror::Error;

/// Ways an input file can be unusable.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("input geometry file has no extension: {0:?}")]
    MissingExtension(PathBuf),
    #[error("unsupported geometry format: {0}")]
    UnsupportedFormat(String),
    #[error("topology has no objects")]
    EmptyTopology,
    #[error("topology has no object named '{0}'")]
    MissingObject(String),
    #[error("GeoJSON must be a FeatureCollection")]
    NotFeatureCollection,
    #[error("column '{0}' not found in table")]
    MissingColumn(String),
}

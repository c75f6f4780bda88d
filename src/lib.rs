//! Aggregates town polygons into counties and joins long-format statistics onto
//! them, producing colored layers for choropleth maps.

pub mod aggregate;
pub mod atlas;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod normalize;
pub mod render;
pub mod resolve;
pub mod scale;
pub mod series;
pub mod server;
pub mod types;

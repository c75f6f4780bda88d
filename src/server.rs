use crate::atlas::{Atlas, CountyView, TownView};
use crate::color::Rgb;
use crate::config::AtlasConfig;
use crate::types::{NumericKey, TimeSeries};
use anyhow::Result;
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use geo::{BoundingRect, Contains, MultiPolygon, Point};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

// Wrapper for RTree indexing
pub struct FeatureIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for FeatureIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

fn build_tree<'a, I>(geometries: I) -> RTree<FeatureIndex>
where
    I: Iterator<Item = &'a MultiPolygon<f64>>,
{
    let items: Vec<FeatureIndex> = geometries
        .enumerate()
        // empty geometries have no bounds and can never contain a point
        .filter_map(|(index, geometry)| {
            geometry.bounding_rect().map(|rect| FeatureIndex {
                index,
                aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
            })
        })
        .collect();
    RTree::bulk_load(items)
}

pub struct AppState {
    pub atlas: Atlas,
    pub towns: RTree<FeatureIndex>,
    pub counties: RTree<FeatureIndex>,
}

impl AppState {
    pub fn new(atlas: Atlas) -> Self {
        info!("Building spatial index for API...");
        let towns = build_tree(atlas.towns.iter().map(|t| &t.leaf.geometry));
        let counties = build_tree(atlas.counties.iter().map(|c| &c.region.geometry));
        Self {
            atlas,
            towns,
            counties,
        }
    }

    pub fn town_at(&self, point: Point<f64>) -> Option<&TownView> {
        locate(&self.towns, point, |i| &self.atlas.towns[i].leaf.geometry).map(|i| &self.atlas.towns[i])
    }

    pub fn county_at(&self, point: Point<f64>) -> Option<&CountyView> {
        locate(&self.counties, point, |i| &self.atlas.counties[i].region.geometry)
            .map(|i| &self.atlas.counties[i])
    }
}

fn locate<'a, F>(tree: &RTree<FeatureIndex>, point: Point<f64>, geometry: F) -> Option<usize>
where
    F: Fn(usize) -> &'a MultiPolygon<f64>,
{
    let envelope = AABB::from_point([point.x(), point.y()]);
    tree.locate_in_envelope_intersecting(&envelope)
        .map(|candidate| candidate.index)
        .find(|&i| geometry(i).contains(&point))
}

#[derive(Deserialize)]
pub struct PointParams {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize)]
pub struct KeyParams {
    key: String,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct TownSummary {
    id: String,
    name: String,
    pop_start: f64,
    pop_end: f64,
    change: f64,
    population_fill: Rgb,
    change_fill: Rgb,
}

impl From<&TownView> for TownSummary {
    fn from(town: &TownView) -> Self {
        Self {
            id: town.leaf.id.clone(),
            name: town.leaf.name.clone(),
            pop_start: town.leaf.pop_start,
            pop_end: town.leaf.pop_end,
            change: town.leaf.change(),
            population_fill: town.population_fill,
            change_fill: town.change_fill,
        }
    }
}

#[derive(Serialize, Debug, PartialEq)]
pub struct CountySummary {
    key: String,
    join_key: Option<NumericKey>,
    name: String,
    fill: Rgb,
    year: f64,
    value: Option<f64>,
    series: Option<TimeSeries>,
}

impl CountySummary {
    fn new(county: &CountyView, year: f64) -> Self {
        Self {
            key: county.region.key.clone(),
            join_key: county.region.join_key,
            name: county.region.name.clone(),
            fill: county.fill,
            year,
            value: county.reference_value,
            series: county.series.clone(),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct QueryResponse {
    town: Option<TownSummary>,
    county: Option<CountySummary>,
}

pub fn router(state: Arc<AppState>, data_dir: &std::path::Path) -> Router {
    Router::new()
        .route("/api/query", get(query_handler))
        .route("/api/county", get(county_handler))
        .nest_service("/data", ServeDir::new(data_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AtlasConfig, atlas: Atlas) -> Result<()> {
    let state = Arc::new(AppState::new(atlas));
    info!("Spatial index built.");

    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    info!("Starting server on http://{}", addr);

    let app = router(state, &config.output.dir);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn query_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PointParams>,
) -> Json<QueryResponse> {
    let point = Point::new(params.lon, params.lat);
    let year = state.atlas.reference_year;

    Json(QueryResponse {
        town: state.town_at(point).map(TownSummary::from),
        county: state.county_at(point).map(|c| CountySummary::new(c, year)),
    })
}

async fn county_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<KeyParams>,
) -> Json<Option<CountySummary>> {
    let year = state.atlas.reference_year;
    Json(
        state
            .atlas
            .lookup_county(&params.key)
            .map(|c| CountySummary::new(c, year)),
    )
}

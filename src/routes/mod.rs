// HTTP routes: ingestion, chart queries, baselines and on-demand roll-up

mod http;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::aggregation_worker::AggregationRunner;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) runner: Arc<AggregationRunner>,
}

pub fn app(runner: Arc<AggregationRunner>) -> Router {
    let state = AppState { runner };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/metrics/raw", post(http::add_numeric_data_handler)) // POST /api/metrics/raw
        .route("/api/metrics/group", post(http::group_data_handler)) // POST /api/metrics/group
        .route("/api/metrics/{schedule_id}", get(http::resource_data_handler)) // GET /api/metrics/{id}
        .route(
            "/api/metrics/{schedule_id}/summary",
            get(http::summary_handler),
        ) // GET /api/metrics/{id}/summary
        .route("/api/baselines", post(http::baselines_handler)) // POST /api/baselines
        .route("/api/aggregates", post(http::calculate_aggregates_handler)) // POST /api/aggregates
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

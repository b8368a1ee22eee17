// JSON handlers. Validation errors map to 400, storage errors to 503.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::MetricsError;
use crate::models::{RawNumericMetric, ScheduleRef};
use crate::version::{NAME, VERSION};

impl IntoResponse for MetricsError {
    fn into_response(self) -> Response {
        let status = if self.is_transient() {
            tracing::warn!(error = %self, "request failed on storage");
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::BAD_REQUEST
        };
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct RangeQuery {
    begin: i64,
    end: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct GroupRequest {
    schedule_ids: Vec<i32>,
    begin: i64,
    end: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BaselineRequest {
    schedule_ids: Vec<i32>,
    start_time: i64,
    end_time: i64,
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    written: Vec<RawNumericMetric>,
}

/// GET /version: service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// POST /api/metrics/raw: returns the samples that were durably written.
pub(super) async fn add_numeric_data_handler(
    State(state): State<AppState>,
    Json(samples): Json<Vec<RawNumericMetric>>,
) -> Result<impl IntoResponse, MetricsError> {
    let written = state.runner.server().add_numeric_data(&samples).await?;
    Ok(Json(IngestResponse { written }))
}

/// GET /api/metrics/{schedule_id}?begin=&end=: 60 chart points; no data is null.
pub(super) async fn resource_data_handler(
    State(state): State<AppState>,
    Path(schedule_id): Path<i32>,
    Query(range): Query<RangeQuery>,
) -> Result<impl IntoResponse, MetricsError> {
    let points = state
        .runner
        .server()
        .find_data_for_resource(schedule_id, range.begin, range.end)
        .await?;
    Ok(Json(points))
}

/// GET /api/metrics/{schedule_id}/summary?begin=&end=
pub(super) async fn summary_handler(
    State(state): State<AppState>,
    Path(schedule_id): Path<i32>,
    Query(range): Query<RangeQuery>,
) -> Result<impl IntoResponse, MetricsError> {
    let summary = state
        .runner
        .server()
        .get_summary_aggregate(schedule_id, range.begin, range.end)
        .await?;
    Ok(Json(summary))
}

/// POST /api/metrics/group
pub(super) async fn group_data_handler(
    State(state): State<AppState>,
    Json(req): Json<GroupRequest>,
) -> Result<impl IntoResponse, MetricsError> {
    let points = state
        .runner
        .server()
        .find_data_for_group(&req.schedule_ids, req.begin, req.end)
        .await?;
    Ok(Json(points))
}

/// POST /api/baselines
pub(super) async fn baselines_handler(
    State(state): State<AppState>,
    Json(req): Json<BaselineRequest>,
) -> Result<impl IntoResponse, MetricsError> {
    let schedules: Vec<ScheduleRef> = req.schedule_ids.into_iter().map(ScheduleRef::from).collect();
    let baselines = state
        .runner
        .server()
        .calculate_baselines(&schedules, req.start_time, req.end_time)
        .await?;
    Ok(Json(baselines))
}

/// POST /api/aggregates: one roll-up pass now; waits for a scheduled pass in progress.
pub(super) async fn calculate_aggregates_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, MetricsError> {
    let report = state.runner.run_once().await?;
    Ok(Json(report))
}

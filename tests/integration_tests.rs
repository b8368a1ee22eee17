// Integration tests: HTTP endpoints over a temp store and a pinned clock

mod common;

use std::sync::Arc;

use axum_test::TestServer;
use common::{TestEnv, hour, minutes, test_env};
use rhq_metrics::aggregation_worker::AggregationRunner;
use rhq_metrics::models::Resolution;
use rhq_metrics::routes;
use serde_json::{Value, json};

async fn test_server(now_ms: i64) -> (TestServer, TestEnv) {
    let env = test_env(now_ms).await;
    let runner = Arc::new(AggregationRunner::new(env.server.clone()));
    let server = TestServer::new(routes::app(runner));
    (server, env)
}

#[tokio::test]
async fn test_version_endpoint() {
    let (server, _env) = test_server(hour(4)).await;
    let response = server.get("/version").await;
    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(
        json.get("name").and_then(|v| v.as_str()),
        Some("rhq-metrics")
    );
    assert!(json.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_ingest_returns_written_samples() {
    let (server, env) = test_server(hour(4)).await;
    let response = server
        .post("/api/metrics/raw")
        .json(&json!([
            { "scheduleId": 5, "timestamp": hour(1), "value": 1.5 },
            { "scheduleId": 5, "timestamp": hour(2), "value": 2.5 }
        ]))
        .await;
    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["written"].as_array().map(|a| a.len()), Some(2));
    assert_eq!(json["written"][0]["scheduleId"], 5);

    assert_eq!(env.store.list_dirty(Resolution::OneHour).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_ingest_rejects_invalid_schedule() {
    let (server, _env) = test_server(hour(4)).await;
    let response = server
        .post("/api/metrics/raw")
        .json(&json!([{ "scheduleId": 0, "timestamp": hour(1), "value": 1.0 }]))
        .await;
    response.assert_status_bad_request();
    let json: Value = response.json();
    assert!(json["error"].as_str().unwrap().contains("schedule id"));
}

#[tokio::test]
async fn test_series_endpoint_returns_sixty_points_with_nulls() {
    let (server, env) = test_server(hour(4)).await;
    env.server
        .add_numeric_data(&[common::raw(5, hour(0) + minutes(1), 3.0)])
        .await
        .unwrap();

    let response = server
        .get("/api/metrics/5")
        .add_query_param("begin", hour(0))
        .add_query_param("end", hour(4))
        .await;
    response.assert_status_ok();
    let points: Vec<Value> = response.json();
    assert_eq!(points.len(), 60);
    assert_eq!(points[0]["avg"], 3.0);
    assert_eq!(points[0]["time"], hour(0));
    // No data renders as null.
    assert!(points[1]["avg"].is_null());
    assert!(points[1]["min"].is_null());
}

#[tokio::test]
async fn test_series_endpoint_rejects_reversed_range() {
    let (server, _env) = test_server(hour(4)).await;
    let response = server
        .get("/api/metrics/5")
        .add_query_param("begin", hour(2))
        .add_query_param("end", hour(1))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_summary_endpoint() {
    let (server, env) = test_server(hour(4)).await;
    env.server
        .add_numeric_data(&[common::raw(5, hour(1), 2.0), common::raw(5, hour(2), 4.0)])
        .await
        .unwrap();
    let response = server
        .get("/api/metrics/5/summary")
        .add_query_param("begin", hour(0))
        .add_query_param("end", hour(4))
        .await;
    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["avg"], 3.0);
    assert_eq!(json["min"], 2.0);
    assert_eq!(json["max"], 4.0);
}

#[tokio::test]
async fn test_group_endpoint() {
    let (server, env) = test_server(hour(4)).await;
    env.server
        .add_numeric_data(&[common::raw(1, hour(0), 2.0), common::raw(2, hour(0), 4.0)])
        .await
        .unwrap();
    let response = server
        .post("/api/metrics/group")
        .json(&json!({ "scheduleIds": [1, 2], "begin": hour(0), "end": hour(4) }))
        .await;
    response.assert_status_ok();
    let points: Vec<Value> = response.json();
    assert_eq!(points.len(), 60);
    assert_eq!(points[0]["avg"], 3.0);
}

#[tokio::test]
async fn test_aggregates_then_baselines() {
    let (server, env) = test_server(hour(4)).await;
    env.server
        .add_numeric_data(&[
            common::raw(5, hour(1), 2.0),
            common::raw(5, hour(1) + minutes(30), 6.0),
            common::raw(5, hour(2), 10.0),
        ])
        .await
        .unwrap();

    let response = server.post("/api/aggregates").await;
    response.assert_status_ok();
    let report: Value = response.json();
    assert_eq!(report["currentHour"], hour(4));
    assert_eq!(report["oneHour"]["written"], 2);
    assert_eq!(report["sixHour"]["ran"], false);

    let response = server
        .post("/api/baselines")
        .json(&json!({ "scheduleIds": [5, 6], "startTime": hour(0), "endTime": hour(4) }))
        .await;
    response.assert_status_ok();
    let baselines: Vec<Value> = response.json();
    assert_eq!(baselines.len(), 2);
    assert_eq!(baselines[0]["scheduleId"], 5);
    assert_eq!(baselines[0]["min"], 2.0);
    assert_eq!(baselines[0]["mean"], 7.0);
    assert_eq!(baselines[0]["max"], 10.0);
    assert_eq!(baselines[0]["computedAt"], hour(4));
    assert!(baselines[1]["mean"].is_null());
}

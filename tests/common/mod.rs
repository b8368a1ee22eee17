// Shared test helpers: temp SQLite store, pinned clock, fixed reference day.

#![allow(dead_code)]

use std::sync::Arc;

use rhq_metrics::clock::{Clock, ManualClock};
use rhq_metrics::config::RetentionConfig;
use rhq_metrics::metrics_server::MetricsServer;
use rhq_metrics::models::RawNumericMetric;
use rhq_metrics::store::MetricsStore;
use rhq_metrics::time_slice::{MS_PER_HOUR, MS_PER_MINUTE, TimeSlicer};
use tempfile::TempDir;

/// 2024-01-01T00:00:00Z, a UTC midnight.
pub const DAY0: i64 = 1_704_067_200_000;

pub fn hour(n: i64) -> i64 {
    DAY0 + n * MS_PER_HOUR
}

pub fn minutes(n: i64) -> i64 {
    n * MS_PER_MINUTE
}

pub fn raw(schedule_id: i32, timestamp: i64, value: f64) -> RawNumericMetric {
    RawNumericMetric::new(schedule_id, timestamp, value)
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

pub struct TestEnv {
    // Dropped last: holds the database file.
    pub dir: TempDir,
    pub db_path: String,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MetricsStore>,
    pub server: Arc<MetricsServer>,
}

pub async fn test_env(now_ms: i64) -> TestEnv {
    let clock = Arc::new(ManualClock::new(now_ms));
    let (dir, db_path, store) = test_store(clock.clone()).await;
    let server = Arc::new(MetricsServer::new(store.clone(), clock.clone(), 4));
    TestEnv {
        dir,
        db_path,
        clock,
        store,
        server,
    }
}

pub async fn test_store(clock: Arc<dyn Clock>) -> (TempDir, String, Arc<MetricsStore>) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metrics.db");
    let path_str = path.to_str().unwrap().to_string();
    let store = MetricsStore::connect(
        &path_str,
        4,
        RetentionConfig::default(),
        TimeSlicer::utc(),
        clock,
    )
    .await
    .unwrap();
    store.init().await.unwrap();
    (dir, path_str, Arc::new(store))
}

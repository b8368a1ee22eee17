// SQLite-backed metrics storage: raw samples, per-tier aggregates, dirty-bucket index.
// Uses sqlx for async + connection pooling. Retention is enforced per row via expires_at.

mod index;
mod schema;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{instrument, warn};

use crate::clock::Clock;
use crate::config::RetentionConfig;
use crate::error::Result;
use crate::models::{
    AggregateNumericMetric, AggregateSimpleNumericMetric, AggregateType, RawNumericMetric,
    Resolution,
};
use crate::time_slice::TimeSlicer;

/// Upsert of a dirty-index entry. A re-mark of a present entry bumps its generation so a
/// roll-up that read the older generation cannot clear it.
const MARK_DIRTY_SQL: &str = "INSERT INTO metrics_index (resolution_seconds, created_at, schedule_id) VALUES ($1, $2, $3)
     ON CONFLICT (resolution_seconds, created_at, schedule_id) DO UPDATE SET generation = generation + 1";

pub struct MetricsStore {
    pool: SqlitePool,
    retention: RetentionConfig,
    slicer: TimeSlicer,
    clock: Arc<dyn Clock>,
}

impl MetricsStore {
    /// Connect to SQLite at `path`, create parent dir and DB if missing, enable WAL + pragmas.
    pub async fn connect(
        path: &str,
        max_pool_size: u32,
        retention: RetentionConfig,
        slicer: TimeSlicer,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_pool_size)
            .connect_with(opts)
            .await?;
        Ok(Self {
            pool,
            retention,
            slicer,
            clock,
        })
    }

    pub async fn init(&self) -> Result<()> {
        schema::init_tables(&self.pool).await?;
        Ok(())
    }

    pub fn retention(&self) -> &RetentionConfig {
        &self.retention
    }

    pub fn slicer(&self) -> TimeSlicer {
        self.slicer
    }

    /// Writes each sample together with its one-hour index entry in one transaction.
    /// Returns the samples that are durable; a failed sample is logged and left out so
    /// the caller can resend just those. Errors only when nothing could be written.
    #[instrument(skip(self, samples), fields(repo = "metrics", operation = "insert_raw_data", samples_count = samples.len()))]
    pub async fn insert_raw_data(
        &self,
        samples: &[RawNumericMetric],
    ) -> Result<Vec<RawNumericMetric>> {
        let expires_at = self.clock.now_ms() + self.retention.raw_ms();
        let mut written = Vec::with_capacity(samples.len());
        let mut first_error = None;

        for sample in samples {
            match self.insert_raw_with_index(sample, expires_at).await {
                Ok(()) => written.push(*sample),
                Err(e) => {
                    warn!(
                        schedule_id = sample.schedule_id,
                        timestamp = sample.timestamp,
                        error = %e,
                        "raw insert failed"
                    );
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) if written.is_empty() => Err(e.into()),
            _ => Ok(written),
        }
    }

    async fn insert_raw_with_index(
        &self,
        sample: &RawNumericMetric,
        expires_at: i64,
    ) -> std::result::Result<(), sqlx::Error> {
        let hour = self
            .slicer
            .time_slice_start(sample.timestamp, Resolution::OneHour.width_minutes());
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT OR REPLACE INTO raw_metrics (schedule_id, created_at, value, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(sample.schedule_id)
        .bind(sample.timestamp)
        .bind(sample.value)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            MARK_DIRTY_SQL,
        )
        .bind(Resolution::OneHour.resolution_seconds())
        .bind(hour)
        .bind(sample.schedule_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await
    }

    /// Raw samples in [start, end), ascending by timestamp.
    #[instrument(skip(self), fields(repo = "metrics", operation = "find_raw_metrics"))]
    pub async fn find_raw_metrics(
        &self,
        schedule_id: i32,
        start: i64,
        end: i64,
    ) -> Result<Vec<RawNumericMetric>> {
        let rows = sqlx::query(
            "SELECT schedule_id, created_at, value FROM raw_metrics
             WHERE schedule_id = $1 AND created_at >= $2 AND created_at < $3 AND expires_at > $4
             ORDER BY created_at ASC",
        )
        .bind(schedule_id)
        .bind(start)
        .bind(end)
        .bind(self.clock.now_ms())
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(RawNumericMetric {
                schedule_id: row.try_get("schedule_id")?,
                timestamp: row.try_get("created_at")?,
                value: row.try_get("value")?,
            });
        }
        Ok(out)
    }

    /// Full overwrite per (resolution, schedule, bucket start), one transaction.
    #[instrument(skip(self, metrics), fields(repo = "metrics", operation = "upsert_aggregates", metrics_count = metrics.len()))]
    pub async fn upsert_aggregates(
        &self,
        resolution: Resolution,
        metrics: &[AggregateNumericMetric],
    ) -> Result<()> {
        if metrics.is_empty() {
            return Ok(());
        }
        let expires_at = self.clock.now_ms() + self.retention.aggregate_ms(resolution);
        let mut tx = self.pool.begin().await?;
        for m in metrics {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO aggregate_metrics
                (resolution_seconds, schedule_id, created_at, avg_value, min_value, max_value, expires_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(resolution.resolution_seconds())
            .bind(m.schedule_id)
            .bind(m.time)
            .bind(nan_to_null(m.avg))
            .bind(nan_to_null(m.min))
            .bind(nan_to_null(m.max))
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Composite aggregates in [start, end), ascending by bucket start.
    #[instrument(skip(self), fields(repo = "metrics", operation = "find_aggregate_metrics"))]
    pub async fn find_aggregate_metrics(
        &self,
        resolution: Resolution,
        schedule_id: i32,
        start: i64,
        end: i64,
    ) -> Result<Vec<AggregateNumericMetric>> {
        let rows = self
            .fetch_aggregate_rows(resolution, schedule_id, start, end)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let avg: Option<f64> = row.try_get("avg_value")?;
            let min: Option<f64> = row.try_get("min_value")?;
            let max: Option<f64> = row.try_get("max_value")?;
            out.push(AggregateNumericMetric {
                schedule_id: row.try_get("schedule_id")?,
                time: row.try_get("created_at")?,
                avg: avg.unwrap_or(f64::NAN),
                min: min.unwrap_or(f64::NAN),
                max: max.unwrap_or(f64::NAN),
            });
        }
        Ok(out)
    }

    /// Writes single statistics. Each row only touches its own column of the bucket.
    #[instrument(skip(self, metrics), fields(repo = "metrics", operation = "insert_typed_aggregates", metrics_count = metrics.len()))]
    pub async fn insert_typed_aggregates(
        &self,
        resolution: Resolution,
        metrics: &[AggregateSimpleNumericMetric],
    ) -> Result<()> {
        if metrics.is_empty() {
            return Ok(());
        }
        let expires_at = self.clock.now_ms() + self.retention.aggregate_ms(resolution);
        let mut tx = self.pool.begin().await?;
        for m in metrics {
            let column = m.aggregate_type.column();
            let sql = format!(
                "INSERT INTO aggregate_metrics (resolution_seconds, schedule_id, created_at, {column}_value, expires_at)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (resolution_seconds, schedule_id, created_at)
                 DO UPDATE SET {column}_value = excluded.{column}_value, expires_at = excluded.expires_at"
            );
            sqlx::query(&sql)
                .bind(resolution.resolution_seconds())
                .bind(m.schedule_id)
                .bind(m.time)
                .bind(nan_to_null(m.value))
                .bind(expires_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Typed view of the aggregates in [start, end): one row per non-empty statistic,
    /// ordered by bucket start, then avg/min/max.
    #[instrument(skip(self), fields(repo = "metrics", operation = "find_typed_aggregates"))]
    pub async fn find_typed_aggregates(
        &self,
        resolution: Resolution,
        schedule_id: i32,
        start: i64,
        end: i64,
    ) -> Result<Vec<AggregateSimpleNumericMetric>> {
        let rows = self
            .fetch_aggregate_rows(resolution, schedule_id, start, end)
            .await?;

        let mut out = Vec::with_capacity(rows.len() * 3);
        for row in rows {
            let time: i64 = row.try_get("created_at")?;
            for aggregate_type in [AggregateType::Avg, AggregateType::Min, AggregateType::Max] {
                let column = format!("{}_value", aggregate_type.column());
                let value: Option<f64> = row.try_get(column.as_str())?;
                if let Some(value) = value {
                    out.push(AggregateSimpleNumericMetric::new(
                        schedule_id,
                        time,
                        aggregate_type,
                        value,
                    ));
                }
            }
        }
        Ok(out)
    }

    async fn fetch_aggregate_rows(
        &self,
        resolution: Resolution,
        schedule_id: i32,
        start: i64,
        end: i64,
    ) -> Result<Vec<sqlx::sqlite::SqliteRow>> {
        let rows = sqlx::query(
            "SELECT schedule_id, created_at, avg_value, min_value, max_value FROM aggregate_metrics
             WHERE resolution_seconds = $1 AND schedule_id = $2
               AND created_at >= $3 AND created_at < $4 AND expires_at > $5
             ORDER BY created_at ASC",
        )
        .bind(resolution.resolution_seconds())
        .bind(schedule_id)
        .bind(start)
        .bind(end)
        .bind(self.clock.now_ms())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Deletes rows whose TTL has passed. Returns the number of rows removed.
    #[instrument(skip(self), fields(repo = "metrics", operation = "prune_expired"))]
    pub async fn prune_expired(&self) -> Result<u64> {
        let now = self.clock.now_ms();
        let raw = sqlx::query("DELETE FROM raw_metrics WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        let agg = sqlx::query("DELETE FROM aggregate_metrics WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(raw.rows_affected() + agg.rows_affected())
    }

    /// Reclaim space after deletes (run periodically after pruning).
    #[instrument(skip(self), fields(repo = "metrics", operation = "vacuum"))]
    pub async fn vacuum(&self) -> Result<()> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}

/// SQLite has no NaN; absent statistics are stored as NULL.
fn nan_to_null(v: f64) -> Option<f64> {
    if v.is_nan() { None } else { Some(v) }
}

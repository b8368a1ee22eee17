// Dirty-bucket index: the only way the roll-up discovers pending work.
// Losing an entry before it is consumed silently drops that bucket from the coarser tier.

use sqlx::Row;
use tracing::instrument;

use super::MetricsStore;
use crate::error::Result;
use crate::models::{MetricsIndexEntry, Resolution};

impl MetricsStore {
    /// Upsert; marking a present entry keeps a single row.
    #[instrument(skip(self), fields(repo = "metrics", operation = "mark_dirty"))]
    pub async fn mark_dirty(
        &self,
        resolution: Resolution,
        time: i64,
        schedule_id: i32,
    ) -> Result<()> {
        sqlx::query(
            super::MARK_DIRTY_SQL,
        )
        .bind(resolution.resolution_seconds())
        .bind(time)
        .bind(schedule_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Batch upsert in one transaction.
    #[instrument(skip(self, entries), fields(repo = "metrics", operation = "update_metrics_index", entries_count = entries.len()))]
    pub async fn update_metrics_index(&self, entries: &[MetricsIndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for e in entries {
            sqlx::query(
                super::MARK_DIRTY_SQL,
            )
            .bind(e.resolution.resolution_seconds())
            .bind(e.time)
            .bind(e.schedule_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// All outstanding work for a tier, ordered by bucket start then schedule id.
    #[instrument(skip(self), fields(repo = "metrics", operation = "list_dirty"))]
    pub async fn list_dirty(&self, resolution: Resolution) -> Result<Vec<MetricsIndexEntry>> {
        let rows = sqlx::query(
            "SELECT created_at, schedule_id FROM metrics_index
             WHERE resolution_seconds = $1
             ORDER BY created_at ASC, schedule_id ASC",
        )
        .bind(resolution.resolution_seconds())
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let time: i64 = row.try_get("created_at")?;
            let schedule_id: i32 = row.try_get("schedule_id")?;
            out.push(MetricsIndexEntry::new(resolution, time, schedule_id));
        }
        Ok(out)
    }

    /// Same entries as `list_dirty`, each with the generation it was read at.
    #[instrument(skip(self), fields(repo = "metrics", operation = "list_dirty_with_generation"))]
    pub async fn list_dirty_with_generation(
        &self,
        resolution: Resolution,
    ) -> Result<Vec<(MetricsIndexEntry, i64)>> {
        let rows = sqlx::query(
            "SELECT created_at, schedule_id, generation FROM metrics_index
             WHERE resolution_seconds = $1
             ORDER BY created_at ASC, schedule_id ASC",
        )
        .bind(resolution.resolution_seconds())
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let time: i64 = row.try_get("created_at")?;
            let schedule_id: i32 = row.try_get("schedule_id")?;
            let generation: i64 = row.try_get("generation")?;
            out.push((MetricsIndexEntry::new(resolution, time, schedule_id), generation));
        }
        Ok(out)
    }

    /// Deletes the entry only if it was not re-marked since `generation` was read.
    /// Returns false when a newer mark keeps it for the next pass.
    #[instrument(skip(self), fields(repo = "metrics", operation = "clear_dirty_generation"))]
    pub async fn clear_dirty_generation(
        &self,
        entry: MetricsIndexEntry,
        generation: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM metrics_index
             WHERE resolution_seconds = $1 AND created_at = $2 AND schedule_id = $3 AND generation = $4",
        )
        .bind(entry.resolution.resolution_seconds())
        .bind(entry.time)
        .bind(entry.schedule_id)
        .bind(generation)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Idempotent delete, whatever the generation.
    #[instrument(skip(self), fields(repo = "metrics", operation = "clear_dirty"))]
    pub async fn clear_dirty(
        &self,
        resolution: Resolution,
        time: i64,
        schedule_id: i32,
    ) -> Result<()> {
        sqlx::query(
            "DELETE FROM metrics_index WHERE resolution_seconds = $1 AND created_at = $2 AND schedule_id = $3",
        )
        .bind(resolution.resolution_seconds())
        .bind(time)
        .bind(schedule_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

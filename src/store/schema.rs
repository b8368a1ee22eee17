// Table layout for raw samples, per-tier aggregates and the dirty-bucket index.
// Rows carry expires_at (ms) as their TTL; reads skip expired rows, prune_expired deletes them.

use sqlx::SqlitePool;

pub(super) async fn init_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_metrics (
            schedule_id INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            value REAL NOT NULL,
            expires_at INTEGER NOT NULL,
            PRIMARY KEY (schedule_id, created_at)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_raw_metrics_expires_at ON raw_metrics(expires_at)",
    )
    .execute(pool)
    .await?;

    // avg/min/max are nullable: typed writes may fill one column only.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS aggregate_metrics (
            resolution_seconds INTEGER NOT NULL,
            schedule_id INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            avg_value REAL,
            min_value REAL,
            max_value REAL,
            expires_at INTEGER NOT NULL,
            PRIMARY KEY (resolution_seconds, schedule_id, created_at)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_aggregate_metrics_expires_at ON aggregate_metrics(expires_at)",
    )
    .execute(pool)
    .await?;

    // No TTL: an entry lives until the roll-up consumes it.
    // generation is bumped on every re-mark; a clear only removes the generation it read.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS metrics_index (
            resolution_seconds INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            schedule_id INTEGER NOT NULL,
            generation INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (resolution_seconds, created_at, schedule_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

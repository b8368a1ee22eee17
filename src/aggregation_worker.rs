// Background worker: runs the roll-up pass on a cron schedule and, on a second schedule,
// prunes expired rows then VACUUMs. Both schedules use local time.
// A mutex around each pass keeps overlapping ticks (or a manual trigger) from running concurrently.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::metrics_server::{MetricsServer, RollupReport};

/// Config for the aggregation worker.
#[derive(Debug, Clone)]
pub struct AggregationWorkerConfig {
    /// Cron expression for the roll-up pass (e.g. "0 5 * * * *" = five past every hour).
    pub aggregation_schedule: String,
    /// Cron expression for prune + VACUUM (e.g. "0 30 3 * * *" = 03:30 daily).
    pub prune_schedule: String,
    /// Run one pass immediately, before the first scheduled tick.
    pub run_on_startup: bool,
}

/// Serialises roll-up passes; shared by the worker and on-demand triggers.
pub struct AggregationRunner {
    server: Arc<MetricsServer>,
    lock: Mutex<()>,
}

impl AggregationRunner {
    pub fn new(server: Arc<MetricsServer>) -> Self {
        Self {
            server,
            lock: Mutex::new(()),
        }
    }

    pub fn server(&self) -> &Arc<MetricsServer> {
        &self.server
    }

    /// Runs one roll-up pass, waiting for any pass already in progress.
    pub async fn run_once(&self) -> Result<RollupReport> {
        let _guard = self.lock.lock().await;
        self.server.calculate_aggregates().await
    }

    /// Prunes expired rows and reclaims space.
    pub async fn prune_once(&self) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let store = self.server.store();
        let pruned = store.prune_expired().await?;
        store.vacuum().await?;
        Ok(pruned)
    }
}

/// Spawns the aggregation worker. Returns a join handle; the task ends when `shutdown_rx` fires.
pub fn spawn(
    runner: Arc<AggregationRunner>,
    config: AggregationWorkerConfig,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run(runner, config, shutdown_rx).await;
    })
}

#[instrument(skip(runner, shutdown_rx), fields(schedule = %config.aggregation_schedule))]
async fn run(
    runner: Arc<AggregationRunner>,
    config: AggregationWorkerConfig,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) {
    if config.run_on_startup {
        match runner.run_once().await {
            Ok(report) => info!(
                one_hour = report.one_hour.written,
                "startup catch-up pass complete"
            ),
            Err(e) => warn!(error = %e, transient = e.is_transient(), "startup aggregation pass failed"),
        }
    }

    let (agg_tx, mut agg_rx) = mpsc::channel::<()>(1);
    let (prune_tx, mut prune_rx) = mpsc::channel::<()>(1);
    let agg_ticker = tokio::spawn(cron_ticker(config.aggregation_schedule.clone(), agg_tx));
    let prune_ticker = tokio::spawn(cron_ticker(config.prune_schedule.clone(), prune_tx));

    loop {
        tokio::select! {
            Some(()) = agg_rx.recv() => {
                // A failed pass is retried in full on the next tick.
                if let Err(e) = runner.run_once().await {
                    warn!(error = %e, transient = e.is_transient(), "aggregation pass failed");
                }
            }
            Some(()) = prune_rx.recv() => {
                match runner.prune_once().await {
                    Ok(pruned) => info!(pruned_rows = pruned, "prune + vacuum complete"),
                    Err(e) => warn!(error = %e, "prune failed"),
                }
            }
            _ = &mut shutdown_rx => {
                info!("aggregation worker shutting down");
                break;
            }
        }
    }

    agg_ticker.abort();
    prune_ticker.abort();
}

/// Sends a message on `tx` at each time the cron expression fires (local time).
async fn cron_ticker(expr: String, tx: mpsc::Sender<()>) {
    let Ok(schedule) = cron::Schedule::from_str(&expr) else {
        warn!(cron = %expr, "invalid cron expression; schedule will not run");
        return;
    };
    loop {
        let now = chrono::Local::now();
        let Some(next) = schedule.after(&now).next() else {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            continue;
        };
        let delay = (next - now).to_std().unwrap_or(Duration::from_secs(1));
        tokio::time::sleep(delay).await;
        if tx.send(()).await.is_err() {
            break;
        }
    }
}

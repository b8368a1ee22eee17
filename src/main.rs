use anyhow::Result;
use rhq_metrics::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let slicer =
        time_slice::TimeSlicer::with_offset_minutes(app_config.aggregation.reference_utc_offset_minutes)
            .ok_or_else(|| anyhow::anyhow!("invalid aggregation.reference_utc_offset_minutes"))?;
    let clock: Arc<dyn clock::Clock> = Arc::new(clock::SystemClock);

    let store = Arc::new(
        store::MetricsStore::connect(
            &app_config.database.path,
            app_config.database.max_pool_size,
            app_config.retention,
            slicer,
            clock.clone(),
        )
        .await?,
    );
    store.init().await?;

    let server = Arc::new(metrics_server::MetricsServer::new(
        store,
        clock,
        app_config.aggregation.parallelism,
    ));
    let runner = Arc::new(aggregation_worker::AggregationRunner::new(server));

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let worker_handle = aggregation_worker::spawn(
        runner.clone(),
        aggregation_worker::AggregationWorkerConfig {
            aggregation_schedule: app_config.aggregation.schedule.clone(),
            prune_schedule: app_config.maintenance.prune_schedule.clone(),
            run_on_startup: app_config.aggregation.run_on_startup,
        },
        shutdown_rx,
    );

    let app = routes::app(runner);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(version = version::VERSION, "Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Received shutdown signal");
    let _ = shutdown_tx.send(());
    let _ = worker_handle.await;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

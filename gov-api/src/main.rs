use std::time::Duration;

use envconfig::Envconfig;
use futures::future::{select, Either};
use tokio::sync::Semaphore;

use gov_api::config::Config;
use gov_api::router::router;
use gov_api::state::AppState;
use gov_common::health::HealthHandle;
use gov_metrics::ticker::{Cleaner, CollectionCleaner, RetentionCleaner};

use std::sync::Arc;

/// Drives one `Cleaner` on a fixed interval, mirroring
/// `hook-janitor::main::cleanup_loop`: a semaphore of 1 keeps a slow tick
/// from overlapping the next one rather than piling up concurrent runs.
/// Reports liveness to `health` after every run so a wedged collector
/// eventually trips `/_health`.
async fn cleanup_loop(cleaner: Box<dyn Cleaner>, interval_secs: u64, health: Arc<HealthHandle>) {
    let semaphore = Semaphore::new(1);
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        let _permit = semaphore.acquire().await;
        interval.tick().await;
        cleaner.cleanup().await;
        health.report_healthy().await;
        drop(_permit);
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env()?;
    let bind_address = config.address;
    let collection_interval_secs = config.collection_interval_secs;
    let retention_interval_secs = config.retention_interval_secs;

    let state = AppState::new(config).await?;
    let metrics_collector = state.metrics_collector.clone();
    let scheduler_health = state.scheduler_health.clone();

    let app = router(state);

    let collection_loop = Box::pin(cleanup_loop(
        Box::new(CollectionCleaner::new(metrics_collector.clone())),
        collection_interval_secs,
        scheduler_health.clone(),
    ));
    let retention_loop = Box::pin(cleanup_loop(
        Box::new(RetentionCleaner::new(metrics_collector)),
        retention_interval_secs,
        scheduler_health,
    ));
    let schedulers = Box::pin(async move {
        select(collection_loop, retention_loop).await;
    });

    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    tracing::info!(address = %bind_address, "gov-api listening");
    let http_server = Box::pin(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    match select(http_server, schedulers).await {
        Either::Left((result, _)) => result.map_err(Into::into),
        Either::Right(((), _)) => {
            tracing::error!("gov-api scheduler task exited unexpectedly");
            Ok(())
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use metrics_collector::config::ServerConfig;
use metrics_collector::server;
use metrics_collector::storage::{FileBackend, MemoryBackend, SqlBackend, StorageBackend};
use tracing::{error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("metrics_collector", LevelFilter::TRACE),
        ("collector_server", LevelFilter::TRACE),
        ("tower_http", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let config = ServerConfig::load();
    trace!("started with config: {config:?}");

    if let Some(dsn) = &config.database_dsn {
        let backend = Arc::new(SqlBackend::connect(dsn).await?);
        info!("using SQL backend");

        serve(&config.address, backend.clone()).await?;
        backend.close().await;
    } else if let Some(path) = &config.file_storage_path {
        let backend = Arc::new(FileBackend::new(path.clone(), config.store_interval == 0));
        info!(
            "using file-snapshot backend at {} (interval: {}s)",
            path.display(),
            config.store_interval
        );

        if config.restore
            && let Err(e) = backend.load_from_file().await
        {
            warn!("failed to restore metrics from snapshot: {e}");
        }

        if config.store_interval > 0 {
            spawn_snapshot_ticker(backend.clone(), config.store_interval);
        }

        serve(&config.address, backend.clone()).await?;

        // Final snapshot so nothing accepted since the last tick is lost.
        if let Err(e) = backend.save_to_file().await {
            error!("failed to save snapshot on shutdown: {e}");
        }
    } else {
        info!("using in-memory backend (no persistence)");
        serve(&config.address, Arc::new(MemoryBackend::new())).await?;
    }

    info!("server stopped gracefully");
    Ok(())
}

fn spawn_snapshot_ticker(backend: Arc<FileBackend>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = backend.save_to_file().await {
                error!("failed to save snapshot: {e}");
            }
        }
    });
}

async fn serve(address: &str, repo: Arc<dyn StorageBackend>) -> anyhow::Result<()> {
    let app = server::router(repo);
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
        return;
    }
    info!("shutting down server...");
}

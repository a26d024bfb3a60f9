use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use voxdub::config::resolve_config;
use voxdub::pipeline::{Pipeline, PipelineConfig};
use voxdub::stages::{FfprobeMediaProbe, Stages};
use voxdub::{spawn_maintenance, Database, DubbingService, JobStore, RetentionSweeper, WorkerPool};
use voxdub_server::observability::{init_tracing, TracingConfig};
use voxdub_server::{create_router, AppState};

/// `--config <path>` (or `--config=<path>`) is the only flag.
fn parse_args() -> anyhow::Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    let mut config = None;
    while let Some(arg) = args.next() {
        if arg == "--config" || arg == "-c" {
            let Some(path) = args.next() else {
                bail!("--config requires a path");
            };
            config = Some(PathBuf::from(path));
        } else if let Some(path) = arg.strip_prefix("--config=") {
            config = Some(PathBuf::from(path));
        } else {
            bail!("unexpected argument '{}'; usage: voxdub-server [--config <path>]", arg);
        }
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = resolve_config(parse_args()?).context("Failed to load configuration")?;
    init_tracing(&TracingConfig::from_settings(config.logging.json));

    for dir in [config.storage.uploads_dir(), config.storage.processed_dir()] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let db_path = config.storage.database_path();
    let db = Database::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let store = Arc::new(JobStore::with_database(db));
    let restored = store
        .load_from_database()
        .context("Failed to restore jobs")?;
    tracing::info!(restored, "Job store ready");

    let pipeline = Arc::new(Pipeline::new(
        Arc::new(PipelineConfig::from_config(&config)),
        Stages::from_config(&config),
        Arc::clone(&store),
    ));
    let pool = Arc::new(WorkerPool::new(
        pipeline,
        config.worker.count,
        config.worker.queue_capacity,
    ));
    let service = Arc::new(
        DubbingService::new(
            Arc::clone(&store),
            Arc::clone(&pool),
            config.storage.uploads_dir(),
        )
        .with_probe(Arc::new(FfprobeMediaProbe::new(&config.tools.ffprobe)))
        .with_default_recent(config.server.recent_jobs_limit),
    );

    let maintenance_token = CancellationToken::new();
    let maintenance = spawn_maintenance(
        Arc::clone(&store),
        RetentionSweeper::from_config(Arc::clone(&store), &config),
        Duration::from_secs(config.pipeline.lazy_flush_interval_secs),
        Duration::from_secs(config.retention.sweep_interval_secs),
        maintenance_token.clone(),
    );

    let router = create_router(AppState::new(service), config.server.max_upload_bytes());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(
        %addr,
        workers = pool.workers(),
        data_dir = %config.storage.data_dir().display(),
        "Listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, draining workers");
    pool.shutdown().await;
    maintenance_token.cancel();
    if let Err(e) = maintenance.await {
        tracing::error!(error = %e, "Maintenance task failed");
    }
    let flushed = store.flush_pending();
    tracing::info!(flushed, "Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

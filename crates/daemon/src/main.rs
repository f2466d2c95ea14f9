//! Foreman daemon - composition root.
//!
//! Wires a `SqliteController`/`SqliteKvStore` pair, a `WorkerPool` of
//! sandboxed workers, a background maintenance scheduler, and an HTTP
//! surface into one running process.
//!
//! The same binary doubles as the sandbox child: when re-exec'd with
//! `--sandbox-child` (see `foreman_infra_process::SubprocessSandbox::
//! current_exe`) it skips straight to `run_child` instead of the
//! normal bootstrap below.

mod config;
mod job_types;
mod telemetry;

use anyhow::{Context, Result};
use config::DaemonConfig;
use foreman_core::application::maintenance::ControllerMaintenanceScheduler;
use foreman_core::application::pool::WorkerPool;
use foreman_core::application::worker::WorkerTunables;
use foreman_infra_process::SubprocessSandbox;
use foreman_infra_sqlite::{create_pool, run_migrations, SqliteController, SqliteKvStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60 * 60);
const GRACEFUL_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args().any(|arg| arg == "--sandbox-child") {
        foreman_infra_process::run_child(job_types::child_job_bodies()).await;
        return Ok(());
    }

    let config = DaemonConfig::load(std::env::var("FOREMAN_CONFIG_FILE").ok().map(Into::into))
        .context("failed to load daemon configuration")?;

    init_logging(&config.log_format, &config.log_level);
    if let Err(e) = telemetry::init_telemetry() {
        warn!(error = ?e, "OpenTelemetry setup failed, continuing without it");
    }

    info!(version = VERSION, "foreman-daemon starting");

    let pool = create_pool(&config.db_path)
        .await
        .context("failed to create sqlite pool")?;
    run_migrations(&pool).await.context("schema migration failed")?;

    let controller: Arc<dyn foreman_core::port::Controller> = Arc::new(SqliteController::new(
        pool.clone(),
        "foreman-daemon",
        foreman_core::application::worker::constants::DEFAULT_LOCK_TTL,
    ));
    let kv: Arc<dyn foreman_core::port::KvStore> = Arc::new(SqliteKvStore::new(pool.clone()));

    let sandbox = Arc::new(
        SubprocessSandbox::current_exe().context("failed to resolve sandbox executable")?,
    );

    let mut worker_pool = WorkerPool::new(
        config.pool_size,
        controller.clone(),
        sandbox,
        WorkerTunables::default(),
    );
    let job_types = job_types::worker_job_types();
    for job_type in job_types.job_types() {
        worker_pool.register_default_job_type(job_type);
    }
    worker_pool.init().context("worker pool failed to initialize")?;
    worker_pool.start();
    info!(workers = config.pool_size, "worker pool started");

    let maintenance =
        ControllerMaintenanceScheduler::new(controller.clone(), MAINTENANCE_INTERVAL, true);
    let maintenance_handle = tokio::spawn(maintenance.run());

    let http_server = foreman_api_http::HttpServer::new(
        foreman_api_http::HttpServerConfig {
            host: config.host.clone(),
            port: config.port,
        },
        controller,
        kv,
    );
    let http_handle = tokio::spawn(async move {
        if let Err(e) = http_server.serve().await {
            tracing::error!(error = ?e, "HTTP server exited with an error");
        }
    });

    info!("foreman-daemon ready, press Ctrl+C to shut down");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, stopping workers gracefully");

    worker_pool.stop();
    if !worker_pool.join_timeout(GRACEFUL_JOIN_TIMEOUT).await {
        warn!("workers did not stop in time, killing in-flight jobs");
        worker_pool.kill("foreman-daemon", "graceful shutdown timeout exceeded");
        worker_pool.join().await;
    } else {
        worker_pool.join().await;
    }

    maintenance_handle.abort();
    http_handle.abort();

    info!("shutdown complete");
    Ok(())
}

fn init_logging(log_format: &str, log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("foreman={log_level}")));

    match log_format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}

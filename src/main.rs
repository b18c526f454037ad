//! BizHub Server: approval and notification coordination for the
//! storage, sales, projects, maintenance and pricing modules.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

use bizhub_api::AppState;
use bizhub_core::config::AppConfig;
use bizhub_core::error::AppError;
use bizhub_core::traits::{Clock, SystemClock};
use bizhub_database::StoreBundle;
use bizhub_worker::jobs::{
    ApprovalExpiryJobHandler, NotificationRetentionJobHandler, StaleDeviceJobHandler,
};
use bizhub_worker::{CronScheduler, JobExecutor};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("BIZHUB_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting BizHub v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Stores ───────────────────────────────────────────
    tracing::info!(provider = %config.database.provider, "Initializing stores...");
    let stores = StoreBundle::from_config(&config.database).await?;

    // ── Step 2: Broker ───────────────────────────────────────────
    tracing::info!(provider = %config.broker.provider, "Connecting broker...");
    let broker = bizhub_realtime::connect_broker(&config.broker).await?;

    // ── Step 3: Services ─────────────────────────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = AppState::new(
        config.clone(),
        stores.clone(),
        Arc::clone(&broker),
        Arc::clone(&clock),
    );
    tracing::info!("Services initialized");

    // ── Step 4: Scheduled sweeps ─────────────────────────────────
    let scheduler = if config.worker.enabled {
        let mut executor = JobExecutor::new();
        executor.register(Arc::new(ApprovalExpiryJobHandler::new(Arc::clone(
            &state.approvals,
        ))));
        executor.register(Arc::new(NotificationRetentionJobHandler::new(
            Arc::clone(&stores.notifications),
            Arc::clone(&clock),
            &config.notifications,
        )));
        executor.register(Arc::new(StaleDeviceJobHandler::new(Arc::clone(
            &state.registry,
        ))));

        let scheduler = CronScheduler::new(Arc::new(executor), Arc::clone(&clock)).await?;
        scheduler.register_default_tasks(&config.worker).await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        tracing::info!("Background sweeps disabled");
        None
    };

    // ── Step 5: HTTP server ──────────────────────────────────────
    let app = bizhub_api::build_app(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("BizHub server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown...");
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    // ── Step 6: Release resources ────────────────────────────────
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    if let Some(scheduler) = scheduler {
        match tokio::time::timeout(grace, scheduler.shutdown()).await {
            Ok(Err(e)) => tracing::warn!("Scheduler shutdown failed: {}", e),
            Err(_) => tracing::warn!("Scheduler shutdown timed out"),
            Ok(Ok(())) => {}
        }
    }
    if let Err(e) = broker.close().await {
        tracing::warn!("Broker close failed: {}", e);
    }
    stores.close().await;

    tracing::info!("BizHub server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
}

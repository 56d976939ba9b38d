//! SMM Service entry point.

use smm_service::config::{SmmConfig, StoreBackend};
use smm_service::services::init_metrics;
use smm_service::startup::Application;

use service_core::observability::init_tracing;
use tokio::signal;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load configuration
    let config = SmmConfig::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    // Initialize tracing
    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        version = %config.service_version,
        otlp_enabled = config.otlp_endpoint.is_some(),
        "Starting smm-service"
    );

    // Initialize metrics
    init_metrics();

    // Log configuration (the database URL is never logged)
    tracing::info!(
        service_name = %config.service_name,
        http_port = %config.common.port,
        store_backend = ?config.store_backend,
        db_max_connections = %config.database.max_connections,
        db_min_connections = %config.database.min_connections,
        provider_timeout_secs = config.provider.timeout_secs,
        scheduler_enabled = config.scheduler.enabled,
        reconcile_interval_secs = config.scheduler.reconcile_interval_secs,
        rate_sync_interval_secs = config.scheduler.rate_sync_interval_secs,
        "Configuration loaded"
    );
    if config.store_backend == StoreBackend::Memory {
        tracing::warn!("STORE_BACKEND=memory is intended for local runs only");
    }

    // Build and run application
    let app = Application::build(config).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to build application");
        std::io::Error::other(format!("Application build error: {}", e))
    })?;

    app.run_until_stopped(shutdown_signal()).await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

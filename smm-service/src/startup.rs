//! Application startup and lifecycle management.

use crate::config::{SmmConfig, StoreBackend};
use crate::handlers::{self, admin, orders, wallet};
use crate::services::{
    init_metrics, MemoryStore, OrderDesk, OrderForwarder, PgStore, ProviderApi, ProviderRegistry,
    RateSynchronizer, Scheduler, ServiceImporter, SmmProviderClient, StatusReconciler, Store,
    Wallet,
};
use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{request_id_middleware, REQUEST_ID_HEADER};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub desk: OrderDesk,
    pub forwarder: OrderForwarder,
    pub reconciler: StatusReconciler,
    pub rates: RateSynchronizer,
    pub importer: ServiceImporter,
    pub wallet: Wallet,
    pub registry: ProviderRegistry,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, providers: Arc<dyn ProviderApi>) -> Self {
        Self {
            desk: OrderDesk::new(store.clone()),
            forwarder: OrderForwarder::new(store.clone(), providers.clone()),
            reconciler: StatusReconciler::new(store.clone(), providers.clone()),
            rates: RateSynchronizer::new(store.clone(), providers.clone()),
            importer: ServiceImporter::new(store.clone(), providers),
            wallet: Wallet::new(store.clone()),
            registry: ProviderRegistry::new(store.clone()),
            store,
        }
    }
}

/// Build the HTTP router over `state`.
pub fn router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri().path(),
                request_id = %request_id,
                user_id = tracing::field::Empty,
            )
        })
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let admin_routes = Router::new()
        .route(
            "/providers",
            get(admin::list_providers).post(admin::create_provider),
        )
        .route("/providers/:id", patch(admin::update_provider))
        .route("/providers/:id/key", put(admin::rotate_provider_key))
        .route("/providers/:id/catalog", get(admin::provider_catalog))
        .route("/providers/:id/import", post(admin::import_services))
        .route("/orders/:id/forward", post(admin::forward_order))
        .route("/orders/:id/status", patch(admin::override_order_status))
        .route("/payments/:id/approve", post(admin::approve_payment))
        .route("/payments/:id/reject", post(admin::reject_payment))
        .route("/reconcile", post(admin::run_reconciliation))
        .route("/rates/sync", post(admin::run_rate_sync));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/orders", post(orders::create_order))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/forward", post(orders::forward_order))
        .route("/balance", get(wallet::get_balance))
        .route("/payments", post(wallet::submit_payment))
        .nest("/admin", admin_routes)
        .layer(trace_layer)
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
    scheduler: Option<Scheduler>,
    shutdown_grace: Duration,
}

impl Application {
    /// Build the application with the configured store and the HTTP provider client.
    pub async fn build(config: SmmConfig) -> Result<Self, AppError> {
        let store: Arc<dyn Store> = match config.store_backend {
            StoreBackend::Postgres => {
                let url = config.database.url.as_ref().ok_or_else(|| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?;
                let db = PgStore::connect(
                    url,
                    config.database.max_connections,
                    config.database.min_connections,
                )
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                    e
                })?;

                db.run_migrations().await.map_err(|e| {
                    tracing::error!(error = %e, "Failed to run migrations");
                    e
                })?;
                Arc::new(db)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let client = SmmProviderClient::new(config.provider.timeout()).map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to build provider client: {}", e))
        })?;

        Self::build_with(config, store, Arc::new(client)).await
    }

    /// Build the application over an explicit store and provider client.
    pub async fn build_with(
        config: SmmConfig,
        store: Arc<dyn Store>,
        providers: Arc<dyn ProviderApi>,
    ) -> Result<Self, AppError> {
        init_metrics();

        let state = AppState::new(store, providers);

        let scheduler = if config.scheduler.enabled {
            Some(
                Scheduler::new()
                    .with_job(
                        Arc::new(state.reconciler.clone()),
                        Duration::from_secs(config.scheduler.reconcile_interval_secs),
                    )
                    .with_job(
                        Arc::new(state.rates.clone()),
                        Duration::from_secs(config.scheduler.rate_sync_interval_secs),
                    ),
            )
        } else {
            tracing::info!("Scheduler disabled by configuration");
            None
        };

        let addr = config.common.bind_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "smm-service listener bound");

        Ok(Self {
            port,
            listener,
            state,
            scheduler,
            shutdown_grace: Duration::from_secs(config.common.shutdown_grace_secs),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until `shutdown` resolves, then stop background jobs.
    pub async fn run_until_stopped<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handles = self
            .scheduler
            .as_ref()
            .map(Scheduler::start)
            .unwrap_or_default();

        tracing::info!(
            service = "smm-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            scheduled_jobs = handles.len(),
            "Service ready to accept connections"
        );

        let result = axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await;

        if let Some(scheduler) = &self.scheduler {
            scheduler.shutdown();
            let drained = tokio::time::timeout(self.shutdown_grace, async {
                for handle in handles {
                    if let Err(e) = handle.await {
                        tracing::warn!(error = %e, "Scheduled job ended abnormally");
                    }
                }
            })
            .await;
            if drained.is_err() {
                tracing::warn!(
                    grace_secs = self.shutdown_grace.as_secs(),
                    "Scheduled jobs still running after shutdown grace period"
                );
            }
        }

        result.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}

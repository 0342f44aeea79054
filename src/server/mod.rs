//! kvbucket HTTP server
//!
//! axum router over the bucket manager and value store. Process-wide state is
//! a single storage handle, opened before serving and released after the
//! server has shut down.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;

use axum::{extract::DefaultBodyLimit, extract::Extension, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::bucket::BucketManager;
use crate::config::{Settings, DEFAULT_BIND, DEFAULT_MAX_BODY_SIZE, DEFAULT_PORT};
use crate::storage::Storage;
use crate::values::ValueStore;

pub use error::ApiError;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP server bind address
    pub http_addr: String,
    /// HTTP port
    pub http_port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: DEFAULT_BIND.to_string(),
            http_port: DEFAULT_PORT,
            enable_cors: false,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl From<&Settings> for ServerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            http_addr: settings.server.bind.clone(),
            http_port: settings.server.port,
            enable_cors: settings.server.enable_cors,
            max_body_size: settings.server.max_body_size,
        }
    }
}

/// Shared application state
pub struct AppState {
    pub buckets: Arc<BucketManager>,
    pub values: Arc<ValueStore>,
    pub config: ServerConfig,
    pub metrics: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish()
    }
}

impl AppState {
    pub fn new(storage: Arc<Storage>, config: ServerConfig) -> Self {
        Self {
            buckets: Arc::new(BucketManager::new(storage.clone())),
            values: Arc::new(ValueStore::new(storage)),
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Install the global Prometheus recorder.
///
/// Only one recorder can exist per process; later calls return `None`.
pub fn install_metrics_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Metrics recorder not installed");
            None
        }
    }
}

/// Build the router with all routes and layers.
pub fn build_router(state: AppState) -> Router {
    let enable_cors = state.config.enable_cors;
    let max_body_size = state.config.max_body_size;

    let app = Router::new()
        .merge(routes::api_routes())
        .merge(routes::health_routes())
        .layer(Extension(Arc::new(state)))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(axum::middleware::from_fn(middleware::log_request))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    if enable_cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Start the kvbucket server and run until `shutdown` resolves.
pub async fn start_server<F>(
    config: ServerConfig,
    storage: Arc<Storage>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(
        addr = %config.http_addr,
        port = config.http_port,
        "Starting kvbucket HTTP server"
    );

    let mut state = AppState::new(storage, config.clone());
    if let Some(handle) = install_metrics_recorder() {
        state = state.with_metrics(handle);
    }

    let app = build_router(state);

    // Bind and serve
    let addr = format!("{}:{}", config.http_addr, config.http_port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| {
            error!(error = %e, "Server error");
            anyhow::anyhow!("Server failed: {}", e)
        })?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
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
                error!(error = %e, "Failed to listen for SIGTERM");
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

    info!("Shutdown signal received");
}

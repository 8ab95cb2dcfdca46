//! HTTP server for the forecast and data pull API

use crate::api::handlers;
use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// API server manager
pub struct ApiServer {
    state: Arc<AppState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ApiServer {
    /// Create a new server
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            shutdown_tx: None,
            task: None,
        }
    }

    /// Build the router with all routes
    pub fn router(state: Arc<AppState>) -> Router {
        // Build CORS layer (dashboards call from other origins)
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            // ================================================================
            // Health check
            // ================================================================
            .route("/health", get(handlers::health_check))
            .route("/", get(handlers::health_check))

            // ================================================================
            // On-demand forecast
            // GET|POST /api/forecast?days=N  (or JSON body {"days": N})
            // ================================================================
            .route("/api/forecast", get(handlers::forecast).post(handlers::forecast))
            .route("/api/http_trigger", get(handlers::forecast).post(handlers::forecast))

            // ================================================================
            // Recent readings and cached batch forecast
            // ================================================================
            .route("/api/data", get(handlers::data_pull))
            .route("/api/data_pull_http_trigger", get(handlers::data_pull))

            .with_state(state)
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind `addr` and serve in the background; returns the bound address
    pub async fn start(&mut self, addr: SocketAddr) -> Result<SocketAddr> {
        let app = Self::router(self.state.clone());

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::Config(format!("Failed to bind to {}: {}", addr, e)))?;
        let local_addr = listener.local_addr()?;

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        info!("Starting Sensorcast API server on {}", local_addr);

        self.task = Some(tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("API server shutting down");
            });

            if let Err(e) = server.await {
                error!("API server error: {}", e);
            }
        }));

        info!("=== Endpoints ===");
        info!("  GET       http://{}/health", local_addr);
        info!("  GET|POST  http://{}/api/forecast?days=N", local_addr);
        info!("  GET       http://{}/api/data", local_addr);

        Ok(local_addr)
    }

    /// Stop the server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            info!("API server stop signal sent");
        }
    }

    /// Stop the server and wait for in-flight requests to finish
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("API server task failed: {}", e);
            }
        }
    }

    /// Check if server is running
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.stop();
    }
}

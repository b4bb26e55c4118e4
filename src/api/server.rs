//! HTTP server with axum router and graceful shutdown.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{get_all, run_command, run_commands, AppState};
use crate::config::ServerConfig;
use crate::service::MuninService;

/// HTTP server exposing the cached munin data.
pub struct ApiServer {
    /// Server configuration.
    config: ServerConfig,
    /// Application state shared across handlers.
    state: AppState,
}

impl ApiServer {
    /// Create a new server with default configuration.
    #[must_use]
    pub fn new(service: Arc<MuninService>) -> Self {
        Self {
            config: ServerConfig::default(),
            state: AppState::new(service),
        }
    }

    /// Set the server configuration (builder pattern).
    #[must_use]
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the configured address as a string.
    #[must_use]
    pub fn address(&self) -> String {
        self.config.address()
    }

    /// Build the axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/munin", get(get_all))
            .route("/munin/runCommand", get(run_command))
            .route("/munin/runCommands", get(run_commands))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if self.config.cors_permissive {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Run the server, binding to the configured address.
    ///
    /// The server runs until `cancel` is triggered, then shuts down
    /// gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or serve.
    pub async fn run(self, cancel: CancellationToken) -> std::io::Result<()> {
        let addr = self.address();
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(address = %addr, "Starting munin HTTP server");
        self.serve(listener, cancel).await
    }

    /// Serve on an already bound listener until `cancel` is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if serving fails.
    pub async fn serve(self, listener: TcpListener, cancel: CancellationToken) -> std::io::Result<()> {
        let app = self.build_router();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                tracing::info!("Munin HTTP server shutting down gracefully");
            })
            .await
    }
}

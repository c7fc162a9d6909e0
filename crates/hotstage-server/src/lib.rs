//! HTTP surface for hotstage.
//!
//! Clients stage configuration files into a served file tree under a single
//! session token, then ask for a reload of every game process affected by
//! what they staged.
//!
//! # Features
//!
//! - Resource upload with automatic backup of overwritten files
//! - Reload of the processes the session's uploads affect
//! - Session status
//! - Token-based authentication
//! - Rate limiting
//! - Request logging
//!
//! # Example
//!
//! ```ignore
//! use hotstage_server::{Server, ServerConfig};
//!
//! let config = ServerConfig::new(Some("secret-token".to_string()))
//!     .with_bind_address("127.0.0.1:8080".parse()?)
//!     .with_root("/data/home/user00");
//!
//! let server = Server::new(config, coordinator);
//! server.run().await?;
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod routes;
pub mod staging;
pub mod state;

pub use auth::{AuthError, auth_middleware};
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use ratelimit::{rate_limit_middleware, request_logging_middleware};
pub use routes::{HealthResponse, ReloadResponse, SessionResponse};
pub use staging::{StageOutcome, Stager, UploadMode, UploadRequest};
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;

use axum::{Router, middleware};
use hotstage_reload::ReloadCoordinator;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The hotstage HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a new server over a reload coordinator.
    pub fn new(config: ServerConfig, coordinator: ReloadCoordinator) -> Self {
        Self {
            state: AppState::new(config, coordinator),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            // Health routes (no auth required)
            .merge(routes::health_routes())
            .nest("/api/v1", self.api_routes())
            // Request logging (inner layer, runs first)
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                ratelimit::request_logging_middleware,
            ))
            // Rate limiting (outer layer, runs before request logging)
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                ratelimit::rate_limit_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// API routes (v1).
    ///
    /// All API routes require authentication via the auth middleware.
    fn api_routes(&self) -> Router<AppState> {
        use axum::routing::{get, post};

        Router::new()
            .route(
                "/resources/{*path}",
                post(routes::create_resource_handler).put(routes::save_resource_handler),
            )
            .route(
                "/reload",
                post(routes::reload_handler).get(routes::reload_handler),
            )
            .route("/session", get(routes::session_status_handler))
            .layer(RequestBodyLimitLayer::new(self.state.config.max_body_size))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth::auth_middleware,
            ))
    }

    /// Run the server until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.serve(addr, shutdown_signal()).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        self.serve(addr, std::future::pending()).await
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }

    async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();

        info!(root = %self.state.config.root.display(), "Starting server on {}", addr);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;

        let sweeper = self.state.coordinator.store().spawn_sweeper();

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)));

        sweeper.close().await;
        info!("Server stopped");
        served
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Merge service routes with the built-in health endpoint
//! - Wire up middleware (correlation context, timeout, tracing)
//! - Serve on a bound listener until shutdown

use std::time::Duration;

use axum::{http::StatusCode, middleware, routing::get, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ToolkitConfig;
use crate::http::context::correlate;
use crate::lifecycle::signals::shutdown_signal;

/// Bootstraps an axum application with the toolkit's middleware.
pub struct HttpServer {
    router: Router,
    config: ToolkitConfig,
}

impl HttpServer {
    /// Wrap `routes` (already holding their state) for serving.
    pub fn new(config: ToolkitConfig, routes: Router) -> Self {
        let router = Self::build_router(&config, routes);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ToolkitConfig, routes: Router) -> Router {
        Router::new()
            .route("/health", get(health))
            .merge(routes)
            .layer(middleware::from_fn(correlate))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(config.timeouts.server_secs),
            ))
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router, e.g. for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &ToolkitConfig {
        &self.config
    }

    /// Serve until `shutdown` fires or the process receives a stop signal.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown.recv() => tracing::info!("Shutdown requested"),
                    _ = shutdown_signal() => {}
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

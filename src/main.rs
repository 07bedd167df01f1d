//! Demonstration service built on the toolkit.
//!
//! ```text
//!   Client ──▶ HttpServer (trace, timeout, correlation)
//!                 │
//!                 ├── GET  /health
//!                 └── POST /relay ──▶ OutboundClient ──▶ upstream
//!                                        │
//!                                        └── TimerRegistry ◀── Lifecycle (fatal exit)
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Extension, Json, Router,
};
use clap::Parser;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use service_kit::config::{load_config, LogFormat, ToolkitConfig};
use service_kit::http::{CallError, CallOutcome, CorrelationId, HttpServer, OutboundClient};
use service_kit::lifecycle::{ExitReason, Lifecycle, Shutdown, TimerRegistry};
use service_kit::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "service-kit")]
#[command(about = "Example service wired with the shared toolkit", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured log format (text|json).
    #[arg(long)]
    log_format: Option<LogFormat>,
}

struct AppState {
    client: OutboundClient,
}

#[derive(Deserialize)]
struct RelayRequest {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    body: Option<Value>,
    timeout_ms: Option<u64>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => load_config(path),
        None => Ok(ToolkitConfig::default()),
    };
    let mut config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => ToolkitConfig::default(),
    };
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    if let Err(e) = logging::init(&config.logging) {
        eprintln!("failed to initialize logging: {}", e);
    }

    let timers = Arc::new(TimerRegistry::new());
    let shutdown = Shutdown::new();
    let lifecycle = Lifecycle::new(timers.clone(), shutdown.clone());

    if let Err(e) = loaded {
        lifecycle.exit(ExitReason::error(e));
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_ms = config.timeouts.request_ms,
        query_timeout_ms = config.timeouts.query_ms,
        "Configuration loaded"
    );

    if config.metrics.enabled {
        match config.metrics.address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => lifecycle.exit(format!(
                "invalid metrics address '{}': {}",
                config.metrics.address, e
            )),
        }
    }

    let state = Arc::new(AppState {
        client: OutboundClient::new(timers.clone(), Duration::from_millis(config.timeouts.request_ms)),
    });
    let routes = Router::new()
        .route("/relay", post(relay))
        .with_state(state);

    let listener = match TcpListener::bind(&config.listener.bind_address).await {
        Ok(listener) => listener,
        Err(e) => lifecycle.exit(ExitReason::error(e)),
    };

    let server = HttpServer::new(config, routes);
    if let Err(e) = server.run(listener, shutdown.subscribe()).await {
        lifecycle.exit(ExitReason::error(e));
    }

    timers.drain_all();
    tracing::info!("Shutdown complete");
}

/// Forward a JSON request upstream through the deadline-bounded client.
async fn relay(
    State(state): State<Arc<AppState>>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
    Json(req): Json<RelayRequest>,
) -> Response {
    let body = req.body.as_ref().map(Value::to_string);
    let timeout = req.timeout_ms.map(Duration::from_millis);

    let result = state
        .client
        .call(&req.url, &req.method, body.as_deref(), timeout)
        .await;

    let (status, payload) = match result {
        Ok(CallOutcome::Success(data)) => (StatusCode::OK, json!({ "data": data })),
        Ok(CallOutcome::Aborted(reason)) => (
            StatusCode::GATEWAY_TIMEOUT,
            json!({ "error": reason.as_str() }),
        ),
        Ok(CallOutcome::Failure(failure)) => (
            StatusCode::BAD_GATEWAY,
            json!({ "error": failure.to_string() }),
        ),
        Err(e @ CallError::InvalidArgument(_)) => {
            (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() }))
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": e.to_string() })),
    };

    let mut payload = payload;
    payload["correlationId"] = Value::String(correlation_id);
    (status, Json(payload)).into_response()
}

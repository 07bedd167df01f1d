//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound:
//!     TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → context.rs (correlation ID, stopwatch)
//!     → service routes
//!
//! Outbound:
//!     handler → client.rs (validate, arm deadline, race transport)
//!     → CallOutcome
//! ```

pub mod client;
pub mod context;
pub mod request;
pub mod server;

pub use client::{
    AbortReason, BoxError, CallError, CallFailure, CallOutcome, OutboundClient, OutboundRequest,
    ReqwestTransport, Transport,
};
pub use context::{correlate, CorrelationId, RequestContext};
pub use request::{correlation_id, generate_id, X_CORRELATION_ID};
pub use server::HttpServer;

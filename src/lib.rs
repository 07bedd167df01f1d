//! Shared toolkit for HTTP services.
//!
//! Deadline-bounded outbound calls, a timer registry with fatal-exit
//! teardown, structured logging, request correlation and a query executor
//! over pooled connections.

pub mod config;
pub mod db;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::ToolkitConfig;
pub use db::QueryExecutor;
pub use http::{HttpServer, OutboundClient, RequestContext};
pub use lifecycle::{Lifecycle, Shutdown, TimerRegistry};

//! Request identifiers and header helpers.
//!
//! # Responsibilities
//! - Generate random request IDs (UUID v4)
//! - Generate correlation IDs (UUID v5 over a fixed namespace)
//! - Read forwarding headers off inbound requests
//!
//! # Design Decisions
//! - Correlation IDs hash pid, wall-clock nanos and a process-wide sequence,
//!   so two IDs from one process never collide

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::HeaderMap;
use uuid::Uuid;

/// Response header carrying the correlation ID.
pub const X_CORRELATION_ID: &str = "x-correlation-id";

/// Header naming the original client address behind proxies.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Namespace for correlation IDs.
pub const CORRELATION_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a5e_93b4_4d0a_8e27_5c1d_f0a9_b374);

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A random UUID v4 string.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// A namespace-derived UUID v5 string, unique within this process.
pub fn correlation_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let name = format!("{}:{}:{}", std::process::id(), nanos, seq);

    Uuid::new_v5(&CORRELATION_NAMESPACE, name.as_bytes()).to_string()
}

/// The `x-forwarded-for` value, if present and valid UTF-8.
pub fn forwarded_for(headers: &HeaderMap) -> Option<&str> {
    headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok())
}

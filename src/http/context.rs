//! Request-scoped correlation context.
//!
//! # Responsibilities
//! - Give every inbound request a correlation ID and a stopwatch
//! - Log request start and elapsed time tagged with the ID
//! - Expose the ID to handlers and echo it in a response header

use axum::{
    body::Body,
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use serde_json::{json, Value};
use time::OffsetDateTime;

use crate::http::request::{self, X_CORRELATION_ID};
use crate::observability::{metrics, Stopwatch};

/// Correlation ID of the current request, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

/// Per-request identity and timing.
#[derive(Debug)]
pub struct RequestContext {
    correlation_id: String,
    stopwatch: Stopwatch,
    started_at: OffsetDateTime,
    payload: Value,
}

impl RequestContext {
    /// Open a context for `request` and log its arrival.
    pub fn begin<B>(request: &axum::http::Request<B>) -> Self {
        let correlation_id = request::correlation_id();
        let forwarded = request::forwarded_for(request.headers()).unwrap_or("-");

        tracing::debug!(
            correlation_id = %correlation_id,
            forwarded_for = %forwarded,
            path = %request.uri().path(),
            "Request started"
        );

        Self {
            payload: json!({ "correlationId": correlation_id }),
            correlation_id,
            stopwatch: Stopwatch::start(),
            started_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    /// Default response payload, `{"correlationId": ...}`.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Stop timing, log the elapsed seconds and call `render` once.
    pub fn finish<R>(self, render: impl FnOnce(&Value) -> R) -> R {
        let elapsed = self.stopwatch.stop();
        tracing::info!(
            correlation_id = %self.correlation_id,
            elapsed_secs = elapsed,
            "Request finished"
        );
        render(&self.payload)
    }
}

/// Middleware wrapping each request in a [`RequestContext`].
pub async fn correlate(mut req: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext::begin(&req);
    req.extensions_mut()
        .insert(CorrelationId(ctx.correlation_id().to_string()));

    let watch = Stopwatch::start();
    let mut response = next.run(req).await;
    metrics::record_request(response.status().as_u16(), watch.stop());

    ctx.finish(|payload| {
        if let Some(id) = payload.get("correlationId").and_then(Value::as_str) {
            if let Ok(value) = HeaderValue::from_str(id) {
                response.headers_mut().insert(X_CORRELATION_ID, value);
            }
        }
        response
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    fn request(path: &str) -> HttpRequest<()> {
        HttpRequest::builder()
            .uri(path)
            .header("x-forwarded-for", "198.51.100.4")
            .body(())
            .unwrap()
    }

    #[test]
    fn test_contexts_have_distinct_ids() {
        let a = RequestContext::begin(&request("/a"));
        let b = RequestContext::begin(&request("/a"));
        assert_ne!(a.correlation_id(), b.correlation_id());
    }

    #[test]
    fn test_payload_shape() {
        let ctx = RequestContext::begin(&request("/users"));
        let id = ctx.correlation_id().to_string();
        assert_eq!(ctx.payload(), &json!({ "correlationId": id }));
    }

    #[test]
    fn test_finish_renders_exactly_once() {
        let ctx = RequestContext::begin(&request("/"));
        let id = ctx.correlation_id().to_string();
        let mut calls = 0;

        let rendered = ctx.finish(|payload| {
            calls += 1;
            payload["correlationId"].as_str().unwrap().to_string()
        });

        assert_eq!(calls, 1);
        assert_eq!(rendered, id);
    }
}

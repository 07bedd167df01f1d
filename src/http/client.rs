//! Deadline-bounded outbound HTTP calls.
//!
//! # Responsibilities
//! - Validate method, target and JSON body before any I/O
//! - Race the transport against a registry-tracked deadline
//! - Release the deadline timer on every exit path
//! - Report success, timeout and failure as distinct outcomes
//!
//! # Design Decisions
//! - Timeouts are an outcome (`Aborted`), not an error, so callers can tell
//!   "too slow" from "failed"
//! - Cancellation is cooperative: the transport future is dropped when the
//!   deadline token fires
//! - The transport is a trait so services and tests can swap it

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::lifecycle::TimerRegistry;
use crate::observability::{metrics, Stopwatch};

/// Boxed error from an external collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A validated outbound request.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: Url,
    pub method: Method,
    pub body: Option<String>,
    pub headers: HeaderMap,
}

/// The HTTP collaborator performing the actual exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the response body.
    ///
    /// Implementations should stop work once `cancel` fires.
    async fn send(&self, request: OutboundRequest, cancel: CancellationToken)
        -> Result<String, BoxError>;
}

/// Transport backed by a `reqwest` client.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Returned by a transport that noticed cancellation first.
#[derive(Debug, Error)]
#[error("request cancelled")]
pub struct Cancelled;

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: OutboundRequest,
        cancel: CancellationToken,
    ) -> Result<String, BoxError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let exchange = async {
            let response = builder.send().await?;
            response.text().await
        };

        let result: Result<String, BoxError> = tokio::select! {
            _ = cancel.cancelled() => Err(Box::new(Cancelled) as BoxError),
            result = exchange => result.map_err(|e| Box::new(e) as BoxError),
        };
        result
    }
}

/// Why a call was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Timeout,
}

impl AbortReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbortReason::Timeout => "timeout",
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A call that reached the transport but did not yield JSON.
#[derive(Debug, Error)]
pub enum CallFailure {
    #[error("request to {target} failed: {source}")]
    Transport {
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("response from {target} is not valid JSON: {source}")]
    Parse {
        target: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result of one outbound call.
#[derive(Debug)]
pub enum CallOutcome {
    Success(Value),
    Aborted(AbortReason),
    Failure(CallFailure),
}

impl CallOutcome {
    fn label(&self) -> &'static str {
        match self {
            CallOutcome::Success(_) => "success",
            CallOutcome::Aborted(_) => "aborted",
            CallOutcome::Failure(_) => "failure",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, CallOutcome::Aborted(_))
    }

    /// Turn non-success outcomes into errors.
    pub fn into_result(self) -> Result<Value, CallError> {
        match self {
            CallOutcome::Success(value) => Ok(value),
            CallOutcome::Aborted(reason) => Err(CallError::Aborted(reason)),
            CallOutcome::Failure(failure) => Err(CallError::Failure(failure)),
        }
    }
}

/// Errors surfaced by [`OutboundClient`].
#[derive(Debug, Error)]
pub enum CallError {
    /// Rejected before any timer was armed or I/O started.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("call aborted: {0}")]
    Aborted(AbortReason),

    #[error(transparent)]
    Failure(#[from] CallFailure),
}

/// Issues outbound calls bounded by a deadline.
pub struct OutboundClient<T = ReqwestTransport> {
    transport: T,
    timers: Arc<TimerRegistry>,
    default_timeout: Duration,
    headers: HeaderMap,
}

impl OutboundClient<ReqwestTransport> {
    /// Client using a fresh `reqwest` transport.
    pub fn new(timers: Arc<TimerRegistry>, default_timeout: Duration) -> Self {
        Self::with_transport(ReqwestTransport::default(), timers, default_timeout)
    }
}

impl<T: Transport> OutboundClient<T> {
    pub fn with_transport(transport: T, timers: Arc<TimerRegistry>, default_timeout: Duration) -> Self {
        Self {
            transport,
            timers,
            default_timeout,
            headers: HeaderMap::new(),
        }
    }

    /// Override the default deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Attach a header to every request.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Perform one call to `target`.
    ///
    /// `timeout` of `None` uses the client default. Argument errors are
    /// returned before any timer is armed.
    pub async fn call(
        &self,
        target: &str,
        method: &str,
        body: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<CallOutcome, CallError> {
        let request = self.prepare(target, method, body)?;
        let timeout = timeout.unwrap_or(self.default_timeout);
        let watch = Stopwatch::start();

        let token = CancellationToken::new();
        let deadline = self.timers.deadline(timeout, token.clone());

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => CallOutcome::Aborted(AbortReason::Timeout),
            result = self.transport.send(request, token.clone()) => match result {
                Ok(text) => match serde_json::from_str(&text) {
                    Ok(value) => CallOutcome::Success(value),
                    Err(source) => CallOutcome::Failure(CallFailure::Parse {
                        target: target.to_string(),
                        source,
                    }),
                },
                Err(source) => CallOutcome::Failure(CallFailure::Transport {
                    target: target.to_string(),
                    source,
                }),
            },
        };
        drop(deadline);

        let elapsed = watch.stop();
        metrics::record_call(outcome.label(), elapsed);
        match &outcome {
            CallOutcome::Success(_) => {
                tracing::debug!(url = %target, method = %method, elapsed_secs = elapsed, "Outbound call succeeded")
            }
            CallOutcome::Aborted(reason) => tracing::warn!(
                url = %target,
                timeout_ms = timeout.as_millis() as u64,
                reason = %reason,
                "Outbound call aborted"
            ),
            CallOutcome::Failure(failure) => {
                tracing::error!(url = %target, error = %failure, "Outbound call failed")
            }
        }

        Ok(outcome)
    }

    fn prepare(&self, target: &str, method: &str, body: Option<&str>) -> Result<OutboundRequest, CallError> {
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| CallError::InvalidArgument(format!("method '{}' is not a valid HTTP method", method)))?;
        let url = Url::parse(target)
            .map_err(|e| CallError::InvalidArgument(format!("target '{}' is not a valid URL: {}", target, e)))?;

        let mut headers = self.headers.clone();
        let body = match body {
            Some(body) => {
                serde_json::from_str::<Value>(body)
                    .map_err(|e| CallError::InvalidArgument(format!("body is not valid JSON: {}", e)))?;
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Some(body.to_string())
            }
            None => None,
        };

        Ok(OutboundRequest {
            url,
            method,
            body,
            headers,
        })
    }
}

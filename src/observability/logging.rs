//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber (text or JSON)
//! - Route error events to stderr and everything else to stdout
//! - Build leveled log records from single values, sequences or errors
//!
//! # Design Decisions
//! - The payload shape is chosen once, at the call site, via `LogPayload`
//! - Error payloads always log at `error`, whatever level was requested
//! - ANSI decoration per stream, only on a terminal; JSON is never decorated

use std::fmt;
use std::io::IsTerminal;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{Level, Subscriber};
use tracing_subscriber::filter::{filter_fn, LevelFilter};
use tracing_subscriber::fmt::{format::Writer, time::FormatTime, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{
    fmt as fmt_layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

use crate::config::schema::{LogFormat, LoggingConfig};

/// Errors raised while setting up logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log format: {0} (expected: text|json)")]
    InvalidFormat(String),

    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    #[error("Logger already initialized")]
    AlreadyInitialized,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Install the global subscriber described by `cfg`.
///
/// `RUST_LOG` takes precedence over `cfg.level` when set. Error events go to
/// stderr, everything else to stdout; each stream is colored only when it is
/// a terminal.
pub fn init(cfg: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cfg.level)
            .map_err(|e| LoggingError::InvalidLevel(format!("{}: {}", cfg.level, e)))?,
    };

    install(build_subscriber(
        cfg,
        filter,
        std::io::stderr,
        std::io::stderr().is_terminal(),
        std::io::stdout,
        std::io::stdout().is_terminal(),
    ))
}

/// Assemble the subscriber without installing it.
///
/// `errors` receives `ERROR` events only and `standard` receives the rest.
/// The `*_is_terminal` flags gate color per sink, on top of `cfg.use_color`.
pub fn build_subscriber<E, O>(
    cfg: &LoggingConfig,
    filter: EnvFilter,
    errors: E,
    errors_is_terminal: bool,
    standard: O,
    standard_is_terminal: bool,
) -> impl Subscriber + Send + Sync + 'static
where
    E: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    O: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let errors_layer = sink_layer(cfg, errors, cfg.use_color && errors_is_terminal)
        .with_filter(LevelFilter::ERROR);
    let standard_layer = sink_layer(cfg, standard, cfg.use_color && standard_is_terminal)
        .with_filter(filter_fn(|meta| *meta.level() != Level::ERROR));

    tracing_subscriber::registry()
        .with(filter)
        .with(errors_layer)
        .with(standard_layer)
}

fn sink_layer<S, W>(cfg: &LoggingConfig, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match cfg.format {
        LogFormat::Text => fmt_layer::layer()
            .with_ansi(ansi)
            .with_target(cfg.with_targets)
            .with_timer(Rfc3339Timer)
            .with_writer(writer)
            .boxed(),
        LogFormat::Json => fmt_layer::layer()
            .json()
            .with_ansi(false)
            .with_target(cfg.with_targets)
            .with_timer(Rfc3339Timer)
            .with_writer(writer)
            .boxed(),
    }
}

fn install<S>(subscriber: S) -> Result<(), LoggingError>
where
    S: Subscriber + Send + Sync + 'static,
{
    subscriber
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)
}

/// UTC RFC3339 timestamps for the fmt layer.
#[derive(Debug, Clone, Copy)]
pub struct Rfc3339Timer;

impl FormatTime for Rfc3339Timer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        match OffsetDateTime::now_utc().format(&Rfc3339) {
            Ok(ts) => write!(w, "{}", ts),
            Err(_) => write!(w, "<invalid-time>"),
        }
    }
}

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    #[default]
    Info,
    Debug,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller wants logged.
#[derive(Debug, Clone, PartialEq)]
pub enum LogPayload {
    /// One value; a JSON array is treated as a sequence.
    Value(Value),
    /// Ordered values rendered space-separated.
    Sequence(Vec<Value>),
    /// An error and its source chain.
    Error { message: String, chain: Vec<String> },
}

impl LogPayload {
    /// Capture an error together with its `source()` chain.
    pub fn error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        LogPayload::Error {
            message: err.to_string(),
            chain,
        }
    }

    fn is_error(&self) -> bool {
        matches!(self, LogPayload::Error { .. })
    }

    fn into_values(self) -> Vec<Value> {
        match self {
            LogPayload::Value(Value::Array(values)) => values,
            LogPayload::Value(value) => vec![value],
            LogPayload::Sequence(values) => values,
            LogPayload::Error { message, chain } => {
                let mut text = message;
                for cause in chain {
                    text.push_str(": ");
                    text.push_str(&cause);
                }
                vec![Value::String(text)]
            }
        }
    }
}

impl From<&str> for LogPayload {
    fn from(s: &str) -> Self {
        LogPayload::Value(Value::String(s.to_string()))
    }
}

impl From<String> for LogPayload {
    fn from(s: String) -> Self {
        LogPayload::Value(Value::String(s))
    }
}

impl From<Value> for LogPayload {
    fn from(v: Value) -> Self {
        LogPayload::Value(v)
    }
}

impl From<Vec<Value>> for LogPayload {
    fn from(values: Vec<Value>) -> Self {
        LogPayload::Sequence(values)
    }
}

/// One immutable log line.
#[derive(Debug, Clone)]
pub struct LogRecord {
    timestamp: OffsetDateTime,
    process_id: u32,
    level: LogLevel,
    message: Vec<Value>,
}

impl LogRecord {
    /// Build a record; `None` means `info`, error payloads force `error`.
    pub fn new(payload: impl Into<LogPayload>, level: Option<LogLevel>) -> Self {
        let payload = payload.into();
        let level = if payload.is_error() {
            LogLevel::Error
        } else {
            level.unwrap_or_default()
        };

        Self {
            timestamp: OffsetDateTime::now_utc(),
            process_id: std::process::id(),
            level,
            message: payload.into_values(),
        }
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn message(&self) -> &[Value] {
        &self.message
    }

    /// Message values joined by spaces; strings are not quoted.
    pub fn message_text(&self) -> String {
        self.message
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Hand the record to the installed `tracing` subscriber.
    pub fn emit(&self) {
        let text = self.message_text();
        match self.level {
            LogLevel::Info => tracing::info!(pid = self.process_id, "{}", text),
            LogLevel::Debug => tracing::debug!(pid = self.process_id, "{}", text),
            LogLevel::Error => tracing::error!(pid = self.process_id, "{}", text),
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ts = self
            .timestamp
            .format(&Rfc3339)
            .unwrap_or_else(|_| "<invalid-time>".to_string());
        write!(
            f,
            "{} [{}] {} {}",
            ts,
            self.process_id,
            self.level.as_str().to_ascii_uppercase(),
            self.message_text()
        )
    }
}

/// Log `payload` at `level` (default `info`).
pub fn log(payload: impl Into<LogPayload>, level: Option<LogLevel>) {
    LogRecord::new(payload, level).emit();
}

pub fn info(payload: impl Into<LogPayload>) {
    log(payload, Some(LogLevel::Info));
}

pub fn debug(payload: impl Into<LogPayload>) {
    log(payload, Some(LogLevel::Debug));
}

pub fn error(payload: impl Into<LogPayload>) {
    log(payload, Some(LogLevel::Error));
}

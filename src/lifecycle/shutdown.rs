//! Shutdown coordination and fatal exit.

use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::lifecycle::timers::TimerRegistry;
use crate::observability::logging::{self, LogPayload};

/// Exit status used for every fatal termination.
pub const FATAL_EXIT_CODE: i32 = 1;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Why the process is going down.
#[derive(Debug)]
pub enum ExitReason {
    Message(String),
    Error(Box<dyn std::error::Error + Send + Sync>),
}

impl ExitReason {
    pub fn error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ExitReason::Error(Box::new(err))
    }

    fn payload(&self) -> LogPayload {
        match self {
            ExitReason::Message(msg) => LogPayload::Error {
                message: msg.clone(),
                chain: Vec::new(),
            },
            ExitReason::Error(err) => LogPayload::error(&**err),
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Message(msg) => f.write_str(msg),
            ExitReason::Error(err) => write!(f, "{}", err),
        }
    }
}

impl From<&str> for ExitReason {
    fn from(msg: &str) -> Self {
        ExitReason::Message(msg.to_string())
    }
}

impl From<String> for ExitReason {
    fn from(msg: String) -> Self {
        ExitReason::Message(msg)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for ExitReason {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        ExitReason::Error(err)
    }
}

/// The only sanctioned path to terminate the process.
///
/// Not for recoverable errors.
#[derive(Clone)]
pub struct Lifecycle {
    timers: Arc<TimerRegistry>,
    shutdown: Shutdown,
}

impl Lifecycle {
    pub fn new(timers: Arc<TimerRegistry>, shutdown: Shutdown) -> Self {
        Self { timers, shutdown }
    }

    pub fn timers(&self) -> &Arc<TimerRegistry> {
        &self.timers
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Log `reason`, drain pending timers and exit with status 1.
    pub fn exit(&self, reason: impl Into<ExitReason>) -> ! {
        let code = self.teardown(reason);
        std::process::exit(code)
    }

    /// Everything `exit` does short of terminating; returns the exit code.
    pub fn teardown(&self, reason: impl Into<ExitReason>) -> i32 {
        let reason = reason.into();
        logging::log(reason.payload(), None);

        let drained = self.timers.drain_all();
        self.shutdown.trigger();
        tracing::debug!(drained, code = FATAL_EXIT_CODE, "Fatal teardown complete");

        FATAL_EXIT_CODE
    }
}

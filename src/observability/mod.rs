//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (leveled records through tracing)
//!     → metrics.rs (counters, histograms)
//!     → stopwatch.rs (elapsed time for requests and calls)
//!
//! Consumers:
//!     → stdout / stderr (text or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
pub mod stopwatch;

pub use logging::{LogLevel, LogPayload, LogRecord};
pub use stopwatch::Stopwatch;

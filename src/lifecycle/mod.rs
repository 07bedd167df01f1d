//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Timers (timers.rs):
//!     arm → deadline task spawned → clear on settle
//!
//! Fatal exit (shutdown.rs):
//!     Log error → Drain timers → Broadcast shutdown → exit(1)
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - The timer registry is owned by the service instance, not a global
//! - Only `Lifecycle::exit` terminates the process

pub mod shutdown;
pub mod signals;
pub mod timers;

pub use shutdown::{ExitReason, Lifecycle, Shutdown, FATAL_EXIT_CODE};
pub use timers::{ArmedTimer, TimerHandle, TimerRegistry};

//! Database access over externally managed connection pools.
//!
//! # Data Flow
//! ```text
//! Handler
//!     → executor.rs (deadline + error wrapping)
//!     → PooledConnection (external pool, driver, SQL engine)
//!     → rows in connection order
//! ```
//!
//! Pool sizing, checkout and SQL dialects belong to the driver.

pub mod executor;

pub use executor::{
    EmptyStatement, PooledConnection, QueryExecutor, QueryFailure, QueryOptions, QueryTimedOut,
    Row,
};

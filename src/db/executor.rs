//! Single-statement execution against a pooled connection.
//!
//! # Responsibilities
//! - Bound every statement with a deadline
//! - Wrap any failure with the statement that caused it
//! - Return rows in connection order, untouched

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::http::client::BoxError;
use crate::lifecycle::TimerRegistry;
use crate::observability::{metrics, Stopwatch};

/// One result row, column name to value.
pub type Row = Map<String, Value>;

/// What the connection is asked to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    pub sql: String,
    pub timeout: Duration,
}

/// A connection checked out of an external pool.
#[async_trait]
pub trait PooledConnection: Send + Sync {
    async fn query(&self, options: QueryOptions) -> Result<Vec<Row>, BoxError>;
}

/// The deadline elapsed before the connection answered.
#[derive(Debug, Error)]
#[error("query timed out after {} ms", .0.as_millis())]
pub struct QueryTimedOut(pub Duration);

/// The statement text was empty.
#[derive(Debug, Error)]
#[error("statement is empty")]
pub struct EmptyStatement;

/// A statement that could not be executed.
#[derive(Debug, Error)]
#[error("query failed: {statement}: {cause}")]
pub struct QueryFailure {
    statement: String,
    #[source]
    cause: BoxError,
}

impl QueryFailure {
    pub fn new(statement: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self {
            statement: statement.into(),
            cause: cause.into(),
        }
    }

    /// The statement as submitted.
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// The underlying error.
    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.cause.as_ref()
    }

    pub fn is_timeout(&self) -> bool {
        self.cause.is::<QueryTimedOut>()
    }
}

/// Runs statements with a per-call timeout.
#[derive(Clone)]
pub struct QueryExecutor {
    timers: Arc<TimerRegistry>,
    timeout: Duration,
}

impl QueryExecutor {
    pub fn new(timers: Arc<TimerRegistry>, timeout: Duration) -> Self {
        Self { timers, timeout }
    }

    /// Override the statement timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `statement` on `connection`.
    pub async fn execute(
        &self,
        connection: &dyn PooledConnection,
        statement: &str,
    ) -> Result<Vec<Row>, QueryFailure> {
        if statement.trim().is_empty() {
            return Err(QueryFailure::new(statement, EmptyStatement));
        }

        let watch = Stopwatch::start();
        let options = QueryOptions {
            sql: statement.to_string(),
            timeout: self.timeout,
        };

        let token = CancellationToken::new();
        let deadline = self.timers.deadline(self.timeout, token.clone());

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(QueryFailure::new(statement, QueryTimedOut(self.timeout))),
            rows = connection.query(options) => rows.map_err(|cause| QueryFailure::new(statement, cause)),
        };
        drop(deadline);

        let elapsed = watch.stop();
        match &result {
            Ok(rows) => {
                metrics::record_query("success", elapsed);
                tracing::debug!(rows = rows.len(), elapsed_secs = elapsed, "Query completed");
            }
            Err(e) => {
                metrics::record_query(if e.is_timeout() { "timeout" } else { "failure" }, elapsed);
                tracing::error!(statement = %statement, error = %e.cause(), "Query failed");
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Connection returning canned rows or errors per statement.
    #[derive(Default)]
    struct FakeConnection {
        delay: Duration,
        seen: Mutex<Vec<QueryOptions>>,
    }

    #[async_trait]
    impl PooledConnection for FakeConnection {
        async fn query(&self, options: QueryOptions) -> Result<Vec<Row>, BoxError> {
            self.seen.lock().unwrap().push(options.clone());
            tokio::time::sleep(self.delay).await;

            match options.sql.as_str() {
                "SELECT 1" => Ok(vec![row(json!({"1": 1}))]),
                "SELECT id FROM users" => Ok(vec![
                    row(json!({"id": 3})),
                    row(json!({"id": 1})),
                    row(json!({"id": 2})),
                ]),
                _ => Err("table not found".into()),
            }
        }
    }

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn executor(timeout: Duration) -> (QueryExecutor, Arc<TimerRegistry>) {
        let timers = Arc::new(TimerRegistry::new());
        (QueryExecutor::new(timers.clone(), timeout), timers)
    }

    #[tokio::test]
    async fn test_select_one() {
        let (executor, timers) = executor(Duration::from_secs(1));
        let conn = FakeConnection::default();

        let rows = executor.execute(&conn, "SELECT 1").await.unwrap();

        assert_eq!(rows, vec![row(json!({"1": 1}))]);
        assert!(timers.is_empty());
        assert_eq!(
            conn.seen.lock().unwrap()[0],
            QueryOptions {
                sql: "SELECT 1".into(),
                timeout: Duration::from_secs(1)
            }
        );
    }

    #[tokio::test]
    async fn test_rows_keep_connection_order() {
        let (executor, _) = executor(Duration::from_secs(1));
        let rows = executor
            .execute(&FakeConnection::default(), "SELECT id FROM users")
            .await
            .unwrap();

        let ids: Vec<_> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_failure_embeds_statement_and_cause() {
        let (executor, timers) = executor(Duration::from_secs(1));

        let err = executor
            .execute(&FakeConnection::default(), "SELECT * FROM missing")
            .await
            .unwrap_err();

        assert_eq!(err.statement(), "SELECT * FROM missing");
        assert!(err.cause().to_string().contains("table not found"));
        assert!(err.to_string().contains("SELECT * FROM missing"));
        assert!(!err.is_timeout());
        assert!(timers.is_empty());
    }

    #[tokio::test]
    async fn test_slow_query_times_out() {
        let (executor, timers) = executor(Duration::from_millis(20));
        let conn = FakeConnection {
            delay: Duration::from_secs(5),
            ..Default::default()
        };

        let err = executor.execute(&conn, "SELECT 1").await.unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.cause().to_string(), "query timed out after 20 ms");
        assert!(timers.is_empty());
    }

    #[tokio::test]
    async fn test_empty_statement_never_reaches_connection() {
        let (executor, _) = executor(Duration::from_secs(1));
        let conn = FakeConnection::default();

        let err = executor.execute(&conn, "   ").await.unwrap_err();

        assert!(err.cause().is::<EmptyStatement>());
        assert!(conn.seen.lock().unwrap().is_empty());
    }
}

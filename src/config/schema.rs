//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for a service built on the toolkit.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ToolkitConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Outbound call, query and inbound request timeouts.
    pub timeouts: TimeoutConfig,

    /// Logging output.
    pub logging: LoggingConfig,

    /// Metrics exporter.
    pub metrics: MetricsConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Default deadline for outbound calls in milliseconds.
    pub request_ms: u64,

    /// Default deadline for database statements in milliseconds.
    pub query_ms: u64,

    /// Inbound request timeout enforced by the server in seconds.
    pub server_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: 10_000,
            query_ms: 30_000,
            server_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,

    /// Filter expression (e.g., "info", "service_kit=debug,info").
    pub level: String,

    /// Colored output when writing to a terminal.
    pub use_color: bool,

    /// Include module targets in log lines.
    pub with_targets: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            level: "info".to_string(),
            use_color: true,
            with_targets: true,
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable the Prometheus endpoint.
    pub enabled: bool,

    /// Metrics endpoint bind address.
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ToolkitConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.timeouts.request_ms, 10_000);
        assert_eq!(config.timeouts.query_ms, 30_000);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ToolkitConfig = toml::from_str(
            r#"
            [timeouts]
            request_ms = 2500

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.timeouts.request_ms, 2500);
        assert_eq!(config.timeouts.query_ms, 30_000);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }
}

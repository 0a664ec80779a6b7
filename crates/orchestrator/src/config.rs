//! Process configuration loaded from environment variables.

use messaging::{ClientConfig, ConfigurationError};

/// Orchestrator configuration.
///
/// Reads from environment variables:
/// - `KAFKA_*`: broker client settings, see [`ClientConfig`]
/// - `METRICS_PORT`: Prometheus exporter port (default: `9000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub client: ClientConfig,
    pub metrics_port: u16,
    pub log_level: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client = ClientConfig::from_lookup(&lookup)?;
        let metrics_port = match lookup("METRICS_PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigurationError::InvalidSetting {
                    key: "METRICS_PORT",
                    value: raw.clone(),
                    reason: "expected a port number".to_string(),
                })?,
            None => 9000,
        };
        Ok(Self {
            client,
            metrics_port,
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Returns the `"0.0.0.0:port"` address of the metrics exporter.
    pub fn metrics_addr(&self) -> String {
        format!("0.0.0.0:{}", self.metrics_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            metrics_port: 9000,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use messaging::OffsetReset;

    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.metrics_port, 9000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.client, ClientConfig::default());
    }

    #[test]
    fn test_metrics_addr_formatting() {
        let config = Config {
            metrics_port: 9464,
            ..Config::default()
        };
        assert_eq!(config.metrics_addr(), "0.0.0.0:9464");
    }

    #[test]
    fn test_lookup_reads_client_and_process_settings() {
        let config = Config::from_lookup(|key| match key {
            "KAFKA_AUTO_OFFSET_RESET" => Some("earliest".to_string()),
            "METRICS_PORT" => Some("9100".to_string()),
            "RUST_LOG" => Some("debug".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.client.auto_offset_reset, OffsetReset::Earliest);
        assert_eq!(config.metrics_port, 9100);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_invalid_metrics_port_is_rejected() {
        let result = Config::from_lookup(|key| (key == "METRICS_PORT").then(|| "http".to_string()));
        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidSetting {
                key: "METRICS_PORT",
                ..
            })
        ));
    }
}

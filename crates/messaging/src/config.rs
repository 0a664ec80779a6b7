//! Broker client configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Where a consumer group starts reading when it has no committed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetReset {
    /// Replay the channel from its first record.
    Earliest,
    /// Only deliver records published after the consumer joined.
    #[default]
    Latest,
}

impl OffsetReset {
    /// Returns the policy as the broker expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetReset::Earliest => "earliest",
            OffsetReset::Latest => "latest",
        }
    }
}

impl std::fmt::Display for OffsetReset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OffsetReset {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "earliest" => Ok(OffsetReset::Earliest),
            "latest" => Ok(OffsetReset::Latest),
            _ => Err(ConfigurationError::InvalidSetting {
                key: ENV_AUTO_OFFSET_RESET,
                value: s.to_string(),
                reason: "expected 'earliest' or 'latest'".to_string(),
            }),
        }
    }
}

pub const ENV_BOOTSTRAP_SERVERS: &str = "KAFKA_BOOTSTRAP_SERVERS";
pub const ENV_GROUP_ID: &str = "KAFKA_GROUP_ID";
pub const ENV_AUTO_OFFSET_RESET: &str = "KAFKA_AUTO_OFFSET_RESET";
pub const ENV_CLIENT_ID: &str = "KAFKA_CLIENT_ID";
pub const ENV_ENABLE_AUTO_COMMIT: &str = "KAFKA_ENABLE_AUTO_COMMIT";
pub const ENV_PROVISIONING_TIMEOUT_MS: &str = "KAFKA_PROVISIONING_TIMEOUT_MS";
pub const ENV_MESSAGE_TIMEOUT_MS: &str = "KAFKA_MESSAGE_TIMEOUT_MS";

const DEFAULT_BOOTSTRAP_SERVERS: &str = "localhost:9092";
const DEFAULT_GROUP_ID: &str = "orchestrator-group";
const DEFAULT_CLIENT_ID: &str = "orchestrator-service";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings shared by every broker client of the process.
///
/// Reads from environment variables:
/// - `KAFKA_BOOTSTRAP_SERVERS`: comma-separated broker list (default: `"localhost:9092"`)
/// - `KAFKA_GROUP_ID`: consumer group shared by all consumers (default: `"orchestrator-group"`)
/// - `KAFKA_AUTO_OFFSET_RESET`: `earliest` or `latest` (default: `latest`)
/// - `KAFKA_CLIENT_ID`: client id reported to the broker (default: `"orchestrator-service"`)
/// - `KAFKA_ENABLE_AUTO_COMMIT`: commit offsets on delivery (default: `true`)
/// - `KAFKA_PROVISIONING_TIMEOUT_MS`: per-channel admin timeout (default: `30000`)
/// - `KAFKA_MESSAGE_TIMEOUT_MS`: producer delivery timeout (default: `30000`)
///
/// Keys and values are always UTF-8 strings; the codec is not configurable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub bootstrap_servers: Vec<String>,
    pub group_id: String,
    pub auto_offset_reset: OffsetReset,
    pub client_id: String,
    pub enable_auto_commit: bool,
    pub provisioning_timeout: Duration,
    pub message_timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration for the given brokers and group with defaults elsewhere.
    pub fn new(bootstrap_servers: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: split_servers(&bootstrap_servers.into()),
            group_id: group_id.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup, falling back to defaults
    /// for missing keys and rejecting values that do not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bootstrap_servers = match lookup(ENV_BOOTSTRAP_SERVERS) {
            Some(raw) => split_servers(&raw),
            None => defaults.bootstrap_servers,
        };

        let group_id = match lookup(ENV_GROUP_ID) {
            Some(raw) if raw.trim().is_empty() => {
                return Err(ConfigurationError::InvalidSetting {
                    key: ENV_GROUP_ID,
                    value: raw,
                    reason: "must not be empty".to_string(),
                });
            }
            Some(raw) => raw.trim().to_string(),
            None => defaults.group_id,
        };

        let auto_offset_reset = match lookup(ENV_AUTO_OFFSET_RESET) {
            Some(raw) => raw.parse()?,
            None => defaults.auto_offset_reset,
        };

        let client_id = match lookup(ENV_CLIENT_ID) {
            Some(raw) if raw.trim().is_empty() => {
                return Err(ConfigurationError::InvalidSetting {
                    key: ENV_CLIENT_ID,
                    value: raw,
                    reason: "must not be empty".to_string(),
                });
            }
            Some(raw) => raw.trim().to_string(),
            None => defaults.client_id,
        };

        let enable_auto_commit = match lookup(ENV_ENABLE_AUTO_COMMIT) {
            Some(raw) => parse_bool(ENV_ENABLE_AUTO_COMMIT, &raw)?,
            None => defaults.enable_auto_commit,
        };

        let provisioning_timeout = match lookup(ENV_PROVISIONING_TIMEOUT_MS) {
            Some(raw) => parse_millis(ENV_PROVISIONING_TIMEOUT_MS, &raw)?,
            None => defaults.provisioning_timeout,
        };

        let message_timeout = match lookup(ENV_MESSAGE_TIMEOUT_MS) {
            Some(raw) => parse_millis(ENV_MESSAGE_TIMEOUT_MS, &raw)?,
            None => defaults.message_timeout,
        };

        let config = Self {
            bootstrap_servers,
            group_id,
            auto_offset_reset,
            client_id,
            enable_auto_commit,
            provisioning_timeout,
            message_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that the broker library would otherwise report late.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.bootstrap_servers.is_empty() {
            return Err(ConfigurationError::NoBootstrapServers);
        }
        if self.group_id.is_empty() {
            return Err(ConfigurationError::InvalidSetting {
                key: ENV_GROUP_ID,
                value: String::new(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.client_id.is_empty() {
            return Err(ConfigurationError::InvalidSetting {
                key: ENV_CLIENT_ID,
                value: String::new(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Returns the broker list in `host:port,host:port` form.
    pub fn bootstrap_servers_string(&self) -> String {
        self.bootstrap_servers.join(",")
    }

    /// Client properties shared by every client kind.
    fn common_properties(&self) -> Vec<(&'static str, String)> {
        vec![
            ("bootstrap.servers", self.bootstrap_servers_string()),
            ("client.id", self.client_id.clone()),
        ]
    }

    /// Properties for consumer clients.
    pub fn consumer_properties(&self) -> Vec<(&'static str, String)> {
        let mut props = self.common_properties();
        props.push(("group.id", self.group_id.clone()));
        props.push(("auto.offset.reset", self.auto_offset_reset.to_string()));
        props.push(("enable.auto.commit", self.enable_auto_commit.to_string()));
        props
    }

    /// Properties for producer clients. Idempotence is always enabled.
    pub fn producer_properties(&self) -> Vec<(&'static str, String)> {
        let mut props = self.common_properties();
        props.push(("enable.idempotence", "true".to_string()));
        props.push((
            "message.timeout.ms",
            self.message_timeout.as_millis().to_string(),
        ));
        props
    }

    /// Properties for the admin client used during provisioning.
    pub fn admin_properties(&self) -> Vec<(&'static str, String)> {
        let mut props = self.common_properties();
        props.push((
            "socket.timeout.ms",
            self.provisioning_timeout.as_millis().to_string(),
        ));
        props
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: vec![DEFAULT_BOOTSTRAP_SERVERS.to_string()],
            group_id: DEFAULT_GROUP_ID.to_string(),
            auto_offset_reset: OffsetReset::default(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            enable_auto_commit: true,
            provisioning_timeout: DEFAULT_TIMEOUT,
            message_timeout: DEFAULT_TIMEOUT,
        }
    }
}

fn split_servers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|server| !server.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigurationError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigurationError::InvalidSetting {
            key,
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn parse_millis(key: &'static str, raw: &str) -> Result<Duration, ConfigurationError> {
    let invalid = |reason: &str| ConfigurationError::InvalidSetting {
        key,
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    let millis: u64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid("expected milliseconds"))?;
    if millis == 0 {
        return Err(invalid("must be greater than zero"));
    }
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serial_test::serial;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = ClientConfig::default();
        assert_eq!(config.bootstrap_servers, vec!["localhost:9092"]);
        assert_eq!(config.group_id, "orchestrator-group");
        assert_eq!(config.auto_offset_reset, OffsetReset::Latest);
        assert!(config.enable_auto_commit);
        assert_eq!(config.provisioning_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_empty_lookup_yields_defaults() {
        let config = ClientConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_lookup_overrides() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            (ENV_BOOTSTRAP_SERVERS, "kafka-1:9092, kafka-2:9092,"),
            (ENV_GROUP_ID, "orchestrator"),
            (ENV_AUTO_OFFSET_RESET, "EARLIEST"),
            (ENV_ENABLE_AUTO_COMMIT, "false"),
            (ENV_PROVISIONING_TIMEOUT_MS, "2500"),
        ]))
        .unwrap();

        assert_eq!(config.bootstrap_servers, vec!["kafka-1:9092", "kafka-2:9092"]);
        assert_eq!(config.bootstrap_servers_string(), "kafka-1:9092,kafka-2:9092");
        assert_eq!(config.group_id, "orchestrator");
        assert_eq!(config.auto_offset_reset, OffsetReset::Earliest);
        assert!(!config.enable_auto_commit);
        assert_eq!(config.provisioning_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_invalid_offset_reset_is_rejected() {
        let err = ClientConfig::from_lookup(lookup_from(&[(ENV_AUTO_OFFSET_RESET, "smallest")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidSetting {
                key: ENV_AUTO_OFFSET_RESET,
                ..
            }
        ));
    }

    #[test]
    fn test_blank_bootstrap_servers_are_rejected() {
        let err =
            ClientConfig::from_lookup(lookup_from(&[(ENV_BOOTSTRAP_SERVERS, " , ")])).unwrap_err();
        assert!(matches!(err, ConfigurationError::NoBootstrapServers));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let err = ClientConfig::from_lookup(lookup_from(&[(ENV_MESSAGE_TIMEOUT_MS, "0")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_MESSAGE_TIMEOUT_MS));
    }

    #[test]
    fn test_consumer_properties() {
        let config = ClientConfig {
            auto_offset_reset: OffsetReset::Earliest,
            ..ClientConfig::new("broker:9092", "g1")
        };
        let props: HashMap<_, _> = config.consumer_properties().into_iter().collect();
        assert_eq!(props["bootstrap.servers"], "broker:9092");
        assert_eq!(props["group.id"], "g1");
        assert_eq!(props["auto.offset.reset"], "earliest");
        assert_eq!(props["enable.auto.commit"], "true");
    }

    #[test]
    fn test_producer_properties_have_no_group() {
        let config = ClientConfig::new("broker:9092", "g1");
        let props: HashMap<_, _> = config.producer_properties().into_iter().collect();
        assert!(!props.contains_key("group.id"));
        assert_eq!(props["message.timeout.ms"], "30000");
        assert_eq!(props["enable.idempotence"], "true");
    }

    #[test]
    fn test_blank_client_id_is_rejected() {
        let err = ClientConfig::from_lookup(lookup_from(&[(ENV_CLIENT_ID, "  ")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidSetting {
                key: ENV_CLIENT_ID,
                ..
            }
        ));
    }

    #[test]
    fn test_blank_group_id_is_rejected() {
        let err = ClientConfig::from_lookup(lookup_from(&[(ENV_GROUP_ID, "")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidSetting {
                key: ENV_GROUP_ID,
                ..
            }
        ));
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        // SAFETY: serialized with every other test that touches the environment.
        unsafe {
            std::env::set_var(ENV_GROUP_ID, "env-group");
            std::env::set_var(ENV_AUTO_OFFSET_RESET, "earliest");
        }
        let config = ClientConfig::from_env();
        unsafe {
            std::env::remove_var(ENV_GROUP_ID);
            std::env::remove_var(ENV_AUTO_OFFSET_RESET);
        }

        let config = config.unwrap();
        assert_eq!(config.group_id, "env-group");
        assert_eq!(config.auto_offset_reset, OffsetReset::Earliest);
    }
}

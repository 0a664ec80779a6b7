use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_core::Stream;
use serde::Serialize;
use topology::{Channel, ChannelSpec};

use crate::config::ClientConfig;
use crate::error::{ConfigurationError, ConsumeError, ConsumeResult, ProvisioningError, PublishResult};

/// Outcome of a create-if-absent request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    /// The topic was created by this request.
    Created,
    /// The topic was already present; nothing changed.
    AlreadyExists,
}

impl TopicStatus {
    /// Returns the status as a metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicStatus::Created => "created",
            TopicStatus::AlreadyExists => "already_exists",
        }
    }
}

/// Where the broker stored a published record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordMetadata {
    pub channel: Channel,
    pub partition: i32,
    pub offset: i64,
}

/// A record read from a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedRecord {
    pub channel: Channel,
    pub payload: String,
    pub partition: i32,
    pub offset: i64,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ConsumedRecord {
    /// Returns the topic name the record was read from.
    pub fn topic(&self) -> &'static str {
        self.channel.wire_name()
    }
}

/// A stream of consumed records. Never ends on its own.
pub type RecordStream = Pin<Box<dyn Stream<Item = ConsumeResult<ConsumedRecord>> + Send>>;

/// Administrative access to broker topic metadata.
#[async_trait]
pub trait TopicAdmin: Send + Sync {
    /// Creates the topic described by `spec` unless it already exists.
    ///
    /// An existing topic is reported as [`TopicStatus::AlreadyExists`], not
    /// as an error. Implementations may block while the broker is
    /// unreachable; callers bound the wait.
    async fn create_topic(&self, spec: &ChannelSpec) -> Result<TopicStatus, ProvisioningError>;
}

/// Writes string payloads to channels.
///
/// Implementations must be safe to share between tasks.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Publishes one record and waits for the broker's acknowledgement.
    async fn send(&self, channel: Channel, payload: &str) -> PublishResult<RecordMetadata>;

    /// Waits until every in-flight record is acknowledged or `timeout` elapses.
    async fn flush(&self, timeout: Duration) -> PublishResult<()>;
}

/// Reads string payloads from channels as a member of a consumer group.
///
/// One consumer loop per instance.
#[async_trait]
pub trait Consumer: Send {
    /// Replaces the subscription with `channels`.
    fn subscribe(&mut self, channels: &[Channel]) -> ConsumeResult<()>;

    /// Waits for the next record on any subscribed channel.
    async fn recv(&mut self) -> ConsumeResult<ConsumedRecord>;

    /// Commits the group's position past `record`.
    fn commit(&mut self, record: &ConsumedRecord) -> ConsumeResult<()>;
}

/// A broker backend: builds the clients used by the factories.
pub trait Broker: Clone + Send + Sync + 'static {
    type Admin: TopicAdmin + 'static;
    type Producer: Producer + 'static;
    type Consumer: Consumer + 'static;

    /// Human-readable backend name, for logs.
    fn name(&self) -> &'static str;

    /// Builds an admin client.
    fn admin(&self, config: &ClientConfig) -> Result<Self::Admin, ConfigurationError>;

    /// Builds a producer client.
    fn producer(&self, config: &ClientConfig) -> Result<Self::Producer, ConfigurationError>;

    /// Builds a consumer client bound to `config.group_id`.
    fn consumer(&self, config: &ClientConfig) -> Result<Self::Consumer, ConfigurationError>;
}

/// Returns a commit error for `record`, used by backends.
pub(crate) fn commit_error(record: &ConsumedRecord, reason: impl std::fmt::Display) -> ConsumeError {
    ConsumeError::Commit {
        channel: record.channel,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use topology::Channel;

    use super::*;

    #[test]
    fn test_topic_status_serializes_as_metric_label() {
        for status in [TopicStatus::Created, TopicStatus::AlreadyExists] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_consumed_record_reports_wire_topic() {
        let record = ConsumedRecord {
            channel: Channel::ProductValidationSuccess,
            payload: "p1".to_string(),
            partition: 0,
            offset: 0,
            timestamp: None,
        };
        assert_eq!(record.topic(), "product-validation-success");
    }
}

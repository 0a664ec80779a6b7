use std::time::Duration;

use thiserror::Error;
use topology::{Channel, UnknownChannel};

/// Errors detected while building clients from configuration.
///
/// All of these abort startup.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A channel name that is not in the registry.
    #[error(transparent)]
    UnknownChannel(#[from] UnknownChannel),

    /// A setting has a value that cannot be used.
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidSetting {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// No broker addresses were configured.
    #[error("At least one bootstrap server is required")]
    NoBootstrapServers,

    /// The broker library refused to build a client.
    #[error("Failed to create {client} client: {reason}")]
    Client { client: &'static str, reason: String },
}

/// Errors raised while creating channels on the broker.
///
/// Any of these is fatal at startup; recovery is a supervised restart.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// The broker rejected the create request.
    #[error("Broker rejected channel '{channel}': {reason}")]
    Rejected { channel: Channel, reason: String },

    /// The broker did not answer within the provisioning timeout.
    #[error("Timed out after {timeout:?} provisioning channel '{channel}'")]
    Timeout { channel: Channel, timeout: Duration },

    /// Provisioning stopped part way through the registry.
    #[error(
        "Provisioning failed at channel '{failed}' after {} of {total} channels: {source}",
        .provisioned.len()
    )]
    Partial {
        failed: Channel,
        provisioned: Vec<Channel>,
        total: usize,
        #[source]
        source: Box<ProvisioningError>,
    },
}

impl ProvisioningError {
    /// Returns the channel whose provisioning failed.
    pub fn channel(&self) -> Channel {
        match self {
            ProvisioningError::Rejected { channel, .. }
            | ProvisioningError::Timeout { channel, .. } => *channel,
            ProvisioningError::Partial { failed, .. } => *failed,
        }
    }
}

/// Errors reported by the broker for a publish.
///
/// Never retried by this crate: without an idempotency key a retry could emit
/// the same saga event twice.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The channel does not exist on the broker yet.
    #[error("Channel '{0}' does not exist on the broker")]
    UnknownTopic(Channel),

    /// The broker refused or failed to persist the record.
    #[error("Delivery to '{channel}' failed: {reason}")]
    Delivery { channel: Channel, reason: String },

    /// The record was not acknowledged within the message timeout.
    #[error("Delivery to '{channel}' timed out after {timeout:?}")]
    Timeout { channel: Channel, timeout: Duration },

    /// The broker could not be reached.
    #[error("Broker unreachable: {0}")]
    Unreachable(String),

    /// In-flight records could not be drained.
    #[error("Flush failed: {0}")]
    Flush(String),
}

/// Errors surfaced to a consumer loop.
///
/// The loop decides whether to skip and continue or to stop.
#[derive(Debug, Error)]
pub enum ConsumeError {
    /// The connection to the broker failed.
    #[error("Broker connection error: {0}")]
    Connection(String),

    /// A record payload was not valid UTF-8.
    #[error("Record at {topic}/{partition}@{offset} is not a UTF-8 string: {reason}")]
    Deserialization {
        topic: String,
        partition: i32,
        offset: i64,
        reason: String,
    },

    /// A record arrived on a topic outside the registry.
    #[error(transparent)]
    UnknownChannel(#[from] UnknownChannel),

    /// Committing an offset failed.
    #[error("Failed to commit offset for '{channel}': {reason}")]
    Commit { channel: Channel, reason: String },

    /// `recv` was called before any channel was subscribed.
    #[error("Consumer is not subscribed to any channel")]
    NotSubscribed,
}

/// Result type for publish operations.
pub type PublishResult<T> = std::result::Result<T, PublishError>;

/// Result type for consume operations.
pub type ConsumeResult<T> = std::result::Result<T, ConsumeError>;

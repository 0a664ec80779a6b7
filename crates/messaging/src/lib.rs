//! Broker client layer for the saga orchestration backbone.
//!
//! Provides:
//! - [`ClientConfig`]: immutable client settings loaded from the environment
//! - [`Provisioner`]: idempotent create-if-absent of every registered channel
//! - [`ProducerFactory`] / [`Publisher`]: the shared, thread-safe publish handle
//! - [`ConsumerFactory`] / [`ChannelConsumer`]: one consumer loop per handle,
//!   all in the process's consumer group
//!
//! Backends implement [`Broker`]. [`InMemoryBroker`] is always available;
//! the Kafka backend is behind the `kafka` feature.

pub mod client;
pub mod config;
pub mod consumer;
pub mod error;
pub mod factory;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;
pub mod provisioning;
pub mod publisher;

pub use client::{
    Broker, ConsumedRecord, Consumer, Producer, RecordMetadata, RecordStream, TopicAdmin,
    TopicStatus,
};
pub use config::{ClientConfig, OffsetReset};
pub use consumer::ChannelConsumer;
pub use error::{
    ConfigurationError, ConsumeError, ConsumeResult, ProvisioningError, PublishError, PublishResult,
};
pub use factory::{ConsumerFactory, ProducerFactory, build_provisioner};
#[cfg(feature = "kafka")]
pub use kafka::KafkaBroker;
pub use memory::InMemoryBroker;
pub use provisioning::{Provisioner, ProvisioningReport};
pub use publisher::{EventEnvelope, Publisher};
pub use topology::{Channel, ChannelSpec};

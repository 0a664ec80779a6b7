//! Factories that build broker clients from the shared configuration.

use std::sync::Arc;

use crate::client::Broker;
use crate::config::ClientConfig;
use crate::consumer::ChannelConsumer;
use crate::error::ConfigurationError;
use crate::provisioning::Provisioner;
use crate::publisher::Publisher;

/// Builds producers. Construction has no side effects beyond the client's
/// own connection bookkeeping.
pub struct ProducerFactory<B: Broker> {
    broker: B,
    config: Arc<ClientConfig>,
}

impl<B: Broker> ProducerFactory<B> {
    pub fn new(broker: B, config: Arc<ClientConfig>) -> Self {
        Self { broker, config }
    }

    /// Builds a raw producer client.
    pub fn build_producer(&self) -> Result<B::Producer, ConfigurationError> {
        self.broker.producer(&self.config)
    }

    /// Builds a producer wrapped in the publishing facade.
    pub fn build_publisher(&self) -> Result<Publisher<B::Producer>, ConfigurationError> {
        let publisher = Publisher::new(self.build_producer()?);
        tracing::debug!(broker = self.broker.name(), "producer built");
        Ok(publisher)
    }
}

/// Builds consumers bound to the single consumer group of the process.
///
/// Every consumer built here joins the same group, so the broker spreads
/// channel partitions across running instances of the service and any one
/// record is handled by at most one of them.
pub struct ConsumerFactory<B: Broker> {
    broker: B,
    config: Arc<ClientConfig>,
}

impl<B: Broker> Clone for ConsumerFactory<B> {
    fn clone(&self) -> Self {
        Self {
            broker: self.broker.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<B: Broker> ConsumerFactory<B> {
    pub fn new(broker: B, config: Arc<ClientConfig>) -> Self {
        Self { broker, config }
    }

    /// Returns the group every consumer joins.
    pub fn group_id(&self) -> &str {
        &self.config.group_id
    }

    /// Builds a consumer with no subscription yet.
    pub fn build_consumer(&self) -> Result<ChannelConsumer<B::Consumer>, ConfigurationError> {
        let consumer = self.broker.consumer(&self.config)?;
        tracing::debug!(
            broker = self.broker.name(),
            group_id = %self.config.group_id,
            auto_offset_reset = %self.config.auto_offset_reset,
            "consumer built"
        );
        Ok(ChannelConsumer::new(consumer, self.config.group_id.clone()))
    }
}

/// Builds the provisioner for `config`, bounded by its provisioning timeout.
pub fn build_provisioner<B: Broker>(
    broker: &B,
    config: &ClientConfig,
) -> Result<Provisioner<B::Admin>, ConfigurationError> {
    let admin = broker.admin(config)?;
    Ok(Provisioner::new(admin, config.provisioning_timeout))
}

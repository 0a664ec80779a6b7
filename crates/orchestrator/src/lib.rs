//! Saga orchestrator process wiring.
//!
//! At startup the orchestrator provisions every registered channel, then
//! builds the shared publisher and the consumer factory that the saga state
//! machine uses to move events through the topology. Provisioning failures
//! are fatal: the orchestrator can not run without its channels.

pub mod config;
pub mod error;

use std::sync::Arc;
use std::time::Duration;

use messaging::{
    Broker, ClientConfig, ConsumerFactory, ProducerFactory, ProvisioningReport, PublishResult,
    Publisher, build_provisioner,
};

pub use config::Config;
pub use error::StartupError;

/// Broker handles owned by a running orchestrator.
pub struct Messaging<B: Broker> {
    pub publisher: Publisher<B::Producer>,
    pub consumers: ConsumerFactory<B>,
    pub report: ProvisioningReport,
    config: Arc<ClientConfig>,
}

impl<B: Broker> Messaging<B> {
    /// Returns the client configuration shared by every handle.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Flushes in-flight publishes and releases the broker clients.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(self, timeout: Duration) -> PublishResult<()> {
        let result = self.publisher.flush(timeout).await;
        match &result {
            Ok(()) => tracing::info!("producer flushed"),
            Err(e) => tracing::error!(error = %e, "producer flush failed"),
        }
        result
    }
}

/// Provisions the channel topology and builds the broker handles.
#[tracing::instrument(skip(broker, config), fields(broker = broker.name(), group_id = %config.group_id))]
pub async fn start<B: Broker>(broker: B, config: ClientConfig) -> Result<Messaging<B>, StartupError> {
    config.validate()?;
    let config = Arc::new(config);

    let report = build_provisioner(&broker, &config)?
        .ensure_topology()
        .await?;
    metrics::gauge!("orchestrator_channels_provisioned").set(report.outcomes.len() as f64);

    let publisher = ProducerFactory::new(broker.clone(), Arc::clone(&config)).build_publisher()?;
    let consumers = ConsumerFactory::new(broker, Arc::clone(&config));

    tracing::info!(
        channels = report.outcomes.len(),
        created = report.created().count(),
        "messaging started"
    );

    Ok(Messaging {
        publisher,
        consumers,
        report,
        config,
    })
}

//! Startup provisioning of the channel topology.

use std::time::Duration;

use serde::Serialize;
use topology::{Channel, ChannelSpec};

use crate::client::{TopicAdmin, TopicStatus};
use crate::error::ProvisioningError;

/// Per-channel outcome of a provisioning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisioningReport {
    pub outcomes: Vec<(Channel, TopicStatus)>,
}

impl ProvisioningReport {
    /// Returns the channels created by this pass.
    pub fn created(&self) -> impl Iterator<Item = Channel> + '_ {
        self.with_status(TopicStatus::Created)
    }

    /// Returns the channels that were already present.
    pub fn existing(&self) -> impl Iterator<Item = Channel> + '_ {
        self.with_status(TopicStatus::AlreadyExists)
    }

    /// Returns every channel provisioned, in the order it was handled.
    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.outcomes.iter().map(|(channel, _)| *channel)
    }

    fn with_status(&self, status: TopicStatus) -> impl Iterator<Item = Channel> + '_ {
        self.outcomes
            .iter()
            .filter(move |(_, s)| *s == status)
            .map(|(channel, _)| *channel)
    }
}

/// Ensures channels exist on the broker before any client uses them.
///
/// Every request is a create-if-absent, so running against an already
/// provisioned broker is a no-op. Each request is bounded by `timeout`.
pub struct Provisioner<A: TopicAdmin> {
    admin: A,
    timeout: Duration,
}

impl<A: TopicAdmin> Provisioner<A> {
    /// Creates a provisioner over an admin client.
    pub fn new(admin: A, timeout: Duration) -> Self {
        Self { admin, timeout }
    }

    /// Returns the per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Creates one channel unless it already exists.
    #[tracing::instrument(skip(self, spec), fields(channel = %spec.channel, logical = spec.channel.logical_name(), partitions = %spec.partitions, replicas = %spec.replicas))]
    pub async fn ensure_channel(&self, spec: &ChannelSpec) -> Result<TopicStatus, ProvisioningError> {
        let status = tokio::time::timeout(self.timeout, self.admin.create_topic(spec))
            .await
            .map_err(|_| ProvisioningError::Timeout {
                channel: spec.channel,
                timeout: self.timeout,
            })??;

        metrics::counter!("messaging_channels_provisioned_total", "status" => status.as_str())
            .increment(1);
        match status {
            TopicStatus::Created => tracing::info!("channel created"),
            TopicStatus::AlreadyExists => tracing::debug!("channel already exists"),
        }
        Ok(status)
    }

    /// Provisions `specs` in order, stopping at the first failure.
    ///
    /// Nothing is rolled back: the error names the failed channel and lists
    /// the ones already provisioned so an operator can remediate.
    pub async fn ensure_all<I>(&self, specs: I) -> Result<ProvisioningReport, ProvisioningError>
    where
        I: IntoIterator<Item = ChannelSpec>,
    {
        let specs: Vec<ChannelSpec> = specs.into_iter().collect();
        let mut report = ProvisioningReport::default();

        for spec in &specs {
            match self.ensure_channel(spec).await {
                Ok(status) => report.outcomes.push((spec.channel, status)),
                Err(source) => {
                    tracing::error!(
                        channel = %spec.channel,
                        provisioned = report.outcomes.len(),
                        total = specs.len(),
                        error = %source,
                        "channel provisioning failed"
                    );
                    return Err(ProvisioningError::Partial {
                        failed: spec.channel,
                        provisioned: report.channels().collect(),
                        total: specs.len(),
                        source: Box::new(source),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Provisions every registered channel.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_topology(&self) -> Result<ProvisioningReport, ProvisioningError> {
        let report = self.ensure_all(topology::specs()).await?;
        tracing::info!(
            created = report.created().count(),
            existing = report.existing().count(),
            "channel topology provisioned"
        );
        Ok(report)
    }
}

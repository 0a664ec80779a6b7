use std::num::{NonZeroU16, NonZeroU32};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownChannel;
use crate::role::{ChannelRole, Participant};

/// Partition count every channel is provisioned with.
pub const DEFAULT_PARTITIONS: NonZeroU32 = NonZeroU32::MIN;

/// Replica count every channel is provisioned with.
pub const DEFAULT_REPLICAS: NonZeroU16 = NonZeroU16::MIN;

/// A named broker topic through which saga events flow.
///
/// The set is closed: there is no way to register a channel at runtime.
/// Serialization uses the wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    /// Saga initiation request.
    #[serde(rename = "start_saga")]
    StartSaga,

    /// Orchestrator-internal control events.
    #[serde(rename = "orchestrator")]
    Orchestrator,

    /// Saga completed successfully.
    #[serde(rename = "finish_success")]
    FinishSuccess,

    /// Saga aborted.
    #[serde(rename = "finish_fail")]
    FinishFail,

    /// Participant ack: product ok.
    // Hyphenated on the wire, unlike every other channel. Deployed
    // participants subscribe to this exact name.
    #[serde(rename = "product-validation-success")]
    ProductValidationSuccess,

    /// Participant nack: product invalid.
    #[serde(rename = "product_validation_fail")]
    ProductValidationFail,

    /// Participant ack: inventory reserved.
    #[serde(rename = "inventory_success")]
    InventorySuccess,

    /// Participant nack: inventory unavailable.
    #[serde(rename = "inventory_fail")]
    InventoryFail,

    /// Participant ack: payment captured.
    #[serde(rename = "payment_success")]
    PaymentSuccess,

    /// Participant nack: payment declined.
    #[serde(rename = "payment_fail")]
    PaymentFail,

    /// Terminal notification fan-out.
    #[serde(rename = "notify_ending")]
    NotifyEnding,
}

impl Channel {
    /// Every registered channel, in registry order.
    pub const ALL: [Channel; 11] = [
        Channel::StartSaga,
        Channel::Orchestrator,
        Channel::FinishSuccess,
        Channel::FinishFail,
        Channel::ProductValidationSuccess,
        Channel::ProductValidationFail,
        Channel::InventorySuccess,
        Channel::InventoryFail,
        Channel::PaymentSuccess,
        Channel::PaymentFail,
        Channel::NotifyEnding,
    ];

    /// Returns the topic name used on the broker.
    pub const fn wire_name(self) -> &'static str {
        match self {
            Channel::StartSaga => "start_saga",
            Channel::Orchestrator => "orchestrator",
            Channel::FinishSuccess => "finish_success",
            Channel::FinishFail => "finish_fail",
            Channel::ProductValidationSuccess => "product-validation-success",
            Channel::ProductValidationFail => "product_validation_fail",
            Channel::InventorySuccess => "inventory_success",
            Channel::InventoryFail => "inventory_fail",
            Channel::PaymentSuccess => "payment_success",
            Channel::PaymentFail => "payment_fail",
            Channel::NotifyEnding => "notify_ending",
        }
    }

    /// Returns the logical (symbolic) name of the channel.
    pub const fn logical_name(self) -> &'static str {
        match self {
            Channel::StartSaga => "StartSaga",
            Channel::Orchestrator => "Orchestrator",
            Channel::FinishSuccess => "FinishSuccess",
            Channel::FinishFail => "FinishFail",
            Channel::ProductValidationSuccess => "ProductValidationSuccess",
            Channel::ProductValidationFail => "ProductValidationFail",
            Channel::InventorySuccess => "InventorySuccess",
            Channel::InventoryFail => "InventoryFail",
            Channel::PaymentSuccess => "PaymentSuccess",
            Channel::PaymentFail => "PaymentFail",
            Channel::NotifyEnding => "NotifyEnding",
        }
    }

    /// Resolves a topic name received from the broker or from configuration.
    pub fn from_wire_name(name: &str) -> Result<Self, UnknownChannel> {
        Channel::ALL
            .into_iter()
            .find(|channel| channel.wire_name() == name)
            .ok_or_else(|| UnknownChannel(name.to_string()))
    }

    /// Returns the provisioning spec for this channel.
    pub const fn spec(self) -> ChannelSpec {
        ChannelSpec::new(self)
    }

    /// Returns the part this channel plays in the saga protocol.
    pub const fn role(self) -> ChannelRole {
        match self {
            Channel::StartSaga => ChannelRole::Initiation,
            Channel::Orchestrator => ChannelRole::Control,
            Channel::FinishSuccess | Channel::FinishFail => ChannelRole::Completion,
            Channel::ProductValidationSuccess
            | Channel::InventorySuccess
            | Channel::PaymentSuccess => ChannelRole::ParticipantSuccess,
            Channel::ProductValidationFail | Channel::InventoryFail | Channel::PaymentFail => {
                ChannelRole::ParticipantFailure
            }
            Channel::NotifyEnding => ChannelRole::Notification,
        }
    }

    /// Returns the participant that reports on this channel, if any.
    pub const fn participant(self) -> Option<Participant> {
        match self {
            Channel::ProductValidationSuccess | Channel::ProductValidationFail => {
                Some(Participant::ProductValidation)
            }
            Channel::InventorySuccess | Channel::InventoryFail => Some(Participant::Inventory),
            Channel::PaymentSuccess | Channel::PaymentFail => Some(Participant::Payment),
            _ => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::from_wire_name(s)
    }
}

/// What a channel is provisioned with on the broker.
///
/// Partition and replica counts are distinct named fields so that they can
/// never be passed in each other's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelSpec {
    pub channel: Channel,
    pub partitions: NonZeroU32,
    pub replicas: NonZeroU16,
}

impl ChannelSpec {
    /// Creates a spec with the default partition and replica counts.
    pub const fn new(channel: Channel) -> Self {
        Self {
            channel,
            partitions: DEFAULT_PARTITIONS,
            replicas: DEFAULT_REPLICAS,
        }
    }

    /// Overrides the partition count.
    pub const fn with_partitions(mut self, partitions: NonZeroU32) -> Self {
        self.partitions = partitions;
        self
    }

    /// Overrides the replica count.
    pub const fn with_replicas(mut self, replicas: NonZeroU16) -> Self {
        self.replicas = replicas;
        self
    }

    /// Returns the topic name to create.
    pub const fn wire_name(&self) -> &'static str {
        self.channel.wire_name()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn wire_names_are_pairwise_distinct() {
        let names: HashSet<_> = Channel::ALL.iter().map(|c| c.wire_name()).collect();
        assert_eq!(names.len(), Channel::ALL.len());
    }

    #[test]
    fn logical_names_are_pairwise_distinct() {
        let names: HashSet<_> = Channel::ALL.iter().map(|c| c.logical_name()).collect();
        assert_eq!(names.len(), Channel::ALL.len());
    }

    #[test]
    fn wire_names_are_verbatim() {
        let expected = [
            "start_saga",
            "orchestrator",
            "finish_success",
            "finish_fail",
            "product-validation-success",
            "product_validation_fail",
            "inventory_success",
            "inventory_fail",
            "payment_success",
            "payment_fail",
            "notify_ending",
        ];
        let actual: Vec<_> = Channel::ALL.iter().map(|c| c.wire_name()).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn from_wire_name_resolves_every_channel() {
        for channel in Channel::ALL {
            assert_eq!(Channel::from_wire_name(channel.wire_name()), Ok(channel));
        }
    }

    #[test]
    fn from_wire_name_rejects_unknown_names() {
        let err = Channel::from_wire_name("shipping_success").unwrap_err();
        assert_eq!(err.name(), "shipping_success");
    }

    #[test]
    fn from_wire_name_does_not_normalize_separators() {
        assert!(Channel::from_wire_name("product_validation_success").is_err());
        assert!(Channel::from_wire_name("product-validation-fail").is_err());
    }

    #[test]
    fn parse_uses_wire_name() {
        let channel: Channel = "payment_fail".parse().unwrap();
        assert_eq!(channel, Channel::PaymentFail);
        assert!("PaymentFail".parse::<Channel>().is_err());
    }

    #[test]
    fn display_matches_wire_name() {
        for channel in Channel::ALL {
            assert_eq!(channel.to_string(), channel.wire_name());
        }
    }

    #[test]
    fn serde_uses_wire_name() {
        let json = serde_json::to_string(&Channel::ProductValidationSuccess).unwrap();
        assert_eq!(json, "\"product-validation-success\"");

        for channel in Channel::ALL {
            let json = serde_json::to_string(&channel).unwrap();
            assert_eq!(json, format!("\"{}\"", channel.wire_name()));
            let back: Channel = serde_json::from_str(&json).unwrap();
            assert_eq!(back, channel);
        }
    }

    #[test]
    fn default_spec_is_one_partition_one_replica() {
        for spec in Channel::ALL.map(Channel::spec) {
            assert_eq!(spec.partitions.get(), 1);
            assert_eq!(spec.replicas.get(), 1);
        }
    }

    #[test]
    fn spec_overrides_are_independent() {
        let spec = Channel::Orchestrator
            .spec()
            .with_partitions(NonZeroU32::new(3).unwrap())
            .with_replicas(NonZeroU16::new(2).unwrap());
        assert_eq!(spec.partitions.get(), 3);
        assert_eq!(spec.replicas.get(), 2);
        assert_eq!(spec.wire_name(), "orchestrator");
    }
}

//! Saga-protocol roles of the registered channels.

use serde::{Deserialize, Serialize};

use crate::channel::Channel;

/// The part a channel plays in a saga's lifecycle.
///
/// ```text
/// Initiation ──► Control ──► participant ack/nack ──► Control ──► Completion ──► Notification
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelRole {
    /// A new saga is requested.
    Initiation,
    /// Orchestrator-internal routing.
    Control,
    /// A participant completed its step.
    ParticipantSuccess,
    /// A participant rejected its step.
    ParticipantFailure,
    /// The saga reached a terminal outcome.
    Completion,
    /// Fan-out once a saga has ended.
    Notification,
}

impl ChannelRole {
    /// Returns true if channels with this role carry participant replies.
    pub fn is_participant_reply(&self) -> bool {
        matches!(
            self,
            ChannelRole::ParticipantSuccess | ChannelRole::ParticipantFailure
        )
    }

    /// Returns the channels that play this role, in registry order.
    pub fn channels(self) -> impl Iterator<Item = Channel> {
        Channel::ALL
            .into_iter()
            .filter(move |channel| channel.role() == self)
    }
}

/// An independent service that executes one saga step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Participant {
    ProductValidation,
    Inventory,
    Payment,
}

impl Participant {
    /// Participants in the order a saga visits them.
    pub const ALL: [Participant; 3] = [
        Participant::ProductValidation,
        Participant::Inventory,
        Participant::Payment,
    ];

    /// Returns the channel this participant acks on.
    pub const fn success_channel(self) -> Channel {
        match self {
            Participant::ProductValidation => Channel::ProductValidationSuccess,
            Participant::Inventory => Channel::InventorySuccess,
            Participant::Payment => Channel::PaymentSuccess,
        }
    }

    /// Returns the channel this participant nacks on.
    pub const fn fail_channel(self) -> Channel {
        match self {
            Participant::ProductValidation => Channel::ProductValidationFail,
            Participant::Inventory => Channel::InventoryFail,
            Participant::Payment => Channel::PaymentFail,
        }
    }
}

impl std::fmt::Display for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Participant::ProductValidation => "ProductValidation",
            Participant::Inventory => "Inventory",
            Participant::Payment => "Payment",
        };
        f.write_str(name)
    }
}

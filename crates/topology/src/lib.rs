//! Channel registry for the saga orchestration backbone.
//!
//! Every saga event travels over one of a closed set of broker topics.
//! [`Channel`] is the single source of truth for that topology: its variants
//! are the logical names, and [`Channel::wire_name`] is the exact topic name
//! published on the broker. Deployed participants depend on those names, so
//! they are reproduced verbatim and never change.

pub mod channel;
pub mod error;
pub mod role;

pub use channel::{Channel, ChannelSpec, DEFAULT_PARTITIONS, DEFAULT_REPLICAS};
pub use error::UnknownChannel;
pub use role::{ChannelRole, Participant};

/// Returns the provisioning spec of every registered channel, in registry order.
pub fn specs() -> impl Iterator<Item = ChannelSpec> {
    Channel::ALL.into_iter().map(Channel::spec)
}

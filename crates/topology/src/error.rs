use thiserror::Error;

/// A topic name that is not part of the registry.
///
/// Only reachable where a name arrives as a string (broker records,
/// configuration); code that names a [`crate::Channel`] variant directly can
/// never produce it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown channel: '{0}'")]
pub struct UnknownChannel(pub String);

impl UnknownChannel {
    /// Returns the offending name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

//! Startup error type.

use messaging::{ConfigurationError, ProvisioningError};
use thiserror::Error;

/// Failures that prevent the orchestrator from starting.
///
/// None of these are retried in-process; the supervisor restarts the service.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Configuration could not be loaded or a client could not be built.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The channel topology could not be provisioned.
    #[error("Provisioning error: {0}")]
    Provisioning(#[from] ProvisioningError),
}

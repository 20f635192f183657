use thiserror::Error;

use crate::config::ConfigError;
use crate::services::hass::HassError;
use crate::services::mpris::MprisError;

/// Error types for the bridge.
///
/// Everything that ends the process surfaces as one of these.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Invalid runtime configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Home Assistant session or request failure
    #[error("Home Assistant error: {0}")]
    Hass(#[from] HassError),

    /// D-Bus side failure
    #[error("MPRIS error: {0}")]
    Mpris(#[from] MprisError),

    /// Logging could not be set up
    #[error("cannot initialize logging: {0}")]
    Tracing(String),

    /// Standard I/O operation error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

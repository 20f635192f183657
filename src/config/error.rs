use std::io;

use thiserror::Error;

/// Errors raised while validating runtime configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Hub address is not a URL
    #[error("invalid hub address '{uri}': {source}")]
    InvalidUri {
        /// Address as given
        uri: String,
        /// Parse failure
        source: url::ParseError,
    },

    /// Hub address uses a scheme other than http(s) or ws(s)
    #[error("unsupported scheme '{0}' in hub address, expected http, https, ws or wss")]
    UnsupportedScheme(String),

    /// Hub address has no host
    #[error("hub address '{0}' has no host")]
    MissingHost(String),

    /// No access token was configured
    #[error("access token is empty")]
    MissingToken,

    /// Numeric option outside its valid range
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Option name
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Artwork directory could not be created
    #[error("cannot create artwork directory: {0}")]
    Io(#[from] io::Error),
}

//! Runtime configuration.
//!
//! Everything is read from the command line, with environment variable
//! fallbacks so the bridge can run unattended from a service manager.

mod error;
mod paths;

use std::fmt;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use url::Url;

pub use error::ConfigError;
pub use paths::ArtworkDir;

use crate::services::hass::{HEARTBEAT_INTERVAL, SessionOptions};

/// Path of the hub websocket API
pub const WEBSOCKET_PATH: &str = "/api/websocket";

/// Bridge settings.
#[derive(Clone, Parser)]
#[command(
    name = "hass-mpris-bridge",
    about = "Expose a Home Assistant media player as an MPRIS player",
    version
)]
pub struct BridgeConfig {
    /// Home Assistant address, e.g. `http://homeassistant.local:8123`.
    ///
    /// The websocket form `ws://host:port/api/websocket` is accepted too.
    #[arg(long, env = "HASS_URI")]
    pub hass_uri: String,

    /// Long-lived access token
    #[arg(long, env = "HASS_TOKEN", hide_env_values = true)]
    pub hass_token: String,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log output format
    #[arg(
        long,
        env = "HASS_BRIDGE_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,

    /// Seconds between heartbeat pings
    #[arg(long, value_name = "SECS", default_value_t = HEARTBEAT_INTERVAL.as_secs())]
    pub heartbeat_interval: u64,

    /// Fail the session when a ping stays unanswered this many seconds
    #[arg(long, value_name = "SECS")]
    pub liveness_timeout: Option<u64>,
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("hass_uri", &self.hass_uri)
            .field("hass_token", &"<redacted>")
            .field("verbose", &self.verbose)
            .field("log_format", &self.log_format)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("liveness_timeout", &self.liveness_timeout)
            .finish()
    }
}

impl BridgeConfig {
    /// Check the settings and derive the hub endpoints.
    ///
    /// # Errors
    /// Returns a `ConfigError` naming the first invalid setting.
    pub fn validate(&self) -> Result<HubEndpoints, ConfigError> {
        if self.hass_token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }

        if self.heartbeat_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "heartbeat-interval",
                reason: "must be at least one second".to_string(),
            });
        }

        if self.liveness_timeout == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "liveness-timeout",
                reason: "must be at least one second".to_string(),
            });
        }

        HubEndpoints::parse(&self.hass_uri)
    }

    /// Token with surrounding whitespace removed
    pub fn token(&self) -> &str {
        self.hass_token.trim()
    }

    /// Level implied by the verbosity flag
    pub fn log_level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }

    /// Heartbeat and liveness settings for the session
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval),
            liveness_timeout: self.liveness_timeout.map(Duration::from_secs),
        }
    }
}

/// Hub addresses derived from the configured URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubEndpoints {
    /// HTTP base address, used for REST and artwork
    pub base: Url,

    /// Websocket API endpoint
    pub websocket: Url,
}

impl HubEndpoints {
    /// Normalize an http(s) or ws(s) address.
    ///
    /// Any path on the input is discarded.
    ///
    /// # Errors
    /// Returns an error for unparseable addresses, unsupported schemes, or a
    /// missing host.
    pub fn parse(uri: &str) -> Result<Self, ConfigError> {
        let invalid = |source| ConfigError::InvalidUri {
            uri: uri.to_string(),
            source,
        };

        let parsed = Url::parse(uri.trim()).map_err(invalid)?;

        let (http_scheme, ws_scheme) = match parsed.scheme() {
            "http" | "ws" => ("http", "ws"),
            "https" | "wss" => ("https", "wss"),
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        };

        let host = parsed
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ConfigError::MissingHost(uri.to_string()))?;

        let authority = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(Self {
            base: Url::parse(&format!("{http_scheme}://{authority}/")).map_err(invalid)?,
            websocket: Url::parse(&format!("{ws_scheme}://{authority}{WEBSOCKET_PATH}"))
                .map_err(invalid)?,
        })
    }
}

/// Logging level for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Lifecycle messages (default level)
    #[default]
    Info,

    /// Per-message details
    Debug,

    /// Everything
    Trace,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human readable, multi-line
    #[default]
    Pretty,

    /// One JSON object per line
    Json,
}

#[cfg(test)]
mod tests;

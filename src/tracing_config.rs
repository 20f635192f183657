use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LogLevel};
use crate::core::{BridgeError, Result};

/// Initialize tracing for the application
///
/// `RUST_LOG` takes precedence when set, otherwise `level` applies to every
/// target.
///
/// # Errors
/// Returns error if tracing subscriber initialization fails
pub fn init(level: LogLevel, format: LogFormat) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let registry = tracing_subscriber::registry().with(env_filter);

    let initialized = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_level(true))
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_names(true),
            )
            .try_init(),
    };

    initialized.map_err(|e| BridgeError::Tracing(e.to_string()))
}

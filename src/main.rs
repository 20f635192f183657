//! Bridge entry point.

use std::process::ExitCode;

use clap::Parser;
use hass_mpris_bridge::{bridge, config::BridgeConfig, tracing_config};
use tracing::{Level, error, info, span};

#[tokio::main]
async fn main() -> ExitCode {
    let config = BridgeConfig::parse();

    if let Err(e) = tracing_config::init(config.log_level(), config.log_format) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let _span = span!(Level::INFO, "hass_mpris_bridge").entered();
    info!(uri = %config.hass_uri, "Starting Home Assistant MPRIS bridge");

    match bridge::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Bridge failed");
            ExitCode::FAILURE
        }
    }
}

//! Home Assistant media player to MPRIS bridge.
//!
//! Keeps one authenticated websocket session to a Home Assistant hub, projects
//! `media_player` state changes onto an `org.mpris.MediaPlayer2` object on the
//! session bus, and turns MPRIS control calls back into hub service calls.
//!
//! - [`services::hass`] session engine, request multiplexer, REST fetch and
//!   reverse command translation
//! - [`services::mpris`] state projection, artwork cache and the exported
//!   D-Bus player
//! - [`bridge`] the run loop tying both sides together

/// Bridge run loop.
pub mod bridge;

/// Runtime configuration.
pub mod config;

/// Core error types and result aliases.
pub mod core;

/// Upstream and downstream services.
pub mod services;

/// Logging setup.
pub mod tracing_config;

/// Re-exported core types for convenience.
pub use core::{BridgeError, Result};

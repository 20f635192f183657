/// Multiplexed command and subscription client
pub mod client;
/// Reverse command translator
pub mod commands;
/// Home Assistant error types
pub mod error;
/// Websocket wire messages
pub mod message;
/// REST bulk state fetch
pub mod rest;
/// Request correlation table
pub mod router;
/// Websocket session engine
pub mod session;
/// Entity state snapshots
pub mod state;

pub use client::{EventSubscription, HassClient};
pub use commands::HassController;
pub use error::*;
pub use message::*;
pub use rest::fetch_states;
pub use session::{HEARTBEAT_INTERVAL, Session, SessionOptions};
pub use state::*;

#[cfg(test)]
mod tests;

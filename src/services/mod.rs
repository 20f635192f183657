/// Shared reactive building blocks
pub mod common;
/// Home Assistant websocket and REST client
pub mod hass;
/// MPRIS projection and D-Bus player
pub mod mpris;

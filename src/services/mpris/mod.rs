/// On-disk artwork cache
pub mod artwork;
/// Control requests coming from the bus
pub mod controller;
/// MPRIS error types
pub mod error;
/// Track metadata types
pub mod metadata;
/// Snapshot to property set projection
pub mod projection;
/// Exported D-Bus player
pub mod server;
/// Playback enums
pub mod types;
/// MPRIS utility functions
pub mod utils;

pub use artwork::{ArtworkCache, ArtworkError};
pub use controller::PlayerController;
pub use error::*;
pub use metadata::*;
pub use projection::{PlayerProperties, Projection, Projector};
pub use server::MprisServer;
pub use types::*;

#[cfg(test)]
mod tests;

use async_trait::async_trait;

use super::{LoopStatus, MprisError};

#[async_trait]
/// Receiver of control requests made through the bus object.
///
/// Implementations translate each request into an upstream command.
pub trait PlayerController: Send + Sync + 'static {
    /// Start playback
    async fn play(&self) -> Result<(), MprisError>;

    /// Pause playback
    async fn pause(&self) -> Result<(), MprisError>;

    /// Toggle between playing and paused
    async fn play_pause(&self) -> Result<(), MprisError>;

    /// Stop playback
    async fn stop(&self) -> Result<(), MprisError>;

    /// Skip to the next track
    async fn next(&self) -> Result<(), MprisError>;

    /// Skip to the previous track
    async fn previous(&self) -> Result<(), MprisError>;

    /// Move to an absolute position in microseconds
    async fn seek_to(&self, position: i64) -> Result<(), MprisError>;

    /// Set volume, 0.0 to 1.0
    async fn set_volume(&self, volume: f64) -> Result<(), MprisError>;

    /// Enable or disable shuffle
    async fn set_shuffle(&self, shuffle: bool) -> Result<(), MprisError>;

    /// Change the repeat mode
    async fn set_loop_status(&self, status: LoopStatus) -> Result<(), MprisError>;
}

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::services::common::Property;
use crate::services::mpris::{LoopStatus, MprisError, PlayerController, utils::from_mpris_micros};

use super::{HassClient, HassError, MEDIA_PLAYER_DOMAIN, ServerMessage};

/// `media_player` service names
pub mod service {
    /// Start playback
    pub const PLAY: &str = "media_play";
    /// Pause playback
    pub const PAUSE: &str = "media_pause";
    /// Toggle playback
    pub const PLAY_PAUSE: &str = "media_play_pause";
    /// Stop playback
    pub const STOP: &str = "media_stop";
    /// Next track
    pub const NEXT: &str = "media_next_track";
    /// Previous track
    pub const PREVIOUS: &str = "media_previous_track";
    /// Absolute seek, `seek_position` in seconds
    pub const SEEK: &str = "media_seek";
    /// Volume, `volume_level` 0.0 to 1.0
    pub const VOLUME_SET: &str = "volume_set";
    /// Shuffle on or off
    pub const SHUFFLE_SET: &str = "shuffle_set";
    /// Repeat mode, `repeat` off/one/all
    pub const REPEAT_SET: &str = "repeat_set";
}

/// Forwards bus control requests to the entity that last updated the player.
#[derive(Clone)]
pub struct HassController {
    client: HassClient,
    entity: Property<Option<String>>,
}

impl HassController {
    /// Controller targeting whatever entity `entity` currently names
    pub fn new(client: HassClient, entity: Property<Option<String>>) -> Self {
        Self { client, entity }
    }

    /// Call a `media_player` service on the active entity.
    ///
    /// # Errors
    /// Returns `HassError::NoActivePlayer` before any entity has been seen,
    /// otherwise whatever the command exchange returns.
    #[instrument(skip(self, service_data))]
    pub async fn call(
        &self,
        service: &str,
        service_data: Option<Value>,
    ) -> Result<ServerMessage, HassError> {
        let entity_id = self.entity.get().ok_or(HassError::NoActivePlayer)?;
        debug!(%entity_id, "Calling media player service");

        self.client
            .call_service(MEDIA_PLAYER_DOMAIN, service, &entity_id, service_data)
            .await
    }

    async fn control(&self, service: &str, service_data: Option<Value>) -> Result<(), MprisError> {
        self.call(service, service_data)
            .await
            .map(|_| ())
            .map_err(|e| {
                if e.is_fatal() {
                    warn!(error = %e, service, "Hub session is gone, control dropped");
                }
                MprisError::ControlFailed(e.to_string())
            })
    }
}

#[async_trait]
impl PlayerController for HassController {
    async fn play(&self) -> Result<(), MprisError> {
        self.control(service::PLAY, None).await
    }

    async fn pause(&self) -> Result<(), MprisError> {
        self.control(service::PAUSE, None).await
    }

    async fn play_pause(&self) -> Result<(), MprisError> {
        self.control(service::PLAY_PAUSE, None).await
    }

    async fn stop(&self) -> Result<(), MprisError> {
        self.control(service::STOP, None).await
    }

    async fn next(&self) -> Result<(), MprisError> {
        self.control(service::NEXT, None).await
    }

    async fn previous(&self) -> Result<(), MprisError> {
        self.control(service::PREVIOUS, None).await
    }

    async fn seek_to(&self, position: i64) -> Result<(), MprisError> {
        let data = json!({ "seek_position": from_mpris_micros(position) });
        self.control(service::SEEK, Some(data)).await
    }

    async fn set_volume(&self, volume: f64) -> Result<(), MprisError> {
        let data = json!({ "volume_level": volume });
        self.control(service::VOLUME_SET, Some(data)).await
    }

    async fn set_shuffle(&self, shuffle: bool) -> Result<(), MprisError> {
        self.control(service::SHUFFLE_SET, Some(json!({ "shuffle": shuffle })))
            .await
    }

    async fn set_loop_status(&self, status: LoopStatus) -> Result<(), MprisError> {
        let data = json!({ "repeat": status.as_hass() });
        self.control(service::REPEAT_SET, Some(data)).await
    }
}

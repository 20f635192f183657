use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use zbus::object_server::{InterfaceRef, SignalEmitter};
use zbus::zvariant::{ObjectPath, OwnedValue};
use zbus::{Connection, connection, fdo, interface};

use super::{LoopStatus, MprisError, PlayerController, PlayerProperties};

/// Object path of the exported player
pub const OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";

/// Human readable player name
pub const IDENTITY: &str = "HASS media_player to MPRIS Bridge";

/// Desktop entry basename
pub const DESKTOP_ENTRY: &str = "hassbridge";

const BUS_NAME_PREFIX: &str = "org.mpris.MediaPlayer2.hassbridge.instance";

/// Well-known bus name for the process with the given ID
pub fn bus_name(pid: u32) -> String {
    format!("{BUS_NAME_PREFIX}{pid}")
}

/// Absolute target for a relative seek.
///
/// Never negative. When the track length is known the target does not go
/// past it.
pub fn seek_target(position: i64, offset: i64, length: i64) -> i64 {
    let target = position.saturating_add(offset).max(0);
    if length > 0 { target.min(length) } else { target }
}

/// `org.mpris.MediaPlayer2`
pub struct RootInterface;

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootInterface {
    fn raise(&self) -> fdo::Result<()> {
        Err(fdo::Error::NotSupported("Raise is not supported".to_string()))
    }

    fn quit(&self) -> fdo::Result<()> {
        Err(fdo::Error::NotSupported("Quit is not supported".to_string()))
    }

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn identity(&self) -> String {
        IDENTITY.to_string()
    }

    #[zbus(property)]
    fn desktop_entry(&self) -> String {
        DESKTOP_ENTRY.to_string()
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        Vec::new()
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        Vec::new()
    }
}

/// `org.mpris.MediaPlayer2.Player`
pub struct PlayerInterface {
    state: PlayerProperties,
    controller: Arc<dyn PlayerController>,
}

impl PlayerInterface {
    /// Interface starting from the default property set
    pub fn new(controller: Arc<dyn PlayerController>) -> Self {
        Self {
            state: PlayerProperties::default(),
            controller,
        }
    }
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerInterface {
    async fn play(&self) -> fdo::Result<()> {
        Ok(self.controller.play().await?)
    }

    async fn pause(&self) -> fdo::Result<()> {
        Ok(self.controller.pause().await?)
    }

    async fn play_pause(&self) -> fdo::Result<()> {
        Ok(self.controller.play_pause().await?)
    }

    async fn stop(&self) -> fdo::Result<()> {
        Ok(self.controller.stop().await?)
    }

    async fn next(&self) -> fdo::Result<()> {
        Ok(self.controller.next().await?)
    }

    async fn previous(&self) -> fdo::Result<()> {
        Ok(self.controller.previous().await?)
    }

    async fn seek(
        &self,
        offset: i64,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> fdo::Result<()> {
        let target = seek_target(self.state.position, offset, self.state.metadata.length);
        self.controller.seek_to(target).await?;
        Self::seeked(&emitter, target).await?;
        Ok(())
    }

    async fn set_position(
        &self,
        track_id: ObjectPath<'_>,
        position: i64,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> fdo::Result<()> {
        let metadata = &self.state.metadata;
        if track_id.as_str() != metadata.track_id {
            debug!(%track_id, "Ignoring SetPosition for stale track");
            return Ok(());
        }
        if position < 0 || (metadata.length > 0 && position > metadata.length) {
            debug!(position, "Ignoring SetPosition outside the track");
            return Ok(());
        }

        self.controller.seek_to(position).await?;
        Self::seeked(&emitter, position).await?;
        Ok(())
    }

    fn open_uri(&self, _uri: &str) -> fdo::Result<()> {
        Err(fdo::Error::NotSupported("OpenUri is not supported".to_string()))
    }

    #[zbus(signal)]
    async fn seeked(emitter: &SignalEmitter<'_>, position: i64) -> zbus::Result<()>;

    #[zbus(property)]
    fn playback_status(&self) -> String {
        self.state.playback_status.as_mpris().to_string()
    }

    #[zbus(property)]
    fn loop_status(&self) -> String {
        self.state.loop_status.as_mpris().to_string()
    }

    #[zbus(property)]
    async fn set_loop_status(&mut self, status: String) -> fdo::Result<()> {
        let status: LoopStatus = status.parse()?;
        Ok(self.controller.set_loop_status(status).await?)
    }

    #[zbus(property)]
    fn rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn set_rate(&mut self, rate: f64) {
        debug!(rate, "Ignoring playback rate change");
    }

    #[zbus(property)]
    fn shuffle(&self) -> bool {
        self.state.shuffle
    }

    #[zbus(property)]
    async fn set_shuffle(&mut self, shuffle: bool) -> fdo::Result<()> {
        Ok(self.controller.set_shuffle(shuffle).await?)
    }

    #[zbus(property)]
    fn metadata(&self) -> fdo::Result<HashMap<String, OwnedValue>> {
        self.state
            .metadata
            .to_dbus()
            .map_err(|e| MprisError::from(e).into())
    }

    #[zbus(property)]
    fn volume(&self) -> f64 {
        self.state.volume
    }

    #[zbus(property)]
    async fn set_volume(&mut self, volume: f64) -> fdo::Result<()> {
        Ok(self.controller.set_volume(volume.clamp(0.0, 1.0)).await?)
    }

    #[zbus(property(emits_changed_signal = "false"))]
    fn position(&self) -> i64 {
        self.state.position
    }

    #[zbus(property)]
    fn minimum_rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn maximum_rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_seek(&self) -> bool {
        true
    }

    #[zbus(property(emits_changed_signal = "const"))]
    fn can_control(&self) -> bool {
        true
    }
}

/// Exported MPRIS player on the session bus
pub struct MprisServer {
    connection: Connection,
    name: String,
    player: InterfaceRef<PlayerInterface>,
}

impl MprisServer {
    /// Claim the bus name and export both interfaces.
    ///
    /// # Errors
    /// Returns `NameTaken` if another process owns the name, or a D-Bus error
    /// if the session bus is unreachable.
    #[instrument(skip(controller))]
    pub async fn start(controller: Arc<dyn PlayerController>) -> Result<Self, MprisError> {
        let name = bus_name(std::process::id());

        let connection = connection::Builder::session()?
            .name(name.as_str())?
            .serve_at(OBJECT_PATH, RootInterface)?
            .serve_at(OBJECT_PATH, PlayerInterface::new(controller))?
            .build()
            .await
            .map_err(|e| match e {
                zbus::Error::NameTaken => MprisError::NameTaken(name.clone()),
                other => MprisError::DbusError(other),
            })?;

        let player = connection
            .object_server()
            .interface::<_, PlayerInterface>(OBJECT_PATH)
            .await
            .map_err(|e| MprisError::InitializationFailed(e.to_string()))?;

        info!(%name, "MPRIS player exported");

        Ok(Self {
            connection,
            name,
            player,
        })
    }

    /// Well-known name owned by this server
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the exported property set.
    ///
    /// Emits `PropertiesChanged` only for properties whose value changed.
    ///
    /// # Errors
    /// Returns an error if a change signal cannot be sent.
    pub async fn publish(&self, next: PlayerProperties) -> Result<(), MprisError> {
        let mut player = self.player.get_mut().await;
        let previous = std::mem::replace(&mut player.state, next);
        let current = &player.state;
        let emitter = self.player.signal_emitter();

        if previous.playback_status != current.playback_status {
            player.playback_status_changed(emitter).await?;
        }
        if previous.loop_status != current.loop_status {
            player.loop_status_changed(emitter).await?;
        }
        if previous.shuffle != current.shuffle {
            player.shuffle_changed(emitter).await?;
        }
        if previous.volume != current.volume {
            player.volume_changed(emitter).await?;
        }
        if previous.metadata != current.metadata {
            player.metadata_changed(emitter).await?;
        }

        Ok(())
    }

    /// Release the bus name and close the connection
    ///
    /// # Errors
    /// Returns an error if the connection cannot be closed cleanly.
    #[instrument(skip(self), fields(name = %self.name))]
    pub async fn shutdown(&self) -> Result<(), MprisError> {
        match self.connection.release_name(self.name.as_str()).await {
            Ok(true) => debug!("Bus name released"),
            Ok(false) => warn!("Bus name was not owned at shutdown"),
            Err(e) => warn!(error = %e, "Cannot release bus name"),
        }

        self.connection.clone().close().await?;
        info!("MPRIS player withdrawn");
        Ok(())
    }
}

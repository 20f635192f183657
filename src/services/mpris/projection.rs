use tracing::{debug, instrument};

use crate::services::common::Property;
use crate::services::hass::EntityState;

use super::{
    LoopStatus, PlaybackState, TrackMetadata, artwork::ArtworkCache, metadata::track_id_for,
    utils::to_mpris_micros,
};

/// Property set of the `org.mpris.MediaPlayer2.Player` interface.
///
/// Replaced as a whole on every accepted snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerProperties {
    /// `PlaybackStatus`
    pub playback_status: PlaybackState,

    /// `LoopStatus`
    pub loop_status: LoopStatus,

    /// `Shuffle`
    pub shuffle: bool,

    /// `Volume`, 0.0 to 1.0
    pub volume: f64,

    /// `Position` in microseconds
    pub position: i64,

    /// `Metadata`
    pub metadata: TrackMetadata,
}

impl PlayerProperties {
    /// Property set after applying `projection`.
    ///
    /// Metadata is only replaced when the projection carries it.
    pub fn apply(&self, projection: &Projection) -> Self {
        Self {
            playback_status: projection.playback_status,
            loop_status: projection.loop_status,
            shuffle: projection.shuffle,
            volume: projection.volume,
            position: projection.position,
            metadata: projection
                .metadata
                .clone()
                .unwrap_or_else(|| self.metadata.clone()),
        }
    }
}

/// Update derived from one snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// Entity that produced the update
    pub entity_id: String,

    /// Normalized playback state
    pub playback_status: PlaybackState,

    /// Normalized repeat mode
    pub loop_status: LoopStatus,

    /// Shuffle flag, `false` when the hub does not report one
    pub shuffle: bool,

    /// Volume fraction
    pub volume: f64,

    /// Position in microseconds
    pub position: i64,

    /// Track metadata, `None` when the snapshot lacks title or artist
    pub metadata: Option<TrackMetadata>,
}

/// Whether a snapshot is a media player currently playing music
pub fn accepts(state: &EntityState) -> bool {
    state.is_media_player() && state.is_music()
}

/// Whether a snapshot carries enough to replace the track metadata
pub fn has_complete_metadata(state: &EntityState) -> bool {
    let attributes = &state.attributes;
    let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
    present(&attributes.media_title) && present(&attributes.media_artist)
}

/// Project a snapshot onto the player property group.
///
/// Returns `None` for snapshots that are not music players. `art_url` is the
/// already resolved local artwork reference.
pub fn project(state: &EntityState, art_url: String) -> Option<Projection> {
    if !accepts(state) {
        return None;
    }

    let attributes = &state.attributes;

    let metadata = has_complete_metadata(state).then(|| TrackMetadata {
        track_id: track_id_for(&state.entity_id),
        title: attributes.media_title.clone().unwrap_or_default(),
        artist: attributes.media_artist.clone().unwrap_or_default(),
        album: attributes.media_album_name.clone().unwrap_or_default(),
        length: attributes.media_duration.map_or(0, to_mpris_micros),
        art_url,
    });

    Some(Projection {
        entity_id: state.entity_id.clone(),
        playback_status: PlaybackState::from_hass(&state.state),
        loop_status: LoopStatus::from_hass(attributes.repeat.as_deref()),
        shuffle: attributes.shuffle.unwrap_or(false),
        volume: attributes.volume_level.map_or(0.0, |v| v.clamp(0.0, 1.0)),
        position: attributes.media_position.map_or(0, to_mpris_micros),
        metadata,
    })
}

/// Turns snapshots into the published property set.
///
/// Also remembers which entity produced the last update, so control commands
/// know where to go.
#[derive(Clone)]
pub struct Projector {
    artwork: ArtworkCache,
    properties: Property<PlayerProperties>,
    entity: Property<Option<String>>,
}

impl Projector {
    /// Create a projector starting from the default property set
    pub fn new(artwork: ArtworkCache) -> Self {
        Self {
            artwork,
            properties: Property::new(PlayerProperties::default()),
            entity: Property::new(None),
        }
    }

    /// Projected property set
    pub fn properties(&self) -> Property<PlayerProperties> {
        self.properties.clone()
    }

    /// Entity ID of the last accepted snapshot
    pub fn entity(&self) -> Property<Option<String>> {
        self.entity.clone()
    }

    /// Project one snapshot. Returns whether the snapshot was accepted.
    #[instrument(skip(self, state), fields(entity_id = %state.entity_id))]
    pub async fn handle(&self, state: &EntityState) -> bool {
        if !accepts(state) {
            debug!("Discarding snapshot of non-music entity");
            return false;
        }

        let art_url = match state.attributes.entity_picture.as_deref() {
            Some(locator) if has_complete_metadata(state) => self.artwork.resolve(locator).await,
            _ => String::new(),
        };

        let Some(projection) = project(state, art_url) else {
            return false;
        };

        let next = self.properties.get().apply(&projection);
        debug!(properties = ?next, "Updating MPRIS properties");

        self.properties.set(next);
        self.entity.set(Some(projection.entity_id));
        true
    }
}

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use super::{Event, HassError, STATE_CHANGED};

/// Entity ID prefix of the media player domain
pub const MEDIA_PLAYER_DOMAIN: &str = "media_player";

/// `media_content_type` value of music playback
pub const MUSIC_CONTENT_TYPE: &str = "music";

/// Media player attributes of an entity state.
///
/// Every field is optional: the hub only reports what the integration knows,
/// and non-media entities carry none of these. A field of the wrong type reads
/// as absent without touching its neighbours.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MediaPlayerAttributes {
    /// Track title
    #[serde(deserialize_with = "lenient")]
    pub media_title: Option<String>,
    /// Track artist
    #[serde(deserialize_with = "lenient")]
    pub media_artist: Option<String>,
    /// Album name
    #[serde(deserialize_with = "lenient")]
    pub media_album_name: Option<String>,
    /// Track length in seconds
    #[serde(deserialize_with = "lenient")]
    pub media_duration: Option<f64>,
    /// Playback position in seconds
    #[serde(deserialize_with = "lenient")]
    pub media_position: Option<f64>,
    /// Volume as a 0.0 to 1.0 fraction
    #[serde(deserialize_with = "lenient")]
    pub volume_level: Option<f64>,
    /// Shuffle flag
    #[serde(deserialize_with = "lenient")]
    pub shuffle: Option<bool>,
    /// Repeat mode: `off`, `one` or `all`
    #[serde(deserialize_with = "lenient")]
    pub repeat: Option<String>,
    /// Artwork locator, usually relative to the hub address
    #[serde(deserialize_with = "lenient")]
    pub entity_picture: Option<String>,
    /// Kind of content being played
    #[serde(deserialize_with = "lenient")]
    pub media_content_type: Option<String>,
    /// Source application name
    #[serde(deserialize_with = "lenient")]
    pub app_name: Option<String>,
}

/// Snapshot of one entity, parsed once when it is received.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntityState {
    /// Entity identifier, `<domain>.<object_id>`
    pub entity_id: String,

    /// Coarse state as free text (`playing`, `paused`, `idle`, ...)
    pub state: String,

    /// Parsed attributes
    #[serde(default, deserialize_with = "lenient_attributes")]
    pub attributes: MediaPlayerAttributes,
}

impl EntityState {
    /// Domain part of the entity ID
    pub fn domain(&self) -> &str {
        self.entity_id
            .split_once('.')
            .map_or(self.entity_id.as_str(), |(domain, _)| domain)
    }

    /// Whether the entity belongs to the media player domain
    pub fn is_media_player(&self) -> bool {
        self.domain() == MEDIA_PLAYER_DOMAIN && self.entity_id.len() > MEDIA_PLAYER_DOMAIN.len() + 1
    }

    /// Whether the entity currently plays music
    pub fn is_music(&self) -> bool {
        self.attributes.media_content_type.as_deref() == Some(MUSIC_CONTENT_TYPE)
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).unwrap_or_else(|error| {
        debug!(%error, "Ignoring malformed entity attribute");
        None
    }))
}

fn lenient_attributes<'de, D>(deserializer: D) -> Result<MediaPlayerAttributes, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).unwrap_or_else(|error| {
        debug!(%error, "Ignoring malformed entity attributes");
        MediaPlayerAttributes::default()
    }))
}

/// Data of a `state_changed` event
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StateChanged {
    /// Entity that changed
    pub entity_id: String,

    /// New state, `None` when the entity was removed
    #[serde(default)]
    pub new_state: Option<EntityState>,
}

impl TryFrom<&Event> for StateChanged {
    type Error = HassError;

    fn try_from(event: &Event) -> Result<Self, Self::Error> {
        if event.event_type != STATE_CHANGED {
            return Err(HassError::Protocol(format!(
                "expected {STATE_CHANGED} event, got {}",
                event.event_type
            )));
        }

        Ok(Self::deserialize(&event.data)?)
    }
}

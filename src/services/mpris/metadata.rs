use std::collections::HashMap;

use zbus::zvariant::{self, ObjectPath, OwnedValue, Value};

/// Track ID published while nothing is loaded
pub const NO_TRACK: &str = "/org/mpris/MediaPlayer2/TrackList/NoTrack";

const TRACK_ID_PREFIX: &str = "/org/mpris/MediaPlayer2/hassbridge/";

/// Metadata information for the track being played
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    /// MPRIS track identifier (a D-Bus object path)
    pub track_id: String,

    /// Track title
    pub title: String,

    /// Track artist
    pub artist: String,

    /// Album name
    pub album: String,

    /// Track length in microseconds
    pub length: i64,

    /// Local reference to the cached artwork, empty when unavailable
    pub art_url: String,
}

impl Default for TrackMetadata {
    fn default() -> Self {
        Self {
            track_id: NO_TRACK.to_string(),
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            length: 0,
            art_url: String::new(),
        }
    }
}

impl TrackMetadata {
    /// Encode as the `a{sv}` map of the `Metadata` property.
    ///
    /// # Errors
    /// Returns an error if the track ID is not a valid object path.
    pub fn to_dbus(&self) -> Result<HashMap<String, OwnedValue>, zvariant::Error> {
        let entries = [
            (
                "mpris:trackid",
                Value::from(ObjectPath::try_from(self.track_id.as_str())?),
            ),
            ("mpris:length", Value::from(self.length)),
            ("mpris:artUrl", Value::from(self.art_url.as_str())),
            ("xesam:album", Value::from(self.album.as_str())),
            ("xesam:artist", Value::from(vec![self.artist.as_str()])),
            ("xesam:title", Value::from(self.title.as_str())),
        ];

        let mut metadata = HashMap::with_capacity(entries.len());
        for (key, value) in entries {
            metadata.insert(key.to_string(), OwnedValue::try_from(value)?);
        }
        Ok(metadata)
    }
}

/// Object path identifying tracks of one entity.
///
/// Characters outside `[A-Za-z0-9_]` are replaced so the result is always a
/// valid object path element.
pub fn track_id_for(entity_id: &str) -> String {
    let element: String = entity_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    if element.is_empty() {
        return NO_TRACK.to_string();
    }

    format!("{TRACK_ID_PREFIX}{element}")
}

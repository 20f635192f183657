use std::fmt;
use std::str::FromStr;

use super::MprisError;

/// Current playback state of the bridged player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Player is currently playing
    Playing,

    /// Player is paused
    Paused,

    /// Player is on but has nothing loaded
    Idle,

    /// Player is stopped or off
    #[default]
    Stopped,
}

impl PlaybackState {
    /// Map a hub state string.
    ///
    /// Unrecognized states are treated as idle.
    pub fn from_hass(state: &str) -> Self {
        match state {
            "playing" => Self::Playing,
            "paused" | "buffering" => Self::Paused,
            "idle" => Self::Idle,
            "off" | "standby" | "stopped" => Self::Stopped,
            _ => Self::Idle,
        }
    }

    /// `PlaybackStatus` string published on the bus.
    ///
    /// MPRIS knows no idle state, so idle is published as stopped.
    pub fn as_mpris(self) -> &'static str {
        match self {
            Self::Playing => "Playing",
            Self::Paused => "Paused",
            Self::Idle | Self::Stopped => "Stopped",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mpris())
    }
}

/// Loop mode for track or playlist repetition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopStatus {
    /// No looping
    #[default]
    None,

    /// Loop current track
    Track,

    /// Loop entire playlist
    Playlist,
}

impl LoopStatus {
    /// Map a hub `repeat` attribute
    pub fn from_hass(repeat: Option<&str>) -> Self {
        match repeat {
            Some("all") => Self::Playlist,
            Some("one") => Self::Track,
            _ => Self::None,
        }
    }

    /// Value of the hub `repeat_set` service argument
    pub fn as_hass(self) -> &'static str {
        match self {
            Self::None => "off",
            Self::Track => "one",
            Self::Playlist => "all",
        }
    }

    /// `LoopStatus` string published on the bus
    pub fn as_mpris(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Track => "Track",
            Self::Playlist => "Playlist",
        }
    }
}

impl FromStr for LoopStatus {
    type Err = MprisError;

    fn from_str(status: &str) -> Result<Self, Self::Err> {
        match status {
            "None" => Ok(Self::None),
            "Track" => Ok(Self::Track),
            "Playlist" => Ok(Self::Playlist),
            other => Err(MprisError::InvalidLoopStatus(other.to_string())),
        }
    }
}

impl fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mpris())
    }
}

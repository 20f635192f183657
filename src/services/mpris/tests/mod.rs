//! Unit tests for the mpris module
//!
//! Projection rules, metadata encoding and the pure helpers of the bus
//! front. No D-Bus connection is needed.

#![allow(clippy::panic, clippy::unwrap_used)]

use serde_json::json;
use url::Url;
use zbus::zvariant::ObjectPath;

use crate::services::hass::EntityState;
use crate::services::mpris::{
    ArtworkCache, LoopStatus, NO_TRACK, PlaybackState, PlayerProperties, Projector,
    TrackMetadata,
    projection::project,
    server::{bus_name, seek_target},
    track_id_for,
    utils::{from_mpris_micros, to_mpris_micros},
};

fn snapshot(value: serde_json::Value) -> EntityState {
    serde_json::from_value(value).unwrap()
}

fn music(state: &str, attributes: serde_json::Value) -> EntityState {
    let mut attributes = attributes;
    attributes["media_content_type"] = json!("music");
    snapshot(json!({
        "entity_id": "media_player.living_room",
        "state": state,
        "attributes": attributes
    }))
}

mod projection {
    use super::*;

    #[test]
    fn playing_track_round_trip() {
        let state = music(
            "playing",
            json!({
                "repeat": "one",
                "shuffle": true,
                "media_title": "Teardrop",
                "media_artist": "Massive Attack",
                "media_album_name": "Mezzanine",
                "media_duration": 330.2,
                "media_position": 12.5,
                "volume_level": 0.6
            }),
        );

        let projection = project(&state, "file:///tmp/cover".to_string()).unwrap();

        assert_eq!(projection.playback_status, PlaybackState::Playing);
        assert_eq!(projection.playback_status.as_mpris(), "Playing");
        assert_eq!(projection.loop_status.as_mpris(), "Track");
        assert!(projection.shuffle);
        assert_eq!(projection.volume, 0.6);
        assert_eq!(projection.position, 12_500_000);

        let metadata = projection.metadata.unwrap();
        assert_eq!(metadata.title, "Teardrop");
        assert_eq!(metadata.artist, "Massive Attack");
        assert_eq!(metadata.album, "Mezzanine");
        assert_eq!(metadata.length, 330_200_000);
        assert_eq!(metadata.art_url, "file:///tmp/cover");
        assert_eq!(
            metadata.track_id,
            "/org/mpris/MediaPlayer2/hassbridge/media_player_living_room"
        );
    }

    #[test]
    fn missing_title_carries_no_metadata() {
        let state = music("playing", json!({"media_artist": "Massive Attack"}));

        let projection = project(&state, String::new()).unwrap();

        assert!(projection.metadata.is_none());
    }

    #[test]
    fn empty_artist_carries_no_metadata() {
        let state = music("playing", json!({"media_title": "Angel", "media_artist": ""}));

        assert!(project(&state, String::new()).unwrap().metadata.is_none());
    }

    #[test]
    fn non_media_player_rejected() {
        let state = snapshot(json!({
            "entity_id": "light.kitchen",
            "state": "on",
            "attributes": {"media_content_type": "music"}
        }));

        assert!(project(&state, String::new()).is_none());
    }

    #[test]
    fn non_music_content_rejected() {
        let state = snapshot(json!({
            "entity_id": "media_player.tv",
            "state": "playing",
            "attributes": {"media_content_type": "tvshow", "media_title": "News"}
        }));

        assert!(project(&state, String::new()).is_none());
    }

    #[test]
    fn absent_numbers_project_to_zero() {
        let state = music("paused", json!({}));

        let projection = project(&state, String::new()).unwrap();

        assert_eq!(projection.volume, 0.0);
        assert_eq!(projection.position, 0);
        assert!(!projection.shuffle);
        assert_eq!(projection.loop_status, LoopStatus::None);
    }

    #[test]
    fn volume_clamped() {
        let loud = music("playing", json!({"volume_level": 1.7}));
        let negative = music("playing", json!({"volume_level": -0.2}));

        assert_eq!(project(&loud, String::new()).unwrap().volume, 1.0);
        assert_eq!(project(&negative, String::new()).unwrap().volume, 0.0);
    }

    #[test]
    fn partial_update_keeps_previous_metadata() {
        let previous = PlayerProperties {
            metadata: TrackMetadata {
                title: "Teardrop".to_string(),
                artist: "Massive Attack".to_string(),
                ..TrackMetadata::default()
            },
            ..PlayerProperties::default()
        };
        let state = music("paused", json!({"media_artist": "Massive Attack"}));

        let next = previous.apply(&project(&state, String::new()).unwrap());

        assert_eq!(next.playback_status, PlaybackState::Paused);
        assert_eq!(next.metadata, previous.metadata);
    }
}

mod states {
    use super::*;

    #[test]
    fn hub_states_normalized() {
        let cases = [
            ("playing", PlaybackState::Playing),
            ("paused", PlaybackState::Paused),
            ("buffering", PlaybackState::Paused),
            ("idle", PlaybackState::Idle),
            ("off", PlaybackState::Stopped),
            ("standby", PlaybackState::Stopped),
            ("stopped", PlaybackState::Stopped),
            ("on", PlaybackState::Idle),
            ("unavailable", PlaybackState::Idle),
        ];

        for (state, expected) in cases {
            assert_eq!(PlaybackState::from_hass(state), expected, "state {state}");
        }
    }

    #[test]
    fn idle_published_as_stopped() {
        assert_eq!(PlaybackState::Idle.as_mpris(), "Stopped");
        assert_eq!(PlaybackState::default().as_mpris(), "Stopped");
    }

    #[test]
    fn repeat_modes_map_both_ways() {
        assert_eq!(LoopStatus::from_hass(Some("all")), LoopStatus::Playlist);
        assert_eq!(LoopStatus::from_hass(Some("one")), LoopStatus::Track);
        assert_eq!(LoopStatus::from_hass(Some("off")), LoopStatus::None);
        assert_eq!(LoopStatus::from_hass(None), LoopStatus::None);

        assert_eq!(LoopStatus::Playlist.as_hass(), "all");
        assert_eq!(LoopStatus::Track.as_hass(), "one");
        assert_eq!(LoopStatus::None.as_hass(), "off");
    }

    #[test]
    fn loop_status_parsed_from_bus() {
        assert_eq!("Track".parse::<LoopStatus>().unwrap(), LoopStatus::Track);
        assert_eq!("Playlist".parse::<LoopStatus>().unwrap(), LoopStatus::Playlist);
        assert!("Forever".parse::<LoopStatus>().is_err());
    }
}

mod metadata {
    use super::*;

    #[test]
    fn dbus_map_has_expected_keys() {
        let metadata = TrackMetadata {
            track_id: track_id_for("media_player.den"),
            title: "Roads".to_string(),
            artist: "Portishead".to_string(),
            album: "Dummy".to_string(),
            length: 305_000_000,
            art_url: "file:///tmp/x".to_string(),
        };

        let map = metadata.to_dbus().unwrap();

        let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "mpris:artUrl",
                "mpris:length",
                "mpris:trackid",
                "xesam:album",
                "xesam:artist",
                "xesam:title"
            ]
        );

        assert_eq!(
            i64::try_from(&map["mpris:length"]).unwrap(),
            305_000_000
        );
        assert_eq!(
            <&str>::try_from(&map["xesam:title"]).unwrap(),
            "Roads"
        );
        let track_id: ObjectPath<'_> = map["mpris:trackid"].downcast_ref().unwrap();
        assert_eq!(
            track_id.as_str(),
            "/org/mpris/MediaPlayer2/hassbridge/media_player_den"
        );
    }

    #[test]
    fn default_metadata_is_valid() {
        let map = TrackMetadata::default().to_dbus().unwrap();

        let track_id: ObjectPath<'_> = map["mpris:trackid"].downcast_ref().unwrap();
        assert_eq!(track_id.as_str(), NO_TRACK);
    }

    #[test]
    fn track_ids_are_valid_paths() {
        let id = track_id_for("media_player.büro-2");

        assert!(ObjectPath::try_from(id.as_str()).is_ok());
        assert_eq!(track_id_for(""), NO_TRACK);
    }
}

mod helpers {
    use super::*;

    #[test]
    fn seconds_to_micros_rounds() {
        assert_eq!(to_mpris_micros(1.0), 1_000_000);
        assert_eq!(to_mpris_micros(0.000_000_6), 1);
        assert_eq!(to_mpris_micros(-3.0), 0);
        assert_eq!(to_mpris_micros(f64::NAN), 0);
        assert_eq!(from_mpris_micros(2_500_000), 2.5);
    }

    #[test]
    fn seek_target_bounded() {
        assert_eq!(seek_target(10_000_000, 5_000_000, 60_000_000), 15_000_000);
        assert_eq!(seek_target(10_000_000, -20_000_000, 60_000_000), 0);
        assert_eq!(seek_target(50_000_000, 30_000_000, 60_000_000), 60_000_000);
        assert_eq!(seek_target(50_000_000, 30_000_000, 0), 80_000_000);
    }

    #[test]
    fn bus_name_carries_pid() {
        assert_eq!(bus_name(4242), "org.mpris.MediaPlayer2.hassbridge.instance4242");
    }
}

mod projector {
    use super::*;

    fn projector(dir: &std::path::Path) -> Projector {
        let artwork = ArtworkCache::new(
            dir.to_path_buf(),
            Url::parse("http://127.0.0.1:9/").unwrap(),
            reqwest::Client::new(),
        );
        Projector::new(artwork)
    }

    #[tokio::test]
    async fn accepted_snapshot_updates_properties_and_entity() {
        let dir = tempfile::tempdir().unwrap();
        let projector = projector(dir.path());

        let accepted = projector
            .handle(&music(
                "playing",
                json!({"media_title": "Angel", "media_artist": "Massive Attack"}),
            ))
            .await;

        assert!(accepted);
        let properties = projector.properties().get();
        assert_eq!(properties.playback_status, PlaybackState::Playing);
        assert_eq!(properties.metadata.title, "Angel");
        assert_eq!(properties.metadata.art_url, "");
        assert_eq!(
            projector.entity().get().as_deref(),
            Some("media_player.living_room")
        );
    }

    #[tokio::test]
    async fn rejected_snapshot_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let projector = projector(dir.path());

        let accepted = projector
            .handle(&snapshot(json!({
                "entity_id": "light.kitchen",
                "state": "on",
                "attributes": {}
            })))
            .await;

        assert!(!accepted);
        assert_eq!(projector.properties().get(), PlayerProperties::default());
        assert_eq!(projector.entity().get(), None);
    }

    #[tokio::test]
    async fn incomplete_snapshot_keeps_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let projector = projector(dir.path());

        projector
            .handle(&music(
                "playing",
                json!({"media_title": "Angel", "media_artist": "Massive Attack"}),
            ))
            .await;
        projector
            .handle(&music("paused", json!({"media_title": "Angel"})))
            .await;

        let properties = projector.properties().get();
        assert_eq!(properties.playback_status, PlaybackState::Paused);
        assert_eq!(properties.metadata.artist, "Massive Attack");
    }
}

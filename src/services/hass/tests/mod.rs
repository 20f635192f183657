//! Unit tests for the hass module
//!
//! Wire decoding, snapshot parsing and the correlation table. Everything
//! that needs a socket lives in `session.rs`.

#![allow(clippy::panic, clippy::unwrap_used)]


use serde_json::json;

use crate::services::hass::{
    ClientCommand, EntityState, ErrorPayload, Event, HassError, MessageType, ServerMessage,
    StateChanged,
    client::check_result,
    router::{Delivery, IdAllocator, Router},
};

fn message(value: serde_json::Value) -> ServerMessage {
    serde_json::from_value(value).unwrap()
}

mod wire {
    use super::*;

    #[test]
    fn decodes_successful_result() {
        let msg = message(json!({
            "id": 7,
            "type": "result",
            "success": true,
            "result": {"context": {"id": "abc"}}
        }));

        assert_eq!(msg.id, Some(7));
        assert_eq!(msg.kind, MessageType::Result);
        assert!(msg.success);
        assert_eq!(msg.result, Some(json!({"context": {"id": "abc"}})));
        assert!(!msg.is_id_reuse());
    }

    #[test]
    fn decodes_auth_phase_messages() {
        let required = message(json!({"type": "auth_required", "ha_version": "2024.6.1"}));
        assert_eq!(required.kind, MessageType::AuthRequired);
        assert_eq!(required.id, None);
        assert_eq!(required.ha_version.as_deref(), Some("2024.6.1"));

        let invalid = message(json!({"type": "auth_invalid", "message": "Invalid password"}));
        assert_eq!(invalid.kind, MessageType::AuthInvalid);
        assert_eq!(invalid.message.as_deref(), Some("Invalid password"));
    }

    #[test]
    fn unknown_type_is_tolerated() {
        let msg = message(json!({"id": 3, "type": "supported_features"}));

        assert_eq!(msg.kind, MessageType::Unknown);
    }

    #[test]
    fn detects_id_reuse() {
        let msg = message(json!({
            "id": 4,
            "type": "result",
            "success": false,
            "error": {"code": "id_reuse", "message": "Identifier values have to increase."}
        }));

        assert!(msg.is_id_reuse());
    }

    #[test]
    fn call_service_serializes_target() {
        let command = ClientCommand::call_service(
            "media_player",
            "media_play",
            "media_player.kitchen",
            None,
        )
        .with_id(12);

        let encoded = serde_json::to_value(&command).unwrap();

        assert_eq!(
            encoded,
            json!({
                "id": 12,
                "type": "call_service",
                "domain": "media_player",
                "service": "media_play",
                "target": {"entity_id": "media_player.kitchen"},
                "return_response": false
            })
        );
    }

    #[test]
    fn subscribe_and_unsubscribe_serialize() {
        let subscribe = serde_json::to_value(
            ClientCommand::subscribe_events("state_changed").with_id(2),
        )
        .unwrap();
        assert_eq!(
            subscribe,
            json!({"id": 2, "type": "subscribe_events", "event_type": "state_changed"})
        );

        let unsubscribe =
            serde_json::to_value(ClientCommand::unsubscribe_events(2).with_id(9)).unwrap();
        assert_eq!(
            unsubscribe,
            json!({"id": 9, "type": "unsubscribe_events", "subscription": 2})
        );
    }

    #[test]
    fn check_result_rejects_other_kinds() {
        let msg = message(json!({"id": 5, "type": "event", "event": {}}));

        let result = check_result(5, msg);

        assert!(matches!(
            result,
            Err(HassError::UnexpectedMessageKind { id: 5, kind: MessageType::Event })
        ));
    }

    #[test]
    fn check_result_surfaces_hub_error() {
        let msg = message(json!({
            "id": 6,
            "type": "result",
            "success": false,
            "error": {"code": "not_found", "message": "Service not found."}
        }));

        match check_result(6, msg) {
            Err(HassError::CommandFailed { id, error }) => {
                assert_eq!(id, 6);
                assert_eq!(
                    error,
                    ErrorPayload {
                        code: "not_found".to_string(),
                        message: "Service not found.".to_string(),
                    }
                );
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }
}

#[test]
fn fatal_errors_classified() {
    assert!(HassError::Transport("reset".to_string()).is_fatal());
    assert!(HassError::Protocol("id reuse".to_string()).is_fatal());
    assert!(!HassError::NoActivePlayer.is_fatal());
    assert!(
        !HassError::CommandFailed {
            id: 1,
            error: ErrorPayload::default(),
        }
        .is_fatal()
    );
}

mod snapshots {
    use super::*;

    #[test]
    fn parses_media_player_state() {
        let state: EntityState = serde_json::from_value(json!({
            "entity_id": "media_player.living_room",
            "state": "playing",
            "attributes": {
                "media_title": "Windowlicker",
                "media_artist": "Aphex Twin",
                "media_album_name": "Windowlicker",
                "media_duration": 367.5,
                "media_position": 12,
                "volume_level": 0.42,
                "shuffle": true,
                "repeat": "all",
                "entity_picture": "/api/media_player_proxy/media_player.living_room?token=x",
                "media_content_type": "music",
                "friendly_name": "Living Room"
            },
            "last_changed": "2024-06-01T10:00:00+00:00"
        }))
        .unwrap();

        assert!(state.is_media_player());
        assert!(state.is_music());
        assert_eq!(state.attributes.media_duration, Some(367.5));
        assert_eq!(state.attributes.media_position, Some(12.0));
        assert_eq!(state.attributes.repeat.as_deref(), Some("all"));
    }

    #[test]
    fn malformed_attributes_degrade_to_defaults() {
        let state: EntityState = serde_json::from_value(json!({
            "entity_id": "media_player.den",
            "state": "idle",
            "attributes": {"volume_level": "loud"}
        }))
        .unwrap();

        assert_eq!(state.state, "idle");
        assert_eq!(state.attributes, Default::default());
    }

    #[test]
    fn wrong_typed_attribute_keeps_the_rest() {
        let state: EntityState = serde_json::from_value(json!({
            "entity_id": "media_player.den",
            "state": "playing",
            "attributes": {
                "media_title": "Teardrop",
                "media_artist": "Massive Attack",
                "volume_level": "loud",
                "shuffle": "yes",
                "media_content_type": "music"
            }
        }))
        .unwrap();

        assert!(state.is_music());
        assert_eq!(state.attributes.media_title.as_deref(), Some("Teardrop"));
        assert_eq!(state.attributes.volume_level, None);
        assert_eq!(state.attributes.shuffle, None);
    }

    #[test]
    fn non_object_attributes_degrade_to_defaults() {
        let state: EntityState = serde_json::from_value(json!({
            "entity_id": "media_player.den",
            "state": "idle",
            "attributes": "unavailable"
        }))
        .unwrap();

        assert_eq!(state.attributes, Default::default());
    }

    #[test]
    fn non_media_entities_recognized() {
        let light: EntityState = serde_json::from_value(json!({
            "entity_id": "light.kitchen",
            "state": "on",
            "attributes": {"brightness": 255}
        }))
        .unwrap();

        assert_eq!(light.domain(), "light");
        assert!(!light.is_media_player());
        assert!(!light.is_music());
    }

    #[test]
    fn state_changed_with_removed_entity() {
        let event: Event = serde_json::from_value(json!({
            "event_type": "state_changed",
            "data": {"entity_id": "media_player.den", "old_state": null, "new_state": null}
        }))
        .unwrap();

        let change = StateChanged::try_from(&event).unwrap();

        assert_eq!(change.entity_id, "media_player.den");
        assert!(change.new_state.is_none());
    }

    #[test]
    fn state_changed_rejects_other_events() {
        let event: Event = serde_json::from_value(json!({
            "event_type": "call_service",
            "data": {}
        }))
        .unwrap();

        assert!(matches!(
            StateChanged::try_from(&event),
            Err(HassError::Protocol(_))
        ));
    }
}

mod router {
    use super::*;

    fn result_for(id: u64) -> ServerMessage {
        message(json!({"id": id, "type": "result", "success": true}))
    }

    fn event_for(id: u64, n: u64) -> ServerMessage {
        message(json!({
            "id": id,
            "type": "event",
            "event": {"event_type": "state_changed", "data": {"n": n}}
        }))
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let ids = IdAllocator::default();

        let allocated: Vec<u64> = (0..5).map(|_| ids.next()).collect();

        assert_eq!(allocated, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn pending_route_removed_after_delivery() {
        let router = Router::new();
        let rx = router.register_pending(1).await.unwrap();

        assert_eq!(router.dispatch(result_for(1)).await, Delivery::Delivered);
        assert_eq!(rx.await.unwrap().id, Some(1));
        assert!(!router.contains(1).await);
        assert_eq!(router.dispatch(result_for(1)).await, Delivery::Unrouted);
    }

    #[tokio::test]
    async fn subscription_splits_ack_and_events() {
        let router = Router::new();
        let (ack, mut events) = router.register_subscription(3, 8).await.unwrap();

        router.dispatch(result_for(3)).await;
        router.dispatch(event_for(3, 1)).await;
        router.dispatch(event_for(3, 2)).await;

        assert_eq!(ack.await.unwrap().kind, MessageType::Result);
        assert_eq!(events.recv().await.unwrap().event.unwrap()["data"]["n"], 1);
        assert_eq!(events.recv().await.unwrap().event.unwrap()["data"]["n"], 2);
        assert!(router.contains(3).await);
    }

    #[tokio::test]
    async fn full_queue_drops_newest() {
        let router = Router::new();
        let (_ack, mut events) = router.register_subscription(4, 1).await.unwrap();
        router.dispatch(result_for(4)).await;

        assert_eq!(router.dispatch(event_for(4, 1)).await, Delivery::Delivered);
        assert_eq!(router.dispatch(event_for(4, 2)).await, Delivery::Dropped);

        let kept = events.recv().await.unwrap();
        assert_eq!(kept.event.unwrap()["data"]["n"], 1);
    }

    #[tokio::test]
    async fn closed_subscriber_route_removed() {
        let router = Router::new();
        let (_ack, events) = router.register_subscription(5, 4).await.unwrap();
        router.dispatch(result_for(5)).await;
        drop(events);

        assert_eq!(router.dispatch(event_for(5, 1)).await, Delivery::Unrouted);
        assert!(!router.contains(5).await);
    }

    #[tokio::test]
    async fn message_without_id_unrouted() {
        let router = Router::new();

        let delivery = router.dispatch(message(json!({"type": "pong"}))).await;

        assert_eq!(delivery, Delivery::Unrouted);
    }

    #[tokio::test]
    async fn close_releases_everything() {
        let router = Router::new();
        let pending = router.register_pending(1).await.unwrap();
        let (_ack, mut events) = router.register_subscription(2, 4).await.unwrap();

        router.close().await;

        assert!(pending.await.is_err());
        assert!(events.recv().await.is_none());
        assert!(router.is_empty().await);
        assert!(router.is_closed().await);
        assert!(matches!(
            router.register_pending(3).await,
            Err(HassError::SessionClosed)
        ));
    }
}

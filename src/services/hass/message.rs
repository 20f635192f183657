use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event type carrying entity state transitions
pub const STATE_CHANGED: &str = "state_changed";

/// Error code the hub uses when a request ID was already seen
pub const ID_REUSE_CODE: &str = "id_reuse";

/// Kind of a websocket message, as found in its `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// First message sent by the hub after the socket opens
    AuthRequired,
    /// Credential message sent by the client
    Auth,
    /// Hub accepted the credential
    AuthOk,
    /// Hub rejected the credential
    AuthInvalid,
    /// Answer to a command
    Result,
    /// Message delivered to an event subscription
    Event,
    /// Client heartbeat
    Ping,
    /// Hub heartbeat reply
    Pong,
    /// Start an event subscription
    SubscribeEvents,
    /// Cancel an event subscription
    UnsubscribeEvents,
    /// Invoke a hub service
    CallService,
    /// Any type this client does not know about
    #[serde(other)]
    Unknown,
}

/// Error object attached to failed `result` messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Machine readable error code
    #[serde(default)]
    pub code: String,
    /// Human readable description
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.code.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} ({})", self.message, self.code)
        }
    }
}

/// Any message sent by the hub.
///
/// Only the envelope is interpreted here. `result` and `event` stay raw JSON until
/// the exchange or subscription that owns the ID decodes them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerMessage {
    /// Request ID this message answers. Absent during the auth phase.
    #[serde(default)]
    pub id: Option<u64>,

    /// Message kind
    #[serde(rename = "type")]
    pub kind: MessageType,

    /// Outcome flag of `result` messages
    #[serde(default)]
    pub success: bool,

    /// Payload of successful `result` messages
    #[serde(default)]
    pub result: Option<Value>,

    /// Payload of failed `result` messages
    #[serde(default)]
    pub error: Option<ErrorPayload>,

    /// Payload of `event` messages
    #[serde(default)]
    pub event: Option<Value>,

    /// Hub version, sent during the auth phase
    #[serde(default)]
    pub ha_version: Option<String>,

    /// Free-text reason, sent with `auth_invalid`
    #[serde(default)]
    pub message: Option<String>,
}

impl ServerMessage {
    /// Whether the hub is telling us a request ID was used twice
    pub fn is_id_reuse(&self) -> bool {
        self.kind == MessageType::Result
            && !self.success
            && self
                .error
                .as_ref()
                .is_some_and(|error| error.code == ID_REUSE_CODE)
    }
}

/// Credential message of the handshake
#[derive(Debug, Serialize)]
pub struct AuthMessage<'a> {
    #[serde(rename = "type")]
    kind: MessageType,
    access_token: &'a str,
}

impl<'a> AuthMessage<'a> {
    /// Build the `auth` message for a bearer token
    pub fn new(access_token: &'a str) -> Self {
        Self {
            kind: MessageType::Auth,
            access_token,
        }
    }
}

/// Target selector for `call_service`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceTarget {
    /// Entity the service acts on
    pub entity_id: String,
}

/// Command sent by the client after the handshake.
///
/// The `id` is filled in by the multiplexer when the command is sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientCommand {
    /// Request ID
    pub id: u64,

    /// Command kind
    #[serde(rename = "type")]
    pub kind: MessageType,

    /// Event type for `subscribe_events`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    /// Subscription ID for `unsubscribe_events`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<u64>,

    /// Service domain for `call_service`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Service name for `call_service`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    /// Service target for `call_service`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<ServiceTarget>,

    /// Service arguments for `call_service`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_data: Option<Value>,

    /// Whether `call_service` should return the service response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_response: Option<bool>,
}

impl ClientCommand {
    /// Create a bare command of the given kind
    pub fn new(kind: MessageType) -> Self {
        Self {
            id: 0,
            kind,
            event_type: None,
            subscription: None,
            domain: None,
            service: None,
            target: None,
            service_data: None,
            return_response: None,
        }
    }

    /// Heartbeat ping
    pub fn ping() -> Self {
        Self::new(MessageType::Ping)
    }

    /// Subscribe to one event type on the hub event bus
    pub fn subscribe_events(event_type: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
            ..Self::new(MessageType::SubscribeEvents)
        }
    }

    /// Cancel the subscription created by request `subscription`
    pub fn unsubscribe_events(subscription: u64) -> Self {
        Self {
            subscription: Some(subscription),
            ..Self::new(MessageType::UnsubscribeEvents)
        }
    }

    /// Call `domain.service` on a single entity
    pub fn call_service(
        domain: impl Into<String>,
        service: impl Into<String>,
        entity_id: impl Into<String>,
        service_data: Option<Value>,
    ) -> Self {
        Self {
            domain: Some(domain.into()),
            service: Some(service.into()),
            target: Some(ServiceTarget {
                entity_id: entity_id.into(),
            }),
            service_data,
            return_response: Some(false),
            ..Self::new(MessageType::CallService)
        }
    }

    /// Return the command tagged with a request ID
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }
}

/// Payload of an `event` message
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Event {
    /// Event bus topic, e.g. `state_changed`
    pub event_type: String,

    /// Topic specific data
    #[serde(default)]
    pub data: Value,

    /// Hub timestamp of the event
    #[serde(default)]
    pub time_fired: Option<String>,
}

use tokio_tungstenite::tungstenite;

use super::{ErrorPayload, MessageType};

/// Errors that can occur while talking to the Home Assistant hub
#[derive(thiserror::Error, Debug)]
pub enum HassError {
    /// Connection-level failure. The session is dead once this is seen.
    #[error("Transport failed: {0}")]
    Transport(String),

    /// The hub rejected the access token during the handshake
    #[error("Authentication rejected: {0}")]
    Auth(String),

    /// The hub broke the expected message sequence
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// A command was answered with something other than a `result` message
    #[error("Command {id} answered with unexpected {kind:?} message")]
    UnexpectedMessageKind {
        /// Request ID of the command
        id: u64,
        /// Kind of the message that arrived instead
        kind: MessageType,
    },

    /// A command was answered with `success: false`
    #[error("Command {id} failed: {error}")]
    CommandFailed {
        /// Request ID of the command
        id: u64,
        /// Error payload supplied by the hub
        error: ErrorPayload,
    },

    /// The session ended before the exchange completed
    #[error("Session closed")]
    SessionClosed,

    /// A message or response body could not be decoded
    #[error("Failed to decode hub payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// REST request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// REST request answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Status code returned by the hub
        status: u16,
        /// Requested URL
        url: String,
    },

    /// An endpoint URL could not be built
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// A control command arrived before any media player was projected
    #[error("No media player has reported state yet")]
    NoActivePlayer,
}

impl HassError {
    /// Whether this error ends the session.
    ///
    /// Per-exchange failures only affect the caller that received them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Auth(_) | Self::Protocol(_) | Self::SessionClosed
        )
    }
}

impl From<tungstenite::Error> for HassError {
    fn from(error: tungstenite::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

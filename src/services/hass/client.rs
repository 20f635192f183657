use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use futures::Stream;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::{
    ClientCommand, Event, HassError, MessageType, ServerMessage,
    router::SUBSCRIPTION_QUEUE,
    session::{Session, SessionOptions},
};

/// Multiplexed command and subscription API over one hub session.
///
/// Cheap to clone; every clone shares the same session. Any number of tasks may
/// send commands or hold subscriptions concurrently.
#[derive(Clone)]
pub struct HassClient {
    session: Arc<Session>,
}

impl HassClient {
    /// Connect and authenticate a new session.
    ///
    /// # Errors
    /// See [`Session::connect`].
    pub async fn connect(
        endpoint: &Url,
        token: &str,
        options: SessionOptions,
        errors: mpsc::Sender<HassError>,
    ) -> Result<Self, HassError> {
        let session = Session::connect(endpoint, token, options, errors).await?;
        Ok(Self::new(session))
    }

    /// Wrap an established session
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(session),
        }
    }

    /// Version reported by the hub
    pub fn ha_version(&self) -> Option<&str> {
        self.session.ha_version()
    }

    /// Whether the underlying session is gone
    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    /// Send a command and wait for the `result` answering it.
    ///
    /// Only the calling task waits; other exchanges proceed independently. The
    /// command's `id` is replaced by a freshly allocated request ID.
    ///
    /// # Errors
    /// Returns `HassError::UnexpectedMessageKind` if the answer is not a `result`,
    /// `HassError::CommandFailed` if the hub reports failure, and
    /// `HassError::SessionClosed` or `HassError::Transport` if the session dies
    /// first.
    pub async fn send_command(
        &self,
        command: ClientCommand,
    ) -> Result<(u64, ServerMessage), HassError> {
        let router = self.session.router();
        let (id, response) = self
            .session
            .send_sequenced(command, move |id| router.register_pending(id))
            .await?;

        let message = self.await_result(id, response).await?;
        Ok((id, message))
    }

    /// Subscribe to an event type on the hub event bus.
    ///
    /// The returned stream yields every event for the subscription in arrival
    /// order, and ends when the session closes.
    ///
    /// # Errors
    /// Same as [`HassClient::send_command`].
    #[instrument(skip(self))]
    pub async fn subscribe(&self, event_type: &str) -> Result<EventSubscription, HassError> {
        let router = self.session.router();
        let (id, (ack, events)) = self
            .session
            .send_sequenced(ClientCommand::subscribe_events(event_type), move |id| {
                router.register_subscription(id, SUBSCRIPTION_QUEUE)
            })
            .await?;

        if let Err(e) = self.await_result(id, ack).await {
            if matches!(e, HassError::CommandFailed { .. }) {
                error!(error = %e, event_type, "Subscribe command failed");
            }
            return Err(e);
        }

        info!(event_type, id, "Subscribed to Home Assistant events");

        Ok(EventSubscription {
            id,
            events,
            client: self.clone(),
        })
    }

    /// Call a hub service on a single entity.
    ///
    /// # Errors
    /// Same as [`HassClient::send_command`].
    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        entity_id: &str,
        service_data: Option<Value>,
    ) -> Result<ServerMessage, HassError> {
        let command = ClientCommand::call_service(domain, service, entity_id, service_data);
        let (_, message) = self.send_command(command).await?;
        Ok(message)
    }

    /// Close the session. Outstanding exchanges fail with `SessionClosed`.
    pub async fn close(&self) {
        self.session.close().await;
    }

    async fn await_result(
        &self,
        id: u64,
        response: oneshot::Receiver<ServerMessage>,
    ) -> Result<ServerMessage, HassError> {
        let outcome = match response.await {
            Ok(message) => check_result(id, message),
            Err(_) => Err(HassError::SessionClosed),
        };

        if outcome.is_err() {
            self.session.router().remove(id).await;
        }
        outcome
    }
}

/// Validate the answer to command `id`
pub(crate) fn check_result(id: u64, message: ServerMessage) -> Result<ServerMessage, HassError> {
    if message.kind != MessageType::Result {
        return Err(HassError::UnexpectedMessageKind {
            id,
            kind: message.kind,
        });
    }

    if !message.success {
        return Err(HassError::CommandFailed {
            id,
            error: message.error.unwrap_or_default(),
        });
    }

    Ok(message)
}

/// Live stream of events for one subscription.
///
/// Dropping it stops delivery; the hub side subscription is only cancelled by
/// [`EventSubscription::unsubscribe`].
pub struct EventSubscription {
    id: u64,
    events: mpsc::Receiver<ServerMessage>,
    client: HassClient,
}

impl EventSubscription {
    /// Request ID that created this subscription
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cancel the subscription on the hub and stop delivery.
    ///
    /// # Errors
    /// Same as [`HassClient::send_command`].
    pub async fn unsubscribe(self) -> Result<(), HassError> {
        let result = self
            .client
            .send_command(ClientCommand::unsubscribe_events(self.id))
            .await;
        self.client.session.router().remove(self.id).await;
        result?;

        info!(id = self.id, "Unsubscribed from Home Assistant events");
        Ok(())
    }
}

impl Stream for EventSubscription {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let Some(message) = ready!(self.events.poll_recv(cx)) else {
                debug!(id = self.id, "Subscription stream ended");
                return Poll::Ready(None);
            };

            if let Some(event) = decode_event(self.id, message) {
                return Poll::Ready(Some(event));
            }
        }
    }
}

fn decode_event(id: u64, message: ServerMessage) -> Option<Event> {
    if message.kind != MessageType::Event {
        warn!(id, kind = ?message.kind, "Ignoring non-event message on subscription");
        return None;
    }

    let Some(payload) = message.event else {
        warn!(id, "Event message without payload");
        return None;
    };

    match serde_json::from_value(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(id, error = %e, "Dropping undecodable event");
            None
        }
    }
}

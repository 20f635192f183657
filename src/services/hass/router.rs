use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, warn};

use super::{HassError, ServerMessage};

/// Capacity of each subscription's event queue
pub const SUBSCRIPTION_QUEUE: usize = 256;

/// Request ID source for one session.
///
/// IDs start at 1, strictly increase and are never handed out twice.
#[derive(Debug, Default)]
pub struct IdAllocator(AtomicU64);

impl IdAllocator {
    /// Allocate the next request ID
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Delivery target of one request ID
enum Route {
    /// One-shot exchange, removed on first delivery
    Pending(oneshot::Sender<ServerMessage>),

    /// Long-lived subscription. The first message is the command result,
    /// everything after it is an event.
    Subscription {
        ack: Option<oneshot::Sender<ServerMessage>>,
        events: mpsc::Sender<ServerMessage>,
    },
}

#[derive(Default)]
struct RouteTable {
    routes: HashMap<u64, Route>,
    closed: bool,
}

/// Outcome of handing a message to the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Message reached its destination
    Delivered,
    /// Subscription queue was full, message dropped
    Dropped,
    /// No destination registered for the ID
    Unrouted,
}

/// Correlation table mapping request IDs to their waiting receivers.
///
/// All access goes through one lock. Delivery never waits on a consumer, so the
/// receive loop cannot stall behind a slow subscriber.
#[derive(Default)]
pub struct Router {
    table: Mutex<RouteTable>,
}

impl Router {
    /// Create an empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a one-shot exchange for `id`.
    ///
    /// # Errors
    /// Returns `HassError::SessionClosed` once the router was closed.
    pub async fn register_pending(
        &self,
        id: u64,
    ) -> Result<oneshot::Receiver<ServerMessage>, HassError> {
        let (tx, rx) = oneshot::channel();
        self.insert(id, Route::Pending(tx)).await?;
        Ok(rx)
    }

    /// Register a subscription for `id`, returning its result slot and event queue.
    ///
    /// # Errors
    /// Returns `HassError::SessionClosed` once the router was closed.
    pub async fn register_subscription(
        &self,
        id: u64,
        capacity: usize,
    ) -> Result<
        (
            oneshot::Receiver<ServerMessage>,
            mpsc::Receiver<ServerMessage>,
        ),
        HassError,
    > {
        let (ack_tx, ack_rx) = oneshot::channel();
        let (events_tx, events_rx) = mpsc::channel(capacity);
        self.insert(
            id,
            Route::Subscription {
                ack: Some(ack_tx),
                events: events_tx,
            },
        )
        .await?;
        Ok((ack_rx, events_rx))
    }

    async fn insert(&self, id: u64, route: Route) -> Result<(), HassError> {
        let mut table = self.table.lock().await;
        if table.closed {
            return Err(HassError::SessionClosed);
        }

        if table.routes.insert(id, route).is_some() {
            warn!(id, "Replaced an existing route for request ID");
        }
        Ok(())
    }

    /// Drop whatever is registered for `id`
    pub async fn remove(&self, id: u64) {
        self.table.lock().await.routes.remove(&id);
    }

    /// Whether anything is registered for `id`
    #[cfg(test)]
    pub(crate) async fn contains(&self, id: u64) -> bool {
        self.table.lock().await.routes.contains_key(&id)
    }

    /// Number of registered destinations
    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.table.lock().await.routes.len()
    }

    /// Whether no destination is registered
    #[cfg(test)]
    pub(crate) async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Route one inbound message to the destination registered for its ID.
    ///
    /// Messages without a destination are dropped with a warning.
    pub async fn dispatch(&self, message: ServerMessage) -> Delivery {
        let Some(id) = message.id else {
            warn!(kind = ?message.kind, "Dropping hub message without an ID");
            return Delivery::Unrouted;
        };

        let mut table = self.table.lock().await;

        let is_pending = matches!(table.routes.get(&id), Some(Route::Pending(_)));
        if is_pending {
            if let Some(Route::Pending(tx)) = table.routes.remove(&id) {
                if tx.send(message).is_err() {
                    debug!(id, "Exchange was abandoned before its response arrived");
                }
            }
            return Delivery::Delivered;
        }

        let Some(Route::Subscription { ack, events }) = table.routes.get_mut(&id) else {
            warn!(id, kind = ?message.kind, "Hub message has no subscriber");
            return Delivery::Unrouted;
        };

        if let Some(ack) = ack.take() {
            if ack.send(message).is_err() {
                debug!(id, "Subscriber stopped waiting for its result");
            }
            return Delivery::Delivered;
        }

        match events.try_send(message) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(id, "Subscription queue full, dropping event");
                Delivery::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(id, "Subscriber went away, removing route");
                table.routes.remove(&id);
                Delivery::Unrouted
            }
        }
    }

    /// Close the router and drop every registered destination.
    ///
    /// Waiting exchanges observe a closed channel and every subscription stream
    /// ends. Later registrations fail with `HassError::SessionClosed`.
    pub async fn close(&self) {
        let mut table = self.table.lock().await;
        table.closed = true;
        let dropped = table.routes.len();
        table.routes.clear();
        if dropped > 0 {
            debug!(dropped, "Released outstanding exchanges on teardown");
        }
    }

    /// Whether the router was closed
    #[cfg(test)]
    pub(crate) async fn is_closed(&self) -> bool {
        self.table.lock().await.closed
    }
}

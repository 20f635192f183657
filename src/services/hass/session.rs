use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::{
    AuthMessage, ClientCommand, HassError, MessageType, ServerMessage,
    router::{IdAllocator, Router},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Interval between heartbeat pings
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(45);

/// Tunables of the session loops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Time between two pings
    pub heartbeat_interval: Duration,

    /// Longest time a ping may stay unanswered before the session is declared
    /// dead. `None` only logs pongs and never enforces liveness.
    pub liveness_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: HEARTBEAT_INTERVAL,
            liveness_timeout: None,
        }
    }
}

/// Write half of the connection, shared by the heartbeat loop and command senders.
///
/// Request IDs are allocated while the sink is held, so they reach the wire in
/// increasing order no matter how many tasks send at once.
#[derive(Clone)]
struct Outbound {
    sink: Arc<Mutex<WsSink>>,
    ids: Arc<IdAllocator>,
    router: Arc<Router>,
}

impl Outbound {
    /// Tag `command` with the next request ID and write it.
    ///
    /// `register` runs with the ID before anything is written, so an answer can
    /// never beat its route into the table. The route is dropped again when the
    /// write fails.
    async fn send_sequenced<R, F, Fut>(
        &self,
        command: ClientCommand,
        register: F,
    ) -> Result<(u64, R), HassError>
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = Result<R, HassError>>,
    {
        let mut sink = self.sink.lock().await;
        let id = self.ids.next();
        let registered = register(id).await?;

        let command = command.with_id(id);
        debug!(id, kind = ?command.kind, "Sending command to Home Assistant");

        let written = match serde_json::to_string(&command) {
            Ok(text) => sink.send(Message::text(text)).await.map_err(HassError::from),
            Err(e) => Err(e.into()),
        };
        drop(sink);

        if let Err(e) = written {
            self.router.remove(id).await;
            return Err(e);
        }
        Ok((id, registered))
    }

    async fn close(&self) {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "goodbye".into(),
        };

        match self.sink.lock().await.send(Message::Close(Some(frame))).await {
            Ok(()) => info!("Closed Home Assistant websocket connection"),
            Err(e) => error!(error = %e, "Home Assistant websocket close failed"),
        }
    }
}

/// Oldest ping still waiting for its pong
#[derive(Default)]
struct Liveness {
    outstanding: Mutex<Option<(u64, Instant)>>,
}

impl Liveness {
    async fn ping_sent(&self, id: u64) {
        let mut outstanding = self.outstanding.lock().await;
        if outstanding.is_none() {
            *outstanding = Some((id, Instant::now()));
        }
    }

    async fn pong_received(&self, id: u64) {
        let mut outstanding = self.outstanding.lock().await;
        let current = *outstanding;
        if current.is_some_and(|(ping_id, _)| ping_id <= id) {
            *outstanding = None;
        }
    }

    async fn overdue(&self, timeout: Duration) -> Option<u64> {
        let outstanding = *self.outstanding.lock().await;
        outstanding
            .filter(|(_, sent_at)| sent_at.elapsed() > timeout)
            .map(|(id, _)| id)
    }
}

/// Shared failure and shutdown state of one session.
///
/// The first caller of `fail` or `stop` wins: the router is drained, both loops
/// are told to exit, and a failure is pushed to the error channel exactly once.
struct Teardown {
    fired: AtomicBool,
    router: Arc<Router>,
    shutdown: watch::Sender<bool>,
    errors: mpsc::Sender<HassError>,
}

impl Teardown {
    async fn fail(&self, err: HassError) {
        if self.fired.swap(true, Ordering::SeqCst) {
            debug!(error = %err, "Session already torn down");
            return;
        }

        error!(error = %err, "Home Assistant session failed");

        // Queued before the drain ends any subscription stream, so a consumer
        // seeing the stream end already finds the cause.
        if self.errors.try_send(err).is_err() {
            warn!("Session error channel unavailable");
        }

        self.release().await;
    }

    async fn stop(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }

        self.release().await;
        true
    }

    async fn release(&self) {
        self.router.close().await;
        self.shutdown.send_replace(true);
    }

    fn is_down(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

/// The single authenticated websocket connection to the hub.
///
/// Owns the receive loop (the only reader of the socket), the heartbeat loop,
/// the request ID counter and the correlation table.
pub struct Session {
    outbound: Outbound,
    router: Arc<Router>,
    teardown: Arc<Teardown>,
    ha_version: Option<String>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Open the websocket, authenticate, and start the session loops.
    ///
    /// Transport failures detected later by the loops are pushed once onto
    /// `errors`.
    ///
    /// # Errors
    /// Returns `HassError::Transport` if the socket cannot be opened,
    /// `HassError::Auth` if the token is rejected, and `HassError::Protocol` if
    /// the hub deviates from the `auth_required` → `auth` → `auth_ok` sequence.
    #[instrument(skip(token, errors), fields(endpoint = %endpoint))]
    pub async fn connect(
        endpoint: &Url,
        token: &str,
        options: SessionOptions,
        errors: mpsc::Sender<HassError>,
    ) -> Result<Self, HassError> {
        let (mut ws, _) = connect_async(endpoint.as_str()).await?;

        let ha_version = match handshake(&mut ws, token).await {
            Ok(version) => version,
            Err(e) => {
                if let Err(close_err) = ws.close(None).await {
                    debug!(error = %close_err, "Closing rejected connection failed");
                }
                return Err(e);
            }
        };

        info!(
            version = ha_version.as_deref().unwrap_or("unknown"),
            "Home Assistant connected"
        );

        let (sink, source) = ws.split();
        let router = Arc::new(Router::new());
        let outbound = Outbound {
            sink: Arc::new(Mutex::new(sink)),
            ids: Arc::new(IdAllocator::default()),
            router: Arc::clone(&router),
        };
        let (shutdown, _) = watch::channel(false);
        let teardown = Arc::new(Teardown {
            fired: AtomicBool::new(false),
            router: Arc::clone(&router),
            shutdown,
            errors,
        });
        let liveness = Arc::new(Liveness::default());

        let heartbeat = tokio::spawn(heartbeat_loop(
            outbound.clone(),
            Arc::clone(&teardown),
            Arc::clone(&liveness),
            options,
        ));
        let receiver = tokio::spawn(receive_loop(
            source,
            Arc::clone(&router),
            Arc::clone(&teardown),
            liveness,
        ));

        Ok(Self {
            outbound,
            router,
            teardown,
            ha_version,
            tasks: vec![heartbeat, receiver],
        })
    }

    /// Version reported by the hub during the handshake
    pub fn ha_version(&self) -> Option<&str> {
        self.ha_version.as_deref()
    }

    /// Whether the session has failed or been closed
    pub fn is_closed(&self) -> bool {
        self.teardown.is_down()
    }

    pub(super) fn router(&self) -> &Router {
        &self.router
    }

    /// Write `command` under the next request ID, registering its route first.
    ///
    /// A transport failure while writing tears the session down.
    pub(super) async fn send_sequenced<R, F, Fut>(
        &self,
        command: ClientCommand,
        register: F,
    ) -> Result<(u64, R), HassError>
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = Result<R, HassError>>,
    {
        if self.is_closed() {
            return Err(HassError::SessionClosed);
        }

        match self.outbound.send_sequenced(command, register).await {
            Err(HassError::Transport(reason)) => {
                self.teardown
                    .fail(HassError::Transport(reason.clone()))
                    .await;
                Err(HassError::Transport(reason))
            }
            other => other,
        }
    }

    /// Release the connection with a normal-closure frame.
    ///
    /// Outstanding exchanges are released with `SessionClosed`. Errors while
    /// closing are logged, never returned.
    pub async fn close(&self) {
        if self.teardown.stop().await {
            self.outbound.close().await;
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn handshake(ws: &mut WsStream, token: &str) -> Result<Option<String>, HassError> {
    let first = read_message(ws).await?;
    if first.kind != MessageType::AuthRequired {
        return Err(HassError::Protocol(format!(
            "expected auth_required as first message, got {:?}",
            first.kind
        )));
    }

    let auth = serde_json::to_string(&AuthMessage::new(token))?;
    ws.send(Message::text(auth)).await?;

    let reply = read_message(ws).await?;
    match reply.kind {
        MessageType::AuthOk => Ok(reply.ha_version.or(first.ha_version)),
        MessageType::AuthInvalid => Err(HassError::Auth(reply.message.unwrap_or_default())),
        other => Err(HassError::Protocol(format!(
            "expected auth_ok after auth, got {other:?}"
        ))),
    }
}

async fn read_message(ws: &mut WsStream) -> Result<ServerMessage, HassError> {
    loop {
        let frame = ws.next().await;
        if let Some(message) = decode_frame(frame)? {
            return Ok(message);
        }
    }
}

/// Turn one websocket frame into a hub message.
///
/// `Ok(None)` means the frame carried nothing for us (control frames).
fn decode_frame(
    frame: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
) -> Result<Option<ServerMessage>, HassError> {
    match frame {
        None => Err(HassError::Transport("connection closed".to_string())),
        Some(Err(e)) => Err(e.into()),
        Some(Ok(Message::Text(text))) => {
            debug!(message = %text.as_str(), "Read message from Home Assistant");
            serde_json::from_str(text.as_str())
                .map(Some)
                .map_err(|e| HassError::Protocol(format!("undecodable message: {e}")))
        }
        Some(Ok(Message::Close(frame))) => Err(HassError::Transport(format!(
            "closed by hub: {}",
            frame.map_or_else(|| "no reason".to_string(), |f| f.reason.to_string())
        ))),
        Some(Ok(Message::Binary(_))) => {
            warn!("Ignoring binary websocket frame");
            Ok(None)
        }
        Some(Ok(_)) => Ok(None),
    }
}

async fn receive_loop(
    mut source: WsSource,
    router: Arc<Router>,
    teardown: Arc<Teardown>,
    liveness: Arc<Liveness>,
) {
    let mut shutdown = teardown.shutdown.subscribe();

    loop {
        let frame = tokio::select! {
            _ = stopped(&mut shutdown) => return,
            frame = source.next() => frame,
        };

        let message = match decode_frame(frame) {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(e) => {
                teardown.fail(e).await;
                return;
            }
        };

        if message.kind == MessageType::Pong {
            debug!(id = ?message.id, "Pong received");
            if let Some(id) = message.id {
                liveness.pong_received(id).await;
            }
            continue;
        }

        if message.is_id_reuse() {
            teardown
                .fail(HassError::Protocol(format!(
                    "hub reported request ID reuse for {:?}",
                    message.id
                )))
                .await;
            return;
        }

        router.dispatch(message).await;
    }
}

async fn heartbeat_loop(
    outbound: Outbound,
    teardown: Arc<Teardown>,
    liveness: Arc<Liveness>,
    options: SessionOptions,
) {
    let mut shutdown = teardown.shutdown.subscribe();

    let mut ticker = time::interval(options.heartbeat_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let check_every = options
        .liveness_timeout
        .map_or(options.heartbeat_interval, |timeout| timeout / 2);
    let mut watchdog = time::interval(check_every.max(Duration::from_millis(1)));
    watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stopped(&mut shutdown) => return,

            _ = ticker.tick() => {
                let liveness = &liveness;
                let sent = outbound
                    .send_sequenced(ClientCommand::ping(), |id| async move {
                        liveness.ping_sent(id).await;
                        Ok(())
                    })
                    .await;
                match sent {
                    Ok((id, ())) => debug!(id, "Ping message sent"),
                    Err(e) => {
                        teardown.fail(e).await;
                        return;
                    }
                }
            }

            _ = watchdog.tick(), if options.liveness_timeout.is_some() => {
                let Some(timeout) = options.liveness_timeout else { continue };
                if let Some(id) = liveness.overdue(timeout).await {
                    teardown
                        .fail(HassError::Transport(format!(
                            "ping {id} unanswered for {timeout:?}"
                        )))
                        .await;
                    return;
                }
            }
        }
    }
}

/// Resolves once the shutdown flag is raised. The borrow of the flag is
/// released before returning.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|down| *down).await.is_err() {
        debug!("Shutdown flag dropped");
    }
}

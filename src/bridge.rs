use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::{ArtworkDir, BridgeConfig, HubEndpoints};
use crate::core::Result;
use crate::services::common::Property;
use crate::services::hass::{
    Event, EventSubscription, HassClient, HassController, HassError, STATE_CHANGED, StateChanged,
    fetch_states,
};
use crate::services::mpris::{ArtworkCache, MprisServer, PlayerProperties, Projector};

/// Upper bound on connecting to the hub over HTTP
pub const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on one HTTP request, body included. Projection waits on artwork
/// downloads, so this also bounds how long a stalled download holds it up.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Run the bridge until a signal arrives or the hub session dies.
///
/// # Errors
/// Returns the configuration, connection, or bus error that ended the run.
pub async fn run(config: BridgeConfig) -> Result<()> {
    let endpoints = config.validate()?;
    let artwork_dir = ArtworkDir::create()?;
    let http = reqwest::Client::builder()
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(HassError::from)?;

    let (errors_tx, mut errors) = mpsc::channel(1);
    let client = HassClient::connect(
        &endpoints.websocket,
        config.token(),
        config.session_options(),
        errors_tx,
    )
    .await?;

    let artwork = ArtworkCache::new(
        artwork_dir.path().to_path_buf(),
        endpoints.base.clone(),
        http.clone(),
    );
    let projector = Projector::new(artwork);

    let result = serve(&client, &projector, &http, &endpoints, config.token(), &mut errors).await;

    client.close().await;
    drop(artwork_dir);

    if result.is_ok() {
        info!("Bridge stopped");
    }
    result
}

async fn serve(
    client: &HassClient,
    projector: &Projector,
    http: &reqwest::Client,
    endpoints: &HubEndpoints,
    token: &str,
    errors: &mut mpsc::Receiver<HassError>,
) -> Result<()> {
    let events = start_feed(client, projector, http, endpoints, token).await?;

    let controller = HassController::new(client.clone(), projector.entity());
    let server = Arc::new(MprisServer::start(Arc::new(controller)).await?);
    let publisher = spawn_publisher(Arc::clone(&server), projector.properties());
    info!(bus_name = server.name(), "Bridging state changes");

    let result = event_loop(projector, events, errors).await;

    publisher.abort();
    if let Err(e) = server.shutdown().await {
        warn!(error = %e, "MPRIS shutdown failed");
    }

    result
}

/// Subscribe to state changes, then seed the projector from the bulk fetch.
///
/// Changes racing the fetch wait in the subscription queue and are applied on
/// top of the seed.
pub(crate) async fn start_feed(
    client: &HassClient,
    projector: &Projector,
    http: &reqwest::Client,
    endpoints: &HubEndpoints,
    token: &str,
) -> Result<EventSubscription> {
    let events = client.subscribe(STATE_CHANGED).await?;
    seed(projector, http, endpoints, token).await?;
    Ok(events)
}

#[instrument(skip_all)]
async fn seed(
    projector: &Projector,
    http: &reqwest::Client,
    endpoints: &HubEndpoints,
    token: &str,
) -> Result<()> {
    let states = fetch_states(http, &endpoints.base, token).await?;

    let mut accepted = 0_usize;
    for state in &states {
        if projector.handle(state).await {
            accepted += 1;
        }
    }

    info!(total = states.len(), accepted, "Seeded initial state");
    Ok(())
}

fn spawn_publisher(
    server: Arc<MprisServer>,
    properties: Property<PlayerProperties>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut updates = properties.watch();
        while let Some(next) = updates.next().await {
            if let Err(e) = server.publish(next).await {
                warn!(error = %e, "Cannot publish MPRIS properties");
            }
        }
    })
}

async fn event_loop(
    projector: &Projector,
    mut events: EventSubscription,
    errors: &mut mpsc::Receiver<HassError>,
) -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT");
                return Ok(());
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
                return Ok(());
            }
            Some(error) = errors.recv() => {
                return Err(error.into());
            }
            event = events.next() => match event {
                Some(event) => apply_event(projector, &event).await,
                None => {
                    let error = errors.try_recv().unwrap_or(HassError::SessionClosed);
                    return Err(error.into());
                }
            },
        }
    }
}

pub(crate) async fn apply_event(projector: &Projector, event: &Event) {
    let change = match StateChanged::try_from(event) {
        Ok(change) => change,
        Err(e) => {
            warn!(error = %e, "Cannot decode state change");
            return;
        }
    };

    match change.new_state {
        Some(state) => {
            projector.handle(&state).await;
        }
        None => debug!(entity_id = %change.entity_id, "Entity removed"),
    }
}

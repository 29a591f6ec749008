use std::{collections::HashMap, io::ErrorKind, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use landroid_common::{intent_channel, intent_filter, RuntimeConfig, SyncError};
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions};
use serde::Serialize;
use tokio::{net::TcpListener, sync::mpsc};
use tracing::{debug, info, warn};

use crate::{
    device::MowerDevice,
    registry::HttpRegistry,
    transport::{MqttTransport, Transport},
};

const INBOUND_QUEUE: usize = 64;

#[derive(Clone)]
struct AppState {
    device: MowerDevice,
}

#[derive(Clone)]
struct ConfigStore {
    path: Arc<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = ConfigStore::new();
    let mut runtime = store.load().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from {}: {err:#}", store.path.display());
        RuntimeConfig::default()
    });
    apply_env_overrides(&mut runtime);
    runtime.sanitize();

    if runtime.serial_number.is_empty() {
        anyhow::bail!("no mower serial configured, set serial_number or LANDROID_SERIAL");
    }
    let serial = runtime.serial_number.clone();

    let mut mqtt_options = MqttOptions::new(
        runtime.network.client_id.clone(),
        runtime.network.mqtt_host.clone(),
        runtime.network.mqtt_port,
    );
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    if !runtime.network.mqtt_user.is_empty() {
        mqtt_options.set_credentials(
            runtime.network.mqtt_user.clone(),
            runtime.network.mqtt_pass.clone(),
        );
    }
    let (client, eventloop) = AsyncClient::new(mqtt_options, 256);
    let transport: Arc<dyn Transport> = Arc::new(MqttTransport::new(client));
    let registry = Arc::new(
        HttpRegistry::new(&runtime.registry).context("failed to build registry client")?,
    );

    let device = MowerDevice::attach(
        &serial,
        runtime.mower.clone(),
        runtime.tz(),
        Arc::clone(&transport),
        registry,
    )
    .await
    .with_context(|| format!("failed to attach mower {serial}"))?;

    transport
        .subscribe(&intent_filter(&serial))
        .await
        .context("failed to subscribe to intent topics")?;
    spawn_mqtt_loop(device.clone(), eventloop);

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/intent", post(handle_post_intent))
        .with_state(AppState {
            device: device.clone(),
        });

    let addr = SocketAddr::from(([0, 0, 0, 0], runtime.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind bridge server at {addr}"))?;

    info!("bridge for {serial} listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    device.stop().await;
    info!("bridge stopped");
    Ok(())
}

fn apply_env_overrides(runtime: &mut RuntimeConfig) {
    if let Ok(host) = std::env::var("MQTT_HOST") {
        runtime.network.mqtt_host = host;
    }
    if let Some(port) = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
    {
        runtime.network.mqtt_port = port;
    }
    if let Ok(user) = std::env::var("MQTT_USER") {
        runtime.network.mqtt_user = user;
    }
    if let Ok(pass) = std::env::var("MQTT_PASS") {
        runtime.network.mqtt_pass = pass;
    }
    if let Ok(serial) = std::env::var("LANDROID_SERIAL") {
        runtime.serial_number = serial;
    }
    if let Ok(token) = std::env::var("LANDROID_API_TOKEN") {
        runtime.registry.access_token = token;
    }
    if let Some(port) = std::env::var("BRIDGE_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
    {
        runtime.http_port = port;
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// Inbound messages are handed to one worker so they keep their order while the event
/// loop keeps draining outbound publishes.
fn spawn_mqtt_loop(device: MowerDevice, mut eventloop: EventLoop) {
    let (inbound, mut queue) = mpsc::channel::<(String, Vec<u8>)>(INBOUND_QUEUE);

    let worker = device.clone();
    tokio::spawn(async move {
        while let Some((topic, payload)) = queue.recv().await {
            if let Err(err) = handle_mqtt_message(&worker, &topic, payload).await {
                warn!("mqtt message handling error: {err:#}");
            }
        }
    });

    tokio::spawn(async move {
        let mut connected = false;
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) = inbound.try_send((message.topic, message.payload.to_vec())) {
                        warn!("dropping inbound mqtt message: {err}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    connected = true;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    if std::mem::take(&mut connected) {
                        let device = device.clone();
                        tokio::spawn(async move { device.mark_offline().await });
                    }
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

async fn handle_mqtt_message(
    device: &MowerDevice,
    topic: &str,
    payload: Vec<u8>,
) -> anyhow::Result<()> {
    let message = String::from_utf8(payload).context("non utf8 mqtt payload")?;

    if topic == device.telemetry_topic() {
        device
            .on_telemetry(&message)
            .await
            .context("telemetry rejected")?;
    } else if let Some(channel) = intent_channel(device.serial(), topic) {
        if !device
            .on_user_intent(channel, &message)
            .await
            .with_context(|| format!("intent {channel} rejected"))?
        {
            debug!("ignoring unrecognized intent {channel}");
        }
    } else {
        debug!("ignoring message on {topic}");
    }
    Ok(())
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.device.snapshot().await)
}

async fn handle_post_intent(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(channel) = params.get("channel") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'channel' parameter");
    };
    let value = params.get("value").map(String::as_str).unwrap_or_default();

    let result = state.device.on_user_intent(channel, value).await;
    match result {
        Ok(true) => handle_get_status(State(state)).await.into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, "Unknown intent channel"),
        Err(err) => error_response(status_for(&err), &err.to_string()),
    }
}

fn status_for(err: &SyncError) -> StatusCode {
    match err {
        SyncError::MalformedField { .. } | SyncError::OutOfRange { .. } => StatusCode::BAD_REQUEST,
        SyncError::PreconditionFailed(_) => StatusCode::CONFLICT,
        SyncError::TransportFailure(_) | SyncError::RegistryFailure(_) => StatusCode::BAD_GATEWAY,
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

impl ConfigStore {
    fn new() -> Self {
        let path = std::env::var("LANDROID_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.landroid/runtime.json"));

        Self {
            path: Arc::new(path),
        }
    }

    async fn load(&self) -> anyhow::Result<RuntimeConfig> {
        match tokio::fs::read(self.path.as_ref()).await {
            Ok(raw) => Ok(serde_json::from_slice::<RuntimeConfig>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }
}

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use landroid_common::{
    snapshot_topic, state_topic, DeviceSnapshot, DeviceState, EngineAction, Intent, MowerConfig,
    MowerEngine, StateChange, SyncError, POLL_PAYLOAD,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    registry::DeviceRegistry,
    scheduler::{ScheduledWork, Scheduler},
    transport::Transport,
};

/// Handle to one attached mower. Cheap to clone.
#[derive(Clone)]
pub struct MowerDevice {
    inner: Arc<DeviceInner>,
}

struct DeviceInner {
    serial: String,
    command_in: String,
    command_out: String,
    config: MowerConfig,
    engine: Mutex<MowerEngine>,
    transport: Arc<dyn Transport>,
    registry: Arc<dyn DeviceRegistry>,
    attached: AtomicBool,
    scheduler: Mutex<Option<Scheduler>>,
}

impl MowerDevice {
    /// Bootstraps from the registry, subscribes to the device telemetry topic, asks for a
    /// fresh status and starts the timers.
    pub async fn attach(
        serial: &str,
        config: MowerConfig,
        timezone: Tz,
        transport: Arc<dyn Transport>,
        registry: Arc<dyn DeviceRegistry>,
    ) -> Result<Self, SyncError> {
        let registered = registry.fetch_device(serial).await?;
        let mut engine = MowerEngine::new(
            config.clone(),
            DeviceState::new(serial, registered.capabilities),
            timezone,
        );
        engine.record_liveness(registered.online, Utc::now());

        match registry.fetch_last_known_status(serial).await {
            Ok(status) => {
                let outcome = engine.apply_telemetry(&status);
                for err in &outcome.errors {
                    warn!(serial, error = %err, "last known status field skipped");
                }
            }
            Err(err) => warn!(serial, error = %err, "no last known status"),
        }

        let device = Self {
            inner: Arc::new(DeviceInner {
                serial: serial.to_string(),
                command_in: registered.command_in,
                command_out: registered.command_out,
                config,
                engine: Mutex::new(engine),
                transport,
                registry,
                attached: AtomicBool::new(false),
                scheduler: Mutex::new(None),
            }),
        };

        device.inner.transport.subscribe(&device.inner.command_out).await?;
        if let Err(err) = device.inner.send_command(POLL_PAYLOAD.to_string()).await {
            warn!(serial, error = %err, "initial poll failed");
        }
        device.start().await;
        device.inner.publish_snapshot().await;

        info!(
            serial,
            online = registered.online,
            capabilities = ?registered.capabilities,
            "mower attached"
        );
        Ok(device)
    }

    pub fn serial(&self) -> &str {
        &self.inner.serial
    }

    /// Topic the device pushes telemetry to.
    pub fn telemetry_topic(&self) -> &str {
        &self.inner.command_out
    }

    pub async fn snapshot(&self) -> DeviceSnapshot {
        self.inner.engine.lock().await.snapshot()
    }

    pub async fn on_telemetry(&self, payload: &str) -> Result<(), SyncError> {
        if !self.inner.is_attached() {
            debug!(serial = %self.inner.serial, "telemetry after detach ignored");
            return Ok(());
        }

        let outcome = self.inner.engine.lock().await.on_telemetry(payload)?;
        for err in &outcome.errors {
            warn!(serial = %self.inner.serial, error = %err, "telemetry field skipped");
        }
        self.inner.publish_changes(&outcome.changes).await;

        for action in outcome.actions {
            let EngineAction::Publish(payload) = action else {
                continue;
            };
            if let Err(err) = self.inner.send_command(payload).await {
                warn!(serial = %self.inner.serial, error = %err, "zone meter rollback not delivered");
                if let Some(saved) = outcome.restored_zone_meters {
                    self.inner
                        .engine
                        .lock()
                        .await
                        .reinstate_zone_override(saved);
                }
            }
        }
        Ok(())
    }

    /// Returns `Ok(false)` for identifiers this device does not understand.
    pub async fn on_user_intent(&self, channel: &str, value: &str) -> Result<bool, SyncError> {
        let Some(intent) = Intent::parse(channel, value)? else {
            debug!(serial = %self.inner.serial, channel, "intent not recognized");
            return Ok(false);
        };
        if intent == Intent::Refresh {
            return Ok(true);
        }

        let Some(cancel) = self.cancel_token().await else {
            return Err(SyncError::precondition(format!(
                "device {} is detached",
                self.inner.serial
            )));
        };

        let zone_start = matches!(intent, Intent::StartZone(_));
        let actions = self.inner.engine.lock().await.handle_intent(&intent)?;
        let mut override_sent = false;
        for action in actions {
            match action {
                EngineAction::Publish(payload) => {
                    if let Err(err) = self.inner.send_command(payload).await {
                        if zone_start {
                            self.inner.abort_zone_start(override_sent).await;
                        }
                        return Err(err);
                    }
                    override_sent = zone_start;
                }
                EngineAction::Delay(ms) => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            self.inner.abort_zone_start(override_sent).await;
                            return Err(SyncError::precondition("device detached during command sequence"));
                        }
                        () = tokio::time::sleep(Duration::from_millis(ms)) => {}
                    }
                }
            }
        }

        self.inner.publish_snapshot().await;
        Ok(true)
    }

    pub async fn start(&self) {
        let mut scheduler = self.inner.scheduler.lock().await;
        if scheduler.is_some() {
            return;
        }
        self.inner.attached.store(true, Ordering::SeqCst);
        let work: Arc<dyn ScheduledWork> = self.inner.clone();
        *scheduler = Some(Scheduler::start(&self.inner.config, work));
    }

    pub async fn stop(&self) {
        self.inner.attached.store(false, Ordering::SeqCst);
        if let Some(mut scheduler) = self.inner.scheduler.lock().await.take() {
            scheduler.stop();
        }
    }

    /// The broker connection dropped.
    pub async fn mark_offline(&self) {
        let changes = self.inner.engine.lock().await.mark_offline();
        debug!(serial = %self.inner.serial, "marked offline");
        self.inner.publish_changes(&changes).await;
    }

    async fn cancel_token(&self) -> Option<tokio_util::sync::CancellationToken> {
        self.inner.scheduler.lock().await.as_ref().map(Scheduler::token)
    }
}

impl DeviceInner {
    async fn send_command(&self, payload: String) -> Result<(), SyncError> {
        debug!(serial = %self.serial, %payload, "command out");
        self.transport.publish(&self.command_in, payload).await
    }

    /// Rolls back a zone start that did not run to the end. When the override already
    /// reached the device the saved meters are sent back too.
    async fn abort_zone_start(&self, override_sent: bool) {
        let Some((changes, payload)) = self.engine.lock().await.abort_zone_start() else {
            return;
        };
        warn!(serial = %self.serial, "zone start aborted, saved zone meters restored");
        if override_sent {
            if let Err(err) = self.send_command(payload).await {
                warn!(serial = %self.serial, error = %err, "zone meter rollback not delivered");
            }
        }
        self.publish_changes(&changes).await;
    }

    async fn publish_changes(&self, changes: &[StateChange]) {
        for change in changes {
            let payload = match serde_json::to_string(&change.value) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(field = %change.field, error = %err, "state change serialization failed");
                    continue;
                }
            };
            if let Err(err) = self
                .transport
                .publish(&state_topic(&self.serial, &change.field), payload)
                .await
            {
                warn!(field = %change.field, error = %err, "state change publish failed");
            }
        }
    }

    async fn publish_snapshot(&self) {
        let snapshot = self.engine.lock().await.snapshot();
        match serde_json::to_string(&snapshot) {
            Ok(payload) => {
                if let Err(err) = self
                    .transport
                    .publish(&snapshot_topic(&self.serial), payload)
                    .await
                {
                    warn!(serial = %self.serial, error = %err, "snapshot publish failed");
                }
            }
            Err(err) => warn!(serial = %self.serial, error = %err, "snapshot serialization failed"),
        }
    }
}

#[async_trait]
impl ScheduledWork for DeviceInner {
    fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    async fn refresh_liveness(&self) -> Result<(), SyncError> {
        let online = self.registry.fetch_online_status(&self.serial).await?;
        if !self.is_attached() {
            return Ok(());
        }
        let changes = self.engine.lock().await.record_liveness(online, Utc::now());
        self.publish_changes(&changes).await;
        Ok(())
    }

    async fn poll(&self) -> Result<(), SyncError> {
        self.send_command(POLL_PAYLOAD.to_string()).await
    }
}

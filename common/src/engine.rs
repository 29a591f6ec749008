use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;

use crate::{
    command::Command,
    config::MowerConfig,
    error::SyncError,
    intent::Intent,
    state::{DeviceState, ZONE_COUNT},
    telemetry::{FieldValue, StateChange, TelemetryDecoder},
    types::{ActionCode, DeviceSnapshot},
    zone_restore::ZoneRestore,
};

/// Work the host carries out, in order, after the engine has committed a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAction {
    /// Publish this payload to the device command topic.
    Publish(String),
    Delay(u64),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryOutcome {
    pub changes: Vec<StateChange>,
    pub errors: Vec<SyncError>,
    pub actions: Vec<EngineAction>,
    /// Meters the overlay put back, set when `actions` carries the rollback publish.
    pub restored_zone_meters: Option<[u32; ZONE_COUNT]>,
}

/// Single writer for one device: decoder, dispatcher, encoder and zone overlay behind
/// one `&mut self`.
#[derive(Debug, Clone)]
pub struct MowerEngine {
    pub config: MowerConfig,
    state: DeviceState,
    overlay: ZoneRestore,
    decoder: TelemetryDecoder,
}

impl MowerEngine {
    pub fn new(config: MowerConfig, state: DeviceState, timezone: Tz) -> Self {
        Self {
            config,
            state,
            overlay: ZoneRestore::Idle,
            decoder: TelemetryDecoder::new(timezone),
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn overlay(&self) -> ZoneRestore {
        self.overlay
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        self.state.snapshot(self.overlay.is_active())
    }

    pub fn on_telemetry(&mut self, payload: &str) -> Result<TelemetryOutcome, SyncError> {
        if payload.len() > self.config.max_payload_bytes {
            return Err(SyncError::malformed(
                "message",
                format!("{} bytes exceeds the {} byte limit", payload.len(), self.config.max_payload_bytes),
            ));
        }
        let message: Value = serde_json::from_str(payload)
            .map_err(|err| SyncError::malformed("message", err.to_string()))?;

        let came_online = !self.state.online();
        self.state.mark_online();
        let mut outcome = self.apply_telemetry(&message);
        if came_online {
            outcome
                .changes
                .insert(0, StateChange::new("online", FieldValue::Bool(true)));
        }
        Ok(outcome)
    }

    pub fn apply_telemetry(&mut self, message: &Value) -> TelemetryOutcome {
        let report = self
            .decoder
            .with_zone_meters_locked(self.overlay.is_active())
            .decode(&mut self.state, message);

        let mut outcome = TelemetryOutcome {
            changes: report.changes,
            errors: report.errors,
            ..TelemetryOutcome::default()
        };

        // The decoder has already committed this status.
        let Some(status) = report.status else {
            return outcome;
        };
        let saved = self.overlay.saved_zone_meters();
        if !self.overlay.on_status(&mut self.state, status) {
            return outcome;
        }

        outcome.changes.extend(zone_meter_changes(&self.state));
        match Command::ZoneMeters.encode(&self.state) {
            Ok(payload) => {
                outcome.actions.push(EngineAction::Publish(payload));
                outcome.restored_zone_meters = saved;
            }
            Err(err) => outcome.errors.push(err),
        }
        outcome
    }

    /// Puts the overlay back after its rollback publish was lost, so the next status
    /// outside the start-up sequence retries it.
    pub fn reinstate_zone_override(&mut self, saved: [u32; ZONE_COUNT]) {
        if !self.overlay.is_active() {
            self.overlay = ZoneRestore::Overridden { saved };
        }
    }

    /// Undoes a zone start whose command sequence did not complete: the saved meters are
    /// put back and the overlay returns to `Idle`. Returns the meter changes and the payload
    /// that restores the device, or `None` when no zone start is held.
    pub fn abort_zone_start(&mut self) -> Option<(Vec<StateChange>, String)> {
        let saved = self.overlay.saved_zone_meters()?;
        self.state.set_zone_meters(saved);
        self.overlay = ZoneRestore::Idle;
        let payload = Command::ZoneMeters.encode(&self.state).ok()?;
        Some((zone_meter_changes(&self.state), payload))
    }

    /// Validates and applies one intent. Either everything is committed and the returned
    /// actions describe what to send, or nothing changed.
    pub fn handle_intent(&mut self, intent: &Intent) -> Result<Vec<EngineAction>, SyncError> {
        if *intent == Intent::Refresh {
            return Ok(Vec::new());
        }
        if !self.state.online() {
            return Err(SyncError::precondition(format!(
                "device {} is offline",
                self.state.serial_number()
            )));
        }

        let mut staged = self.state.clone();
        let mut overlay = self.overlay;

        let actions = match *intent {
            Intent::Refresh => Vec::new(),
            Intent::MultiZoneEnable(enable) => {
                self.ensure_zone_meters_writable()?;
                staged.set_multi_zone_enable(enable);
                vec![publish(Command::ZoneMeters, &staged)?]
            }
            Intent::StartZone(zone) => {
                overlay.begin(&mut staged, zone)?;
                vec![
                    publish(Command::ZoneMeters, &staged)?,
                    EngineAction::Delay(self.config.zone_start_delay_ms),
                    publish(Command::Action(ActionCode::Start), &staged)?,
                ]
            }
            Intent::ZoneMeter { zone, meters } => {
                self.ensure_zone_meters_writable()?;
                staged.set_zone_meter(zone, meters)?;
                vec![publish(Command::ZoneMeters, &staged)?]
            }
            Intent::Allocation { index, zone } => {
                staged.set_allocation(index, zone)?;
                vec![publish(Command::Allocations, &staged)?]
            }
            Intent::Schedule { day, edit } => {
                staged.update_scheduled_day(day, |scheduled| edit.apply(scheduled))?;
                vec![publish(Command::Schedule, &staged)?]
            }
            Intent::Enable(enable) => {
                staged.set_enable(enable);
                vec![publish(Command::Schedule, &staged)?]
            }
            Intent::TimeExtension(extension) => {
                staged.set_time_extension(extension)?;
                vec![publish(Command::Schedule, &staged)?]
            }
            Intent::Action(action) => {
                if action.needs_lock_capability() {
                    staged.set_locked(action == ActionCode::Lock)?;
                }
                vec![publish(Command::Action(action), &staged)?]
            }
            Intent::RainDelay(minutes) => {
                staged.set_rain_delay_minutes(minutes)?;
                let minutes = staged.rain_delay_minutes().unwrap_or_default();
                vec![publish(Command::RainDelay(minutes), &staged)?]
            }
            Intent::Lock(locked) => {
                staged.set_locked(locked)?;
                let action = if locked {
                    ActionCode::Lock
                } else {
                    ActionCode::Unlock
                };
                vec![publish(Command::Action(action), &staged)?]
            }
            Intent::Poll => vec![publish(Command::Poll, &staged)?],
        };

        self.state = staged;
        self.overlay = overlay;
        Ok(actions)
    }

    pub fn record_liveness(&mut self, online: bool, checked_at: DateTime<Utc>) -> Vec<StateChange> {
        self.state.set_online(online, checked_at);
        vec![
            StateChange::new("online", FieldValue::Bool(online)),
            StateChange::new("online/last-check", FieldValue::Int(checked_at.timestamp())),
        ]
    }

    /// The bridge lost its connection. Only `online` changes.
    pub fn mark_offline(&mut self) -> Vec<StateChange> {
        self.state.mark_offline();
        vec![StateChange::new("online", FieldValue::Bool(false))]
    }

    fn ensure_zone_meters_writable(&self) -> Result<(), SyncError> {
        if self.overlay.is_active() {
            return Err(SyncError::precondition(
                "zone meters are held by a running zone start",
            ));
        }
        Ok(())
    }
}

fn publish(command: Command, state: &DeviceState) -> Result<EngineAction, SyncError> {
    command.encode(state).map(EngineAction::Publish)
}

fn zone_meter_changes(state: &DeviceState) -> Vec<StateChange> {
    let mut changes: Vec<StateChange> = state
        .zone_meters()
        .iter()
        .enumerate()
        .map(|(zone, meters)| {
            StateChange::new(
                format!("zones/{}/meter", zone + 1),
                FieldValue::Int(i64::from(*meters)),
            )
        })
        .collect();
    changes.push(StateChange::new(
        "multizone/enable",
        FieldValue::Bool(state.multi_zone_enable()),
    ));
    changes
}

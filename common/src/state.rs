use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::SyncError,
    schedule::{DayOfWeek, ScheduledDay, WeekSchedule},
    types::{DeviceSnapshot, MowerErrorCode, MowerStatus, ScheduledDayView},
};

pub const ZONE_COUNT: usize = 4;
pub const ALLOCATION_COUNT: usize = 10;

/// Time extension value the device uses to mean "mowing disabled".
pub const TIME_EXTENSION_DISABLED: i64 = -100;
pub const MAX_TIME_EXTENSION: i64 = 100;

/// Feature flags fixed when the device is attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub lock: bool,
    #[serde(rename = "rainDelay")]
    pub rain_delay: bool,
    #[serde(rename = "multiZone")]
    pub multi_zone: bool,
}

/// Last reported live readings. `None` means the device never reported the field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Telemetry {
    pub device_time: Option<DateTime<FixedOffset>>,
    pub config_id: Option<i64>,
    pub language: Option<String>,
    pub last_command: Option<i64>,
    pub reported_serial: Option<String>,
    pub mac_address: Option<String>,
    pub firmware: Option<f64>,
    pub wifi_quality: Option<i64>,
    pub battery_temperature: Option<f64>,
    pub battery_voltage: Option<f64>,
    pub battery_level: Option<i64>,
    pub battery_charge_cycles: Option<i64>,
    pub battery_charging: Option<bool>,
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    pub yaw: Option<f64>,
    pub total_blade_time: Option<i64>,
    pub total_distance: Option<i64>,
    pub total_time: Option<i64>,
    /// Zone id resolved through the allocation table, not the raw `dat.lz` slot.
    pub last_zone: Option<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    serial_number: String,
    capabilities: Capabilities,

    online: bool,
    last_online_check: Option<DateTime<Utc>>,
    status: Option<MowerStatus>,
    error: Option<MowerErrorCode>,

    enable: bool,
    time_extension: i64,
    schedule: WeekSchedule,

    zone_meters: [u32; ZONE_COUNT],
    zone_allocations: [u8; ALLOCATION_COUNT],
    multi_zone_enable: bool,
    // Meters remembered while multizone is switched off.
    disabled_zone_meters: Option<[u32; ZONE_COUNT]>,

    // Capability gated.
    locked: Option<bool>,
    rain_delay_minutes: Option<u32>,

    telemetry: Telemetry,
}

impl DeviceState {
    pub fn new(serial_number: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            serial_number: serial_number.into(),
            capabilities,
            online: false,
            last_online_check: None,
            status: None,
            error: None,
            enable: true,
            time_extension: 0,
            schedule: WeekSchedule::default(),
            zone_meters: [0; ZONE_COUNT],
            zone_allocations: [0; ALLOCATION_COUNT],
            multi_zone_enable: false,
            disabled_zone_meters: None,
            locked: None,
            rain_delay_minutes: None,
            telemetry: Telemetry::default(),
        }
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    // Status.

    pub fn online(&self) -> bool {
        self.online
    }

    pub fn last_online_check(&self) -> Option<DateTime<Utc>> {
        self.last_online_check
    }

    pub fn set_online(&mut self, online: bool, checked_at: DateTime<Utc>) {
        self.online = online;
        self.last_online_check = Some(checked_at);
    }

    /// Marks the device unreachable without recording a registry check.
    pub fn mark_offline(&mut self) {
        self.online = false;
    }

    /// The device itself was heard from. The registry check timestamp is left alone.
    pub fn mark_online(&mut self) {
        self.online = true;
    }

    pub fn status(&self) -> Option<MowerStatus> {
        self.status
    }

    pub fn set_status_code(&mut self, code: i64) -> MowerStatus {
        let status = MowerStatus::from_code(code);
        self.status = Some(status);
        status
    }

    pub fn error(&self) -> Option<MowerErrorCode> {
        self.error
    }

    pub fn set_error_code(&mut self, code: i64) -> MowerErrorCode {
        let error = MowerErrorCode::from_code(code);
        self.error = Some(error);
        error
    }

    // Schedule.

    pub fn enable(&self) -> bool {
        self.enable
    }

    pub fn set_enable(&mut self, enable: bool) {
        self.enable = enable;
    }

    pub fn time_extension(&self) -> i64 {
        self.time_extension
    }

    /// Stores a user supplied time extension, -100..=100.
    pub fn set_time_extension(&mut self, extension: i64) -> Result<(), SyncError> {
        if !(TIME_EXTENSION_DISABLED..=MAX_TIME_EXTENSION).contains(&extension) {
            return Err(SyncError::out_of_range("time extension", extension));
        }
        self.time_extension = extension;
        Ok(())
    }

    /// Applies the device reported `sc.p`, which also carries the global enable flag.
    pub fn apply_reported_time_extension(&mut self, extension: i64) -> Result<(), SyncError> {
        if extension == TIME_EXTENSION_DISABLED {
            self.enable = false;
            return Ok(());
        }
        self.set_time_extension(extension)?;
        self.enable = true;
        Ok(())
    }

    /// Time extension as the device expects it in a schedule command.
    pub fn effective_time_extension(&self) -> i64 {
        if self.enable {
            self.time_extension
        } else {
            TIME_EXTENSION_DISABLED
        }
    }

    pub fn schedule(&self) -> &WeekSchedule {
        &self.schedule
    }

    pub fn scheduled_day(&self, day: DayOfWeek) -> &ScheduledDay {
        self.schedule.day(day)
    }

    pub fn set_scheduled_day(&mut self, day_index: usize, scheduled: ScheduledDay) -> Result<(), SyncError> {
        let day = DayOfWeek::from_index(day_index)?;
        *self.schedule.day_mut(day) = scheduled;
        Ok(())
    }

    /// Edits one day in place. The edit is discarded if it fails.
    pub fn update_scheduled_day<F>(&mut self, day: DayOfWeek, edit: F) -> Result<(), SyncError>
    where
        F: FnOnce(&mut ScheduledDay) -> Result<(), SyncError>,
    {
        let mut updated = *self.schedule.day(day);
        edit(&mut updated)?;
        *self.schedule.day_mut(day) = updated;
        Ok(())
    }

    // Zones.

    pub fn zone_meters(&self) -> [u32; ZONE_COUNT] {
        self.zone_meters
    }

    pub fn zone_meter(&self, zone: usize) -> Result<u32, SyncError> {
        self.zone_meters
            .get(zone)
            .copied()
            .ok_or_else(|| SyncError::out_of_range("zone index", zone))
    }

    pub fn set_zone_meter(&mut self, zone: usize, meters: i64) -> Result<(), SyncError> {
        if zone >= ZONE_COUNT {
            return Err(SyncError::out_of_range("zone index", zone));
        }
        let meters = u32::try_from(meters).map_err(|_| SyncError::out_of_range("zone meters", meters))?;
        self.zone_meters[zone] = meters;
        self.recompute_multi_zone_enable();
        Ok(())
    }

    pub fn set_zone_meters(&mut self, meters: [u32; ZONE_COUNT]) {
        self.zone_meters = meters;
        self.recompute_multi_zone_enable();
    }

    pub fn multi_zone_enable(&self) -> bool {
        self.multi_zone_enable
    }

    /// Switching multizone off zeroes the meters and remembers them; switching it back on
    /// restores what was remembered.
    pub fn set_multi_zone_enable(&mut self, enable: bool) {
        if enable {
            if let Some(saved) = self.disabled_zone_meters.take() {
                self.zone_meters = saved;
            }
        } else if self.zone_meters.iter().any(|meters| *meters != 0) {
            self.disabled_zone_meters = Some(self.zone_meters);
            self.zone_meters = [0; ZONE_COUNT];
        }
        self.multi_zone_enable = enable;
    }

    fn recompute_multi_zone_enable(&mut self) {
        self.multi_zone_enable = self.zone_meters.iter().any(|meters| *meters != 0);
        if self.multi_zone_enable {
            self.disabled_zone_meters = None;
        }
    }

    // Allocations.

    pub fn zone_allocations(&self) -> [u8; ALLOCATION_COUNT] {
        self.zone_allocations
    }

    pub fn allocation(&self, index: usize) -> Result<u8, SyncError> {
        self.zone_allocations
            .get(index)
            .copied()
            .ok_or_else(|| SyncError::out_of_range("allocation index", index))
    }

    pub fn set_allocation(&mut self, index: usize, zone: i64) -> Result<(), SyncError> {
        if index >= ALLOCATION_COUNT {
            return Err(SyncError::out_of_range("allocation index", index));
        }
        if !(0..ZONE_COUNT as i64).contains(&zone) {
            return Err(SyncError::out_of_range("zone index", zone));
        }
        self.zone_allocations[index] = zone as u8;
        Ok(())
    }

    pub fn set_allocations(&mut self, allocations: [u8; ALLOCATION_COUNT]) -> Result<(), SyncError> {
        if let Some(zone) = allocations.iter().find(|zone| usize::from(**zone) >= ZONE_COUNT) {
            return Err(SyncError::out_of_range("zone index", *zone));
        }
        self.zone_allocations = allocations;
        Ok(())
    }

    // Capability gated fields.

    pub fn locked(&self) -> Option<bool> {
        self.locked
    }

    pub fn set_locked(&mut self, locked: bool) -> Result<(), SyncError> {
        if !self.capabilities.lock {
            return Err(SyncError::precondition("lock is not supported by this device"));
        }
        self.locked = Some(locked);
        Ok(())
    }

    pub fn rain_delay_minutes(&self) -> Option<u32> {
        self.rain_delay_minutes
    }

    pub fn set_rain_delay_minutes(&mut self, minutes: i64) -> Result<(), SyncError> {
        if !self.capabilities.rain_delay {
            return Err(SyncError::precondition(
                "rain delay is not supported by this device",
            ));
        }
        let minutes =
            u32::try_from(minutes).map_err(|_| SyncError::out_of_range("rain delay", minutes))?;
        self.rain_delay_minutes = Some(minutes);
        Ok(())
    }

    // Live readings.

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut Telemetry {
        &mut self.telemetry
    }

    pub fn snapshot(&self, zone_override_active: bool) -> DeviceSnapshot {
        DeviceSnapshot {
            serial_number: self.serial_number.clone(),
            online: self.online,
            last_online_check_epoch: self.last_online_check.map(|at| at.timestamp()),
            status_code: self.status.map(MowerStatus::code),
            status_description: self.status.map(MowerStatus::as_str),
            error_code: self.error.map(MowerErrorCode::code),
            error_description: self.error.map(MowerErrorCode::as_str),
            lock_supported: self.capabilities.lock,
            rain_delay_supported: self.capabilities.rain_delay,
            multi_zone_supported: self.capabilities.multi_zone,
            enable: self.enable,
            time_extension: self.time_extension,
            schedule: self
                .schedule
                .iter()
                .map(|(day, scheduled)| ScheduledDayView {
                    day: day.as_str(),
                    enable: scheduled.enable(),
                    start_hour: scheduled.hour(),
                    start_minute: scheduled.minute(),
                    duration_minutes: scheduled.duration_minutes(),
                    edgecut: scheduled.edgecut(),
                })
                .collect(),
            zone_meters: self.zone_meters,
            zone_allocations: self.zone_allocations,
            multi_zone_enable: self.multi_zone_enable,
            zone_override_active,
            battery_level: self.telemetry.battery_level,
            battery_charging: self.telemetry.battery_charging,
            last_zone: self.telemetry.last_zone,
            locked: self.locked,
            rain_delay_minutes: self.rain_delay_minutes,
            device_time: self.telemetry.device_time.map(|at| at.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multi_zone_state() -> DeviceState {
        DeviceState::new(
            "201923456789",
            Capabilities {
                lock: false,
                rain_delay: true,
                multi_zone: true,
            },
        )
    }

    #[test]
    fn allocation_set_then_get_for_every_slot_and_zone() {
        let mut state = multi_zone_state();
        for index in 0..ALLOCATION_COUNT {
            for zone in 0..ZONE_COUNT as i64 {
                state.set_allocation(index, zone).unwrap();
                assert_eq!(state.allocation(index), Ok(zone as u8));
            }
        }
    }

    #[test]
    fn allocation_rejects_out_of_range() {
        let mut state = multi_zone_state();
        let before = state.clone();

        assert!(matches!(
            state.set_allocation(10, 1),
            Err(SyncError::OutOfRange { .. })
        ));
        assert!(matches!(
            state.set_allocation(3, 4),
            Err(SyncError::OutOfRange { .. })
        ));
        assert!(matches!(
            state.set_allocation(3, -1),
            Err(SyncError::OutOfRange { .. })
        ));
        assert!(matches!(
            state.allocation(10),
            Err(SyncError::OutOfRange { .. })
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn zone_meter_rejects_bad_index_and_value() {
        let mut state = multi_zone_state();
        assert!(state.set_zone_meter(4, 10).is_err());
        assert!(state.set_zone_meter(0, -3).is_err());
        assert_eq!(state.zone_meters(), [0; ZONE_COUNT]);
    }

    #[test]
    fn multi_zone_enable_follows_meters() {
        let mut state = multi_zone_state();
        assert!(!state.multi_zone_enable());

        state.set_zone_meter(2, 35).unwrap();
        assert!(state.multi_zone_enable());

        state.set_zone_meters([0; ZONE_COUNT]);
        assert!(!state.multi_zone_enable());
    }

    #[test]
    fn uniform_meters_still_count_as_multizone() {
        let mut state = multi_zone_state();
        state.set_zone_meters([20; ZONE_COUNT]);
        assert!(state.multi_zone_enable());
    }

    #[test]
    fn multi_zone_toggle_remembers_meters() {
        let mut state = multi_zone_state();
        state.set_zone_meters([10, 20, 30, 40]);

        state.set_multi_zone_enable(false);
        assert_eq!(state.zone_meters(), [0; ZONE_COUNT]);
        assert!(!state.multi_zone_enable());

        state.set_multi_zone_enable(true);
        assert_eq!(state.zone_meters(), [10, 20, 30, 40]);
        assert!(state.multi_zone_enable());
    }

    #[test]
    fn reported_time_extension_carries_enable() {
        let mut state = multi_zone_state();
        state.apply_reported_time_extension(20).unwrap();
        assert!(state.enable());
        assert_eq!(state.effective_time_extension(), 20);

        state.apply_reported_time_extension(TIME_EXTENSION_DISABLED).unwrap();
        assert!(!state.enable());
        assert_eq!(state.time_extension(), 20);
        assert_eq!(state.effective_time_extension(), TIME_EXTENSION_DISABLED);

        assert!(state.apply_reported_time_extension(250).is_err());
    }

    #[test]
    fn gated_fields_refuse_without_capability() {
        let mut state = multi_zone_state();
        assert!(matches!(
            state.set_locked(true),
            Err(SyncError::PreconditionFailed(_))
        ));
        assert_eq!(state.locked(), None);

        state.set_rain_delay_minutes(45).unwrap();
        assert_eq!(state.rain_delay_minutes(), Some(45));
    }

    #[test]
    fn scheduled_day_index_is_validated() {
        let mut state = multi_zone_state();
        let day = ScheduledDay::new(9, 30, 60, true).unwrap();

        assert!(state.set_scheduled_day(7, day).is_err());
        state.set_scheduled_day(1, day).unwrap();
        assert_eq!(state.scheduled_day(DayOfWeek::Monday), &day);
    }

    #[test]
    fn failed_day_edit_leaves_day_untouched() {
        let mut state = multi_zone_state();
        let result = state.update_scheduled_day(DayOfWeek::Friday, |day| {
            day.set_edgecut(true);
            day.set_hour(31)
        });

        assert!(result.is_err());
        assert_eq!(state.scheduled_day(DayOfWeek::Friday), &ScheduledDay::default());
    }
}

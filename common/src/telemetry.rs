use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    error::SyncError,
    schedule::{parse_start_time, DayOfWeek, ScheduledDay},
    state::{DeviceState, ALLOCATION_COUNT, ZONE_COUNT},
    types::MowerStatus,
};

const DEVICE_TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Decimal(f64),
    Text(String),
}

/// One field of the device state that was (re)reported, keyed by a slash separated path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    pub field: String,
    pub value: FieldValue,
}

impl StateChange {
    pub fn new(field: impl Into<String>, value: FieldValue) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeReport {
    pub changes: Vec<StateChange>,
    /// Soft errors. Each one cost exactly one field.
    pub errors: Vec<SyncError>,
    /// Status committed by this message, if it carried `dat.ls`.
    pub status: Option<MowerStatus>,
}

impl DecodeReport {
    fn change(&mut self, field: impl Into<String>, value: FieldValue) {
        self.changes.push(StateChange::new(field, value));
    }

    fn read<T>(
        &mut self,
        field: &str,
        value: Option<&Value>,
        parse: impl FnOnce(&Value) -> Result<T, String>,
    ) -> Option<T> {
        let value = value?;
        match parse(value) {
            Ok(parsed) => Some(parsed),
            Err(reason) => {
                self.errors.push(SyncError::malformed(field, reason));
                None
            }
        }
    }
}

/// Merges `cfg`/`dat` telemetry documents into a [`DeviceState`].
#[derive(Debug, Clone, Copy)]
pub struct TelemetryDecoder {
    timezone: Tz,
    zone_meters_locked: bool,
}

impl TelemetryDecoder {
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            zone_meters_locked: false,
        }
    }

    /// While locked, a reported `cfg.mz` is not applied.
    pub fn with_zone_meters_locked(mut self, locked: bool) -> Self {
        self.zone_meters_locked = locked;
        self
    }

    pub fn decode(&self, state: &mut DeviceState, message: &Value) -> DecodeReport {
        let mut report = DecodeReport::default();

        let Some(message) = message.as_object() else {
            report
                .errors
                .push(SyncError::malformed("message", "expected a JSON object"));
            return report;
        };

        if let Some(cfg) = member(message, "cfg") {
            match cfg.as_object() {
                Some(cfg) => self.decode_cfg(state, cfg, &mut report),
                None => report
                    .errors
                    .push(SyncError::malformed("cfg", "expected an object")),
            }
        }

        if let Some(dat) = member(message, "dat") {
            match dat.as_object() {
                Some(dat) => decode_dat(state, dat, &mut report),
                None => report
                    .errors
                    .push(SyncError::malformed("dat", "expected an object")),
            }
        }

        report
    }

    fn decode_cfg(&self, state: &mut DeviceState, cfg: &Map<String, Value>, report: &mut DecodeReport) {
        if let Some(id) = report.read("cfg.id", member(cfg, "id"), as_int) {
            state.telemetry_mut().config_id = Some(id);
            report.change("config/id", FieldValue::Int(id));
        }

        if let Some(language) = report.read("cfg.lg", member(cfg, "lg"), as_text) {
            state.telemetry_mut().language = Some(language.clone());
            report.change("config/language", FieldValue::Text(language));
        }

        match (member(cfg, "dt"), member(cfg, "tm")) {
            (None, None) => {}
            (Some(date), Some(time)) => match self.parse_device_time(date, time) {
                Ok(at) => {
                    state.telemetry_mut().device_time = Some(at);
                    report.change("config/datetime", FieldValue::Text(at.to_rfc3339()));
                }
                Err(err) => report.errors.push(err),
            },
            _ => report.errors.push(SyncError::malformed(
                "cfg.dt",
                "date and time must be reported together",
            )),
        }

        if let Some(sc) = member(cfg, "sc") {
            match sc.as_object() {
                Some(sc) => decode_schedule(state, sc, report),
                None => report
                    .errors
                    .push(SyncError::malformed("cfg.sc", "expected an object")),
            }
        }

        if let Some(command) = report.read("cfg.cmd", member(cfg, "cmd"), as_int) {
            state.telemetry_mut().last_command = Some(command);
            report.change("config/command", FieldValue::Int(command));
        }

        let capabilities = state.capabilities();

        if capabilities.multi_zone {
            if self.zone_meters_locked {
                // The overlay owns the meters until it resolves.
            } else if let Some(meters) = report.read("cfg.mz", member(cfg, "mz"), as_zone_meters) {
                state.set_zone_meters(meters);
                for (zone, meters) in meters.iter().enumerate() {
                    report.change(
                        format!("zones/{}/meter", zone + 1),
                        FieldValue::Int(i64::from(*meters)),
                    );
                }
                report.change(
                    "multizone/enable",
                    FieldValue::Bool(state.multi_zone_enable()),
                );
            }

            if let Some(allocations) = report.read("cfg.mzv", member(cfg, "mzv"), as_allocations) {
                match state.set_allocations(allocations) {
                    Ok(()) => {
                        for (index, zone) in allocations.iter().enumerate() {
                            report.change(
                                format!("allocations/{index}"),
                                FieldValue::Int(i64::from(*zone)),
                            );
                        }
                    }
                    Err(err) => report
                        .errors
                        .push(SyncError::malformed("cfg.mzv", err.to_string())),
                }
            }
        }

        if capabilities.rain_delay {
            if let Some(minutes) = report.read("cfg.rd", member(cfg, "rd"), as_int) {
                match state.set_rain_delay_minutes(minutes) {
                    Ok(()) => report.change("rain-delay", FieldValue::Int(minutes)),
                    Err(err) => report
                        .errors
                        .push(SyncError::malformed("cfg.rd", err.to_string())),
                }
            }
        }

        if let Some(serial) = report.read("cfg.sn", member(cfg, "sn"), as_text) {
            state.telemetry_mut().reported_serial = Some(serial.clone());
            report.change("config/serial-number", FieldValue::Text(serial));
        }
    }

    fn parse_device_time(&self, date: &Value, time: &Value) -> Result<DateTime<FixedOffset>, SyncError> {
        let date = as_text(date).map_err(|reason| SyncError::malformed("cfg.dt", reason))?;
        let time = as_text(time).map_err(|reason| SyncError::malformed("cfg.tm", reason))?;

        let naive = NaiveDateTime::parse_from_str(&format!("{date} {time}"), DEVICE_TIME_FORMAT)
            .map_err(|err| SyncError::malformed("cfg.dt", format!("`{date} {time}`: {err}")))?;

        let local = self
            .timezone
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| {
                SyncError::malformed("cfg.dt", format!("`{date} {time}` does not exist locally"))
            })?;

        Ok(local.with_timezone(&local.offset().fix()))
    }
}

fn decode_schedule(state: &mut DeviceState, sc: &Map<String, Value>, report: &mut DecodeReport) {
    if let Some(extension) = report.read("cfg.sc.p", member(sc, "p"), as_int) {
        match state.apply_reported_time_extension(extension) {
            Ok(()) => {
                report.change(
                    "schedule/time-extension",
                    FieldValue::Int(state.time_extension()),
                );
                report.change("schedule/enable", FieldValue::Bool(state.enable()));
            }
            Err(err) => report
                .errors
                .push(SyncError::malformed("cfg.sc.p", err.to_string())),
        }
    }

    let Some(days) = member(sc, "d") else {
        return;
    };
    let Some(days) = days.as_array() else {
        report
            .errors
            .push(SyncError::malformed("cfg.sc.d", "expected an array"));
        return;
    };
    if days.len() != DayOfWeek::ALL.len() {
        report.errors.push(SyncError::malformed(
            "cfg.sc.d",
            format!("expected 7 days, got {}", days.len()),
        ));
        return;
    }

    for (day, entry) in DayOfWeek::ALL.into_iter().zip(days) {
        let field = format!("cfg.sc.d[{}]", day.index());
        let Some(scheduled) = report.read(&field, Some(entry), as_scheduled_day) else {
            continue;
        };
        if let Err(err) = state.set_scheduled_day(day.index(), scheduled) {
            report.errors.push(SyncError::malformed(field, err.to_string()));
            continue;
        }

        let prefix = format!("schedule/{}", day.as_str());
        report.change(
            format!("{prefix}/start-hour"),
            FieldValue::Int(i64::from(scheduled.hour())),
        );
        report.change(
            format!("{prefix}/start-minute"),
            FieldValue::Int(i64::from(scheduled.minute())),
        );
        report.change(
            format!("{prefix}/duration"),
            FieldValue::Int(i64::from(scheduled.duration_minutes())),
        );
        report.change(format!("{prefix}/enable"), FieldValue::Bool(scheduled.enable()));
        report.change(
            format!("{prefix}/edgecut"),
            FieldValue::Bool(scheduled.edgecut()),
        );
    }
}

fn decode_dat(state: &mut DeviceState, dat: &Map<String, Value>, report: &mut DecodeReport) {
    if let Some(mac) = report.read("dat.mac", member(dat, "mac"), as_text) {
        state.telemetry_mut().mac_address = Some(mac.clone());
        report.change("device/mac-address", FieldValue::Text(mac));
    }

    if let Some(firmware) = report.read("dat.fw", member(dat, "fw"), as_decimal) {
        state.telemetry_mut().firmware = Some(firmware);
        report.change("device/firmware", FieldValue::Decimal(firmware));
    }

    if let Some(bt) = member(dat, "bt") {
        match bt.as_object() {
            Some(bt) => decode_battery(state, bt, report),
            None => report
                .errors
                .push(SyncError::malformed("dat.bt", "expected an object")),
        }
    }

    if let Some(dmp) = member(dat, "dmp") {
        match dmp.as_array() {
            Some(dmp) => decode_orientation(state, dmp, report),
            None => report
                .errors
                .push(SyncError::malformed("dat.dmp", "expected an array")),
        }
    }

    if let Some(st) = member(dat, "st") {
        match st.as_object() {
            Some(st) => decode_statistics(state, st, report),
            None => report
                .errors
                .push(SyncError::malformed("dat.st", "expected an object")),
        }
    }

    if let Some(code) = report.read("dat.ls", member(dat, "ls"), as_int) {
        let status = state.set_status_code(code);
        report.status = Some(status);
        report.change("status/code", FieldValue::Int(code));
        report.change(
            "status/description",
            FieldValue::Text(status.as_str().to_string()),
        );
    }

    if let Some(code) = report.read("dat.le", member(dat, "le"), as_int) {
        let error = state.set_error_code(code);
        report.change("error/code", FieldValue::Int(code));
        report.change(
            "error/description",
            FieldValue::Text(error.as_str().to_string()),
        );
    }

    if let Some(slot) = report.read("dat.lz", member(dat, "lz"), as_int) {
        match usize::try_from(slot)
            .map_err(|_| SyncError::out_of_range("allocation index", slot))
            .and_then(|slot| state.allocation(slot))
        {
            Ok(zone) => {
                state.telemetry_mut().last_zone = Some(zone);
                report.change("zone/last", FieldValue::Int(i64::from(zone)));
            }
            Err(err) => report
                .errors
                .push(SyncError::malformed("dat.lz", err.to_string())),
        }
    }

    if let Some(quality) = report.read("dat.rsi", member(dat, "rsi"), as_int) {
        state.telemetry_mut().wifi_quality = Some(quality);
        report.change("device/wifi-quality", FieldValue::Int(quality));
    }

    if state.capabilities().lock {
        if let Some(locked) = report.read("dat.lk", member(dat, "lk"), as_flag) {
            match state.set_locked(locked) {
                Ok(()) => report.change("lock", FieldValue::Bool(locked)),
                Err(err) => report
                    .errors
                    .push(SyncError::malformed("dat.lk", err.to_string())),
            }
        }
    }
}

fn decode_battery(state: &mut DeviceState, bt: &Map<String, Value>, report: &mut DecodeReport) {
    if let Some(temperature) = report.read("dat.bt.t", member(bt, "t"), as_decimal) {
        state.telemetry_mut().battery_temperature = Some(temperature);
        report.change("battery/temperature", FieldValue::Decimal(temperature));
    }
    if let Some(voltage) = report.read("dat.bt.v", member(bt, "v"), as_decimal) {
        state.telemetry_mut().battery_voltage = Some(voltage);
        report.change("battery/voltage", FieldValue::Decimal(voltage));
    }
    if let Some(level) = report.read("dat.bt.p", member(bt, "p"), as_int) {
        state.telemetry_mut().battery_level = Some(level);
        report.change("battery/level", FieldValue::Int(level));
    }
    if let Some(cycles) = report.read("dat.bt.nr", member(bt, "nr"), as_int) {
        state.telemetry_mut().battery_charge_cycles = Some(cycles);
        report.change("battery/charge-cycles", FieldValue::Int(cycles));
    }
    if let Some(charging) = report.read("dat.bt.c", member(bt, "c"), as_flag) {
        state.telemetry_mut().battery_charging = Some(charging);
        report.change("battery/charging", FieldValue::Bool(charging));
    }
}

fn decode_orientation(state: &mut DeviceState, dmp: &[Value], report: &mut DecodeReport) {
    // Missing indices are absent readings.
    if let Some(pitch) = report.read("dat.dmp[0]", non_null(dmp.first()), as_decimal) {
        state.telemetry_mut().pitch = Some(pitch);
        report.change("orientation/pitch", FieldValue::Decimal(pitch));
    }
    if let Some(roll) = report.read("dat.dmp[1]", non_null(dmp.get(1)), as_decimal) {
        state.telemetry_mut().roll = Some(roll);
        report.change("orientation/roll", FieldValue::Decimal(roll));
    }
    if let Some(yaw) = report.read("dat.dmp[2]", non_null(dmp.get(2)), as_decimal) {
        state.telemetry_mut().yaw = Some(yaw);
        report.change("orientation/yaw", FieldValue::Decimal(yaw));
    }
}

fn decode_statistics(state: &mut DeviceState, st: &Map<String, Value>, report: &mut DecodeReport) {
    if let Some(blade_time) = report.read("dat.st.b", member(st, "b"), as_int) {
        state.telemetry_mut().total_blade_time = Some(blade_time);
        report.change("statistics/blade-time", FieldValue::Int(blade_time));
    }
    if let Some(distance) = report.read("dat.st.d", member(st, "d"), as_int) {
        state.telemetry_mut().total_distance = Some(distance);
        report.change("statistics/distance", FieldValue::Int(distance));
    }
    if let Some(total_time) = report.read("dat.st.wt", member(st, "wt"), as_int) {
        state.telemetry_mut().total_time = Some(total_time);
        report.change("statistics/total-time", FieldValue::Int(total_time));
    }
}

fn member<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    non_null(object.get(key))
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| !value.is_null())
}

fn as_decimal(value: &Value) -> Result<f64, String> {
    let decimal = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    decimal
        .filter(|decimal| decimal.is_finite())
        .ok_or_else(|| format!("expected a number, got {value}"))
}

fn as_int(value: &Value) -> Result<i64, String> {
    if let Some(int) = value.as_i64() {
        return Ok(int);
    }
    // Decimal readings are truncated.
    let decimal = as_decimal(value)?;
    if decimal < i64::MIN as f64 || decimal > i64::MAX as f64 {
        return Err(format!("{value} does not fit an integer"));
    }
    Ok(decimal.trunc() as i64)
}

fn as_flag(value: &Value) -> Result<bool, String> {
    if let Some(flag) = value.as_bool() {
        return Ok(flag);
    }
    as_int(value).map(|flag| flag == 1)
}

fn as_text(value: &Value) -> Result<String, String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        _ => Err(format!("expected a string, got {value}")),
    }
}

fn as_int_array<const N: usize>(value: &Value) -> Result<[i64; N], String> {
    let items = value
        .as_array()
        .ok_or_else(|| format!("expected an array, got {value}"))?;
    if items.len() != N {
        return Err(format!("expected {N} entries, got {}", items.len()));
    }

    let mut parsed = [0i64; N];
    for (slot, item) in parsed.iter_mut().zip(items) {
        *slot = as_int(item)?;
    }
    Ok(parsed)
}

fn as_zone_meters(value: &Value) -> Result<[u32; ZONE_COUNT], String> {
    let raw = as_int_array::<ZONE_COUNT>(value)?;
    let mut meters = [0u32; ZONE_COUNT];
    for (slot, meter) in meters.iter_mut().zip(raw) {
        *slot = u32::try_from(meter).map_err(|_| format!("zone meters {meter} out of range"))?;
    }
    Ok(meters)
}

fn as_allocations(value: &Value) -> Result<[u8; ALLOCATION_COUNT], String> {
    let raw = as_int_array::<ALLOCATION_COUNT>(value)?;
    let mut allocations = [0u8; ALLOCATION_COUNT];
    for (slot, zone) in allocations.iter_mut().zip(raw) {
        if !(0..ZONE_COUNT as i64).contains(&zone) {
            return Err(format!("zone {zone} out of range"));
        }
        *slot = zone as u8;
    }
    Ok(allocations)
}

fn as_scheduled_day(value: &Value) -> Result<ScheduledDay, String> {
    let entry = value
        .as_array()
        .filter(|entry| entry.len() >= 3)
        .ok_or_else(|| format!("expected [\"H:MM\", duration, edgecut], got {value}"))?;

    let start = entry[0]
        .as_str()
        .ok_or_else(|| format!("expected a start time string, got {}", entry[0]))?;
    let (hour, minute) = parse_start_time(start).map_err(|err| err.to_string())?;

    let duration = as_int(&entry[1])?;
    let duration =
        u32::try_from(duration).map_err(|_| format!("duration {duration} out of range"))?;
    let edgecut = as_flag(&entry[2])?;

    ScheduledDay::new(hour, minute, duration, edgecut).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::{state::Capabilities, types::MowerErrorCode};

    fn decoder() -> TelemetryDecoder {
        TelemetryDecoder::new(chrono_tz::Europe::Berlin)
    }

    fn device(capabilities: Capabilities) -> DeviceState {
        DeviceState::new("201923456789", capabilities)
    }

    fn all_capabilities() -> Capabilities {
        Capabilities {
            lock: true,
            rain_delay: true,
            multi_zone: true,
        }
    }

    fn week() -> Value {
        json!([
            ["0:00", 0, 0],
            ["9:05", 60, 1],
            ["10:30", 45, 0],
            ["11:00", 0, 0],
            ["12:15", 120, 1],
            ["7:00", 30, 0],
            ["23:59", 15, 1]
        ])
    }

    #[test]
    fn battery_level_alone_touches_only_battery_level() {
        let mut state = device(all_capabilities());
        let mut expected = state.clone();

        let report = decoder().decode(&mut state, &json!({"dat": {"bt": {"p": 77}}}));

        expected.telemetry_mut().battery_level = Some(77);
        assert_eq!(state, expected);
        assert!(report.errors.is_empty());
        assert_eq!(
            report.changes,
            vec![StateChange::new("battery/level", FieldValue::Int(77))]
        );
    }

    #[test]
    fn empty_and_missing_members_are_not_errors() {
        let mut state = device(all_capabilities());
        let before = state.clone();

        let report = decoder().decode(&mut state, &json!({}));
        assert_eq!(report, DecodeReport::default());

        let report = decoder().decode(&mut state, &json!({"cfg": {}, "dat": null}));
        assert_eq!(report, DecodeReport::default());
        assert_eq!(state, before);
    }

    #[test]
    fn unknown_status_does_not_stop_siblings() {
        let mut state = device(all_capabilities());

        let report = decoder().decode(
            &mut state,
            &json!({"dat": {"ls": 255, "le": 0, "bt": {"c": 1}}}),
        );

        assert!(report.errors.is_empty());
        assert_eq!(report.status, Some(MowerStatus::Unknown(255)));
        assert_eq!(state.status(), Some(MowerStatus::Unknown(255)));
        assert_eq!(state.error(), Some(MowerErrorCode::NoError));
        assert_eq!(state.telemetry().battery_charging, Some(true));
        assert!(report.changes.contains(&StateChange::new(
            "status/description",
            FieldValue::Text("Unknown".to_string())
        )));
    }

    #[test]
    fn malformed_field_is_skipped_and_reported() {
        let mut state = device(all_capabilities());

        let report = decoder().decode(
            &mut state,
            &json!({"dat": {"bt": {"t": "hot", "v": 19.8, "p": 40}, "ls": 7}}),
        );

        assert_eq!(report.errors.len(), 1);
        assert!(matches!(
            &report.errors[0],
            SyncError::MalformedField { field, .. } if field == "dat.bt.t"
        ));
        assert_eq!(state.telemetry().battery_temperature, None);
        assert_eq!(state.telemetry().battery_voltage, Some(19.8));
        assert_eq!(state.telemetry().battery_level, Some(40));
        assert_eq!(state.status(), Some(MowerStatus::Mowing));
    }

    #[test]
    fn lock_is_ignored_without_capability() {
        let mut state = device(Capabilities {
            lock: false,
            rain_delay: false,
            multi_zone: true,
        });
        let before = state.clone();

        let report = decoder().decode(&mut state, &json!({"dat": {"lk": 1}}));

        assert_eq!(state, before);
        assert!(report.changes.is_empty());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn zone_meters_update_and_enable_multizone() {
        let mut state = device(Capabilities {
            lock: false,
            rain_delay: false,
            multi_zone: true,
        });

        let report = decoder().decode(&mut state, &json!({"cfg": {"mz": [10, 20, 30, 40]}}));

        assert!(report.errors.is_empty());
        assert_eq!(state.zone_meters(), [10, 20, 30, 40]);
        assert!(state.multi_zone_enable());
        assert_eq!(
            report.changes.last(),
            Some(&StateChange::new("multizone/enable", FieldValue::Bool(true)))
        );
    }

    #[test]
    fn multizone_fields_need_capability() {
        let mut state = device(Capabilities::default());

        decoder().decode(
            &mut state,
            &json!({"cfg": {"mz": [10, 20, 30, 40], "mzv": [1, 1, 1, 1, 1, 1, 1, 1, 1, 1], "rd": 30}}),
        );

        assert_eq!(state.zone_meters(), [0; ZONE_COUNT]);
        assert_eq!(state.zone_allocations(), [0; ALLOCATION_COUNT]);
        assert_eq!(state.rain_delay_minutes(), None);
    }

    #[test]
    fn locked_zone_meters_are_not_overwritten() {
        let mut state = device(all_capabilities());
        state.set_zone_meters([5, 5, 5, 5]);

        let report = decoder()
            .with_zone_meters_locked(true)
            .decode(&mut state, &json!({"cfg": {"mz": [10, 20, 30, 40]}}));

        assert_eq!(state.zone_meters(), [5, 5, 5, 5]);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn bad_allocation_table_is_rejected_whole() {
        let mut state = device(all_capabilities());

        let report = decoder().decode(
            &mut state,
            &json!({"cfg": {"mzv": [0, 1, 2, 3, 0, 1, 2, 9, 0, 1]}}),
        );

        assert_eq!(report.errors.len(), 1);
        assert_eq!(state.zone_allocations(), [0; ALLOCATION_COUNT]);
    }

    #[test]
    fn schedule_days_map_in_device_order() {
        let mut state = device(all_capabilities());

        let report = decoder().decode(&mut state, &json!({"cfg": {"sc": {"p": 20, "d": week()}}}));

        assert!(report.errors.is_empty());
        assert_eq!(state.time_extension(), 20);
        assert!(state.enable());

        let monday = state.scheduled_day(DayOfWeek::Monday);
        assert_eq!((monday.hour(), monday.minute()), (9, 5));
        assert_eq!(monday.duration_minutes(), 60);
        assert!(monday.edgecut());
        assert!(monday.enable());

        let sunday = state.scheduled_day(DayOfWeek::Sunday);
        assert!(!sunday.enable());
        assert_eq!(
            state.scheduled_day(DayOfWeek::Saturday).start_time(),
            "23:59"
        );
    }

    #[test]
    fn one_bad_day_keeps_the_others() {
        let mut state = device(all_capabilities());
        let mut days = week();
        days[3] = json!(["25:00", 10, 0]);

        let report = decoder().decode(&mut state, &json!({"cfg": {"sc": {"d": days}}}));

        assert_eq!(report.errors.len(), 1);
        assert_eq!(
            state.scheduled_day(DayOfWeek::Wednesday),
            &ScheduledDay::default()
        );
        assert_eq!(state.scheduled_day(DayOfWeek::Thursday).duration_minutes(), 120);
    }

    #[test]
    fn short_week_is_malformed() {
        let mut state = device(all_capabilities());
        let report = decoder().decode(
            &mut state,
            &json!({"cfg": {"sc": {"d": [["9:00", 10, 0]]}}}),
        );
        assert_eq!(report.errors.len(), 1);
        assert_eq!(state.schedule(), &Default::default());
    }

    #[test]
    fn disabled_time_extension_clears_enable() {
        let mut state = device(all_capabilities());
        state.apply_reported_time_extension(10).unwrap();

        decoder().decode(&mut state, &json!({"cfg": {"sc": {"p": -100}}}));

        assert!(!state.enable());
        assert_eq!(state.time_extension(), 10);
    }

    #[test]
    fn device_time_is_local_to_configured_zone() {
        let mut state = device(all_capabilities());

        let report = decoder().decode(
            &mut state,
            &json!({"cfg": {"dt": "13/03/2020", "tm": "17:09:34"}}),
        );

        assert!(report.errors.is_empty());
        let at = state.telemetry().device_time.unwrap();
        assert_eq!(at.to_rfc3339(), "2020-03-13T17:09:34+01:00");
    }

    #[test]
    fn unparseable_device_time_is_recoverable() {
        let mut state = device(all_capabilities());

        let report = decoder().decode(
            &mut state,
            &json!({"cfg": {"dt": "2020-03-13", "tm": "17:09:34", "lg": "de"}}),
        );

        assert_eq!(report.errors.len(), 1);
        assert_eq!(state.telemetry().device_time, None);
        assert_eq!(state.telemetry().language.as_deref(), Some("de"));
    }

    #[test]
    fn orientation_tolerates_short_array() {
        let mut state = device(all_capabilities());

        let report = decoder().decode(&mut state, &json!({"dat": {"dmp": [2.5, -1.25]}}));

        assert!(report.errors.is_empty());
        assert_eq!(state.telemetry().pitch, Some(2.5));
        assert_eq!(state.telemetry().roll, Some(-1.25));
        assert_eq!(state.telemetry().yaw, None);
    }

    #[test]
    fn last_zone_resolves_through_allocations() {
        let mut state = device(all_capabilities());

        decoder().decode(
            &mut state,
            &json!({
                "cfg": {"mzv": [0, 0, 1, 1, 2, 2, 3, 3, 3, 3]},
                "dat": {"lz": 5}
            }),
        );
        assert_eq!(state.telemetry().last_zone, Some(2));

        let report = decoder().decode(&mut state, &json!({"dat": {"lz": 12}}));
        assert_eq!(report.errors.len(), 1);
        assert_eq!(state.telemetry().last_zone, Some(2));
    }

    #[test]
    fn numeric_fields_accept_decimals() {
        let mut state = device(all_capabilities());

        decoder().decode(
            &mut state,
            &json!({"dat": {"ls": 1.0, "st": {"b": 1234.0, "d": 5678, "wt": 91011}}}),
        );

        assert_eq!(state.status(), Some(MowerStatus::Home));
        assert_eq!(state.telemetry().total_blade_time, Some(1234));
        assert_eq!(state.telemetry().total_distance, Some(5678));
        assert_eq!(state.telemetry().total_time, Some(91011));
    }

    #[test]
    fn non_object_message_is_reported() {
        let mut state = device(all_capabilities());
        let report = decoder().decode(&mut state, &json!([1, 2, 3]));
        assert_eq!(report.errors.len(), 1);
    }
}

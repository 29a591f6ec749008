use crate::{
    error::SyncError,
    schedule::{DayOfWeek, ScheduledDay},
    types::ActionCode,
};

/// Value that turns any identifier into a read-only refresh.
pub const REFRESH: &str = "REFRESH";

/// One field of a single day's schedule entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayEdit {
    Enable(bool),
    StartHour(i64),
    StartMinute(i64),
    Duration(i64),
    Edgecut(bool),
}

impl DayEdit {
    pub fn apply(self, day: &mut ScheduledDay) -> Result<(), SyncError> {
        match self {
            Self::Enable(enable) => day.set_enable(enable),
            Self::StartHour(hour) => day.set_hour(hour)?,
            Self::StartMinute(minute) => day.set_minute(minute)?,
            Self::Duration(minutes) => {
                day.set_duration_minutes(minutes)?;
                day.set_enable(minutes > 0);
            }
            Self::Edgecut(edgecut) => day.set_edgecut(edgecut),
        }
        Ok(())
    }
}

/// A user request after the identifier and value were parsed, before any validation
/// against the device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Refresh,
    MultiZoneEnable(bool),
    /// Zero based zone index.
    StartZone(usize),
    /// Zero based zone index.
    ZoneMeter { zone: usize, meters: i64 },
    Allocation { index: usize, zone: i64 },
    Schedule { day: DayOfWeek, edit: DayEdit },
    Enable(bool),
    TimeExtension(i64),
    Action(ActionCode),
    RainDelay(i64),
    Lock(bool),
    Poll,
}

impl Intent {
    /// Returns `Ok(None)` when the identifier is not one this device understands.
    pub fn parse(channel: &str, value: &str) -> Result<Option<Self>, SyncError> {
        let value = value.trim();
        if value.eq_ignore_ascii_case(REFRESH) {
            return Ok(Some(Self::Refresh));
        }

        let segments: Vec<&str> = channel.trim_matches('/').split('/').collect();
        let intent = match segments.as_slice() {
            ["multizone", "enable"] => Self::MultiZoneEnable(parse_switch(channel, value)?),
            ["zone", "start"] => {
                let zone = parse_number(channel, value)?;
                let zone = usize::try_from(zone).map_err(|_| SyncError::out_of_range("zone index", zone))?;
                Self::StartZone(zone)
            }
            ["zones", zone, "meter"] => {
                let Ok(zone) = zone.parse::<usize>() else {
                    return Ok(None);
                };
                let zone = zone
                    .checked_sub(1)
                    .ok_or_else(|| SyncError::out_of_range("zone number", zone))?;
                Self::ZoneMeter {
                    zone,
                    meters: parse_number(channel, value)?,
                }
            }
            ["allocations", index] => {
                let Ok(index) = index.parse::<usize>() else {
                    return Ok(None);
                };
                Self::Allocation {
                    index,
                    zone: parse_number(channel, value)?,
                }
            }
            ["schedule", "enable"] => Self::Enable(parse_switch(channel, value)?),
            ["schedule", "time-extension"] => Self::TimeExtension(parse_number(channel, value)?),
            ["schedule", day, field] => {
                let Ok(day) = day.parse::<DayOfWeek>() else {
                    return Ok(None);
                };
                let edit = match *field {
                    "enable" => DayEdit::Enable(parse_switch(channel, value)?),
                    "start-hour" => DayEdit::StartHour(parse_number(channel, value)?),
                    "start-minute" => DayEdit::StartMinute(parse_number(channel, value)?),
                    "duration" => DayEdit::Duration(parse_number(channel, value)?),
                    "edgecut" => DayEdit::Edgecut(parse_switch(channel, value)?),
                    _ => return Ok(None),
                };
                Self::Schedule { day, edit }
            }
            ["action"] => Self::Action(value.parse()?),
            ["rain-delay"] => Self::RainDelay(parse_number(channel, value)?),
            ["lock"] => Self::Lock(parse_switch(channel, value)?),
            ["poll"] => Self::Poll,
            _ => return Ok(None),
        };
        Ok(Some(intent))
    }
}

fn parse_switch(channel: &str, value: &str) -> Result<bool, SyncError> {
    match value.to_ascii_uppercase().as_str() {
        "ON" | "TRUE" | "1" => Ok(true),
        "OFF" | "FALSE" | "0" => Ok(false),
        _ => Err(SyncError::malformed(
            channel,
            format!("expected ON or OFF, got `{value}`"),
        )),
    }
}

/// Whole numbers; UIs that send `30.0` are accepted, fractions are dropped.
fn parse_number(channel: &str, value: &str) -> Result<i64, SyncError> {
    if let Ok(number) = value.parse::<i64>() {
        return Ok(number);
    }
    match value.parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(number.trunc() as i64),
        _ => Err(SyncError::malformed(
            channel,
            format!("expected a number, got `{value}`"),
        )),
    }
}

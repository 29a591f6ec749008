use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Days in the order the device lists them in `cfg.sc.d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        Self::Sunday,
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
    ];

    pub fn index(self) -> usize {
        match self {
            Self::Sunday => 0,
            Self::Monday => 1,
            Self::Tuesday => 2,
            Self::Wednesday => 3,
            Self::Thursday => 4,
            Self::Friday => 5,
            Self::Saturday => 6,
        }
    }

    pub fn from_index(index: usize) -> Result<Self, SyncError> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or_else(|| SyncError::out_of_range("day index", index))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sunday => "sunday",
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
        }
    }
}

impl FromStr for DayOfWeek {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lower = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| day.as_str() == lower)
            .ok_or_else(|| SyncError::malformed("day", format!("unknown day `{value}`")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScheduledDay {
    hour: u8,
    minute: u8,
    duration_minutes: u32,
    edgecut: bool,
    enable: bool,
}

impl ScheduledDay {
    pub fn new(
        hour: u8,
        minute: u8,
        duration_minutes: u32,
        edgecut: bool,
    ) -> Result<Self, SyncError> {
        let mut day = Self::default();
        day.set_hour(i64::from(hour))?;
        day.set_minute(i64::from(minute))?;
        day.duration_minutes = duration_minutes;
        day.edgecut = edgecut;
        day.enable = duration_minutes > 0;
        Ok(day)
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    pub fn edgecut(&self) -> bool {
        self.edgecut
    }

    pub fn enable(&self) -> bool {
        self.enable
    }

    pub fn set_hour(&mut self, hour: i64) -> Result<(), SyncError> {
        if !(0..24).contains(&hour) {
            return Err(SyncError::out_of_range("start hour", hour));
        }
        self.hour = hour as u8;
        Ok(())
    }

    pub fn set_minute(&mut self, minute: i64) -> Result<(), SyncError> {
        if !(0..60).contains(&minute) {
            return Err(SyncError::out_of_range("start minute", minute));
        }
        self.minute = minute as u8;
        Ok(())
    }

    pub fn set_duration_minutes(&mut self, duration: i64) -> Result<(), SyncError> {
        let duration =
            u32::try_from(duration).map_err(|_| SyncError::out_of_range("duration", duration))?;
        self.duration_minutes = duration;
        Ok(())
    }

    pub fn set_edgecut(&mut self, edgecut: bool) {
        self.edgecut = edgecut;
    }

    pub fn set_enable(&mut self, enable: bool) {
        self.enable = enable;
    }

    /// Duration sent to the device. A disabled day is sent as zero minutes but keeps its
    /// configured duration locally so re-enabling restores it.
    pub fn effective_duration(&self) -> u32 {
        if self.enable {
            self.duration_minutes
        } else {
            0
        }
    }

    pub fn start_time(&self) -> String {
        format_start_time(self.hour, self.minute)
    }
}

/// One entry per day, always all seven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WeekSchedule {
    days: [ScheduledDay; 7],
}

impl WeekSchedule {
    pub fn day(&self, day: DayOfWeek) -> &ScheduledDay {
        &self.days[day.index()]
    }

    pub fn day_mut(&mut self, day: DayOfWeek) -> &mut ScheduledDay {
        &mut self.days[day.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (DayOfWeek, &ScheduledDay)> {
        DayOfWeek::ALL.into_iter().zip(self.days.iter())
    }
}

/// Parses the device `H:MM` start time.
pub fn parse_start_time(value: &str) -> Result<(u8, u8), SyncError> {
    let (hour, minute) = value
        .split_once(':')
        .ok_or_else(|| SyncError::malformed("start time", format!("expected H:MM, got `{value}`")))?;

    let hour: u8 = hour
        .trim()
        .parse()
        .map_err(|_| SyncError::malformed("start time", format!("bad hour in `{value}`")))?;
    let minute: u8 = minute
        .trim()
        .parse()
        .map_err(|_| SyncError::malformed("start time", format!("bad minute in `{value}`")))?;

    if hour >= 24 {
        return Err(SyncError::out_of_range("start hour", hour));
    }
    if minute >= 60 {
        return Err(SyncError::out_of_range("start minute", minute));
    }
    Ok((hour, minute))
}

pub fn format_start_time(hour: u8, minute: u8) -> String {
    format!("{hour}:{minute:02}")
}

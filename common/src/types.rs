use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::error::SyncError;

/// Operational status reported in `dat.ls`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MowerStatus {
    Idle,
    Home,
    StartSequence,
    LeavingHome,
    FollowWire,
    SearchingHome,
    SearchingWire,
    Mowing,
    Lifted,
    Trapped,
    BladeBlocked,
    Debug,
    RemoteControl,
    GoingHome,
    ZoneTraining,
    BorderCut,
    SearchingZone,
    Pause,
    Unknown(i64),
}

impl MowerStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Idle,
            1 => Self::Home,
            2 => Self::StartSequence,
            3 => Self::LeavingHome,
            4 => Self::FollowWire,
            5 => Self::SearchingHome,
            6 => Self::SearchingWire,
            7 => Self::Mowing,
            8 => Self::Lifted,
            9 => Self::Trapped,
            10 => Self::BladeBlocked,
            11 => Self::Debug,
            12 => Self::RemoteControl,
            30 => Self::GoingHome,
            31 => Self::ZoneTraining,
            32 => Self::BorderCut,
            33 => Self::SearchingZone,
            34 => Self::Pause,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Idle => 0,
            Self::Home => 1,
            Self::StartSequence => 2,
            Self::LeavingHome => 3,
            Self::FollowWire => 4,
            Self::SearchingHome => 5,
            Self::SearchingWire => 6,
            Self::Mowing => 7,
            Self::Lifted => 8,
            Self::Trapped => 9,
            Self::BladeBlocked => 10,
            Self::Debug => 11,
            Self::RemoteControl => 12,
            Self::GoingHome => 30,
            Self::ZoneTraining => 31,
            Self::BorderCut => 32,
            Self::SearchingZone => 33,
            Self::Pause => 34,
            Self::Unknown(code) => code,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Home => "Home",
            Self::StartSequence => "Start sequence",
            Self::LeavingHome => "Leaving home",
            Self::FollowWire => "Follow wire",
            Self::SearchingHome => "Searching home",
            Self::SearchingWire => "Searching wire",
            Self::Mowing => "Mowing",
            Self::Lifted => "Lifted",
            Self::Trapped => "Trapped",
            Self::BladeBlocked => "Blade blocked",
            Self::Debug => "Debug",
            Self::RemoteControl => "Remote control",
            Self::GoingHome => "Going home",
            Self::ZoneTraining => "Zone training",
            Self::BorderCut => "Border cut",
            Self::SearchingZone => "Searching zone",
            Self::Pause => "Pause",
            Self::Unknown(_) => "Unknown",
        }
    }

    /// Statuses the mower passes through right after a zone start.
    pub fn is_zone_start_transient(self) -> bool {
        matches!(
            self,
            Self::Home | Self::StartSequence | Self::LeavingHome | Self::SearchingZone
        )
    }
}

impl fmt::Display for MowerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

/// Fault reported in `dat.le`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MowerErrorCode {
    NoError,
    Trapped,
    Lifted,
    WireMissing,
    OutsideWire,
    Raining,
    CloseDoorToMow,
    CloseDoorToGoHome,
    BladeMotorBlocked,
    WheelMotorBlocked,
    TrappedTimeout,
    UpsideDown,
    BatteryLow,
    ReverseWire,
    ChargeError,
    TimeoutFindingHome,
    MowerLocked,
    BatteryOverTemperature,
    Unknown(i64),
}

impl MowerErrorCode {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::NoError,
            1 => Self::Trapped,
            2 => Self::Lifted,
            3 => Self::WireMissing,
            4 => Self::OutsideWire,
            5 => Self::Raining,
            6 => Self::CloseDoorToMow,
            7 => Self::CloseDoorToGoHome,
            8 => Self::BladeMotorBlocked,
            9 => Self::WheelMotorBlocked,
            10 => Self::TrappedTimeout,
            11 => Self::UpsideDown,
            12 => Self::BatteryLow,
            13 => Self::ReverseWire,
            14 => Self::ChargeError,
            15 => Self::TimeoutFindingHome,
            16 => Self::MowerLocked,
            17 => Self::BatteryOverTemperature,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::NoError => 0,
            Self::Trapped => 1,
            Self::Lifted => 2,
            Self::WireMissing => 3,
            Self::OutsideWire => 4,
            Self::Raining => 5,
            Self::CloseDoorToMow => 6,
            Self::CloseDoorToGoHome => 7,
            Self::BladeMotorBlocked => 8,
            Self::WheelMotorBlocked => 9,
            Self::TrappedTimeout => 10,
            Self::UpsideDown => 11,
            Self::BatteryLow => 12,
            Self::ReverseWire => 13,
            Self::ChargeError => 14,
            Self::TimeoutFindingHome => 15,
            Self::MowerLocked => 16,
            Self::BatteryOverTemperature => 17,
            Self::Unknown(code) => code,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoError => "No error",
            Self::Trapped => "Trapped",
            Self::Lifted => "Lifted",
            Self::WireMissing => "Wire missing",
            Self::OutsideWire => "Outside wire",
            Self::Raining => "Raining",
            Self::CloseDoorToMow => "Close door to mow",
            Self::CloseDoorToGoHome => "Close door to go home",
            Self::BladeMotorBlocked => "Blade motor blocked",
            Self::WheelMotorBlocked => "Wheel motor blocked",
            Self::TrappedTimeout => "Trapped timeout",
            Self::UpsideDown => "Upside down",
            Self::BatteryLow => "Battery low",
            Self::ReverseWire => "Reverse wire",
            Self::ChargeError => "Charge error",
            Self::TimeoutFindingHome => "Timeout finding home",
            Self::MowerLocked => "Mower locked",
            Self::BatteryOverTemperature => "Battery over temperature",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for MowerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionCode {
    Start,
    Stop,
    Home,
    ZoneTraining,
    Lock,
    Unlock,
    Restart,
    PauseWhenFollowWire,
    SafeHoming,
}

impl ActionCode {
    pub const ALL: [ActionCode; 9] = [
        Self::Start,
        Self::Stop,
        Self::Home,
        Self::ZoneTraining,
        Self::Lock,
        Self::Unlock,
        Self::Restart,
        Self::PauseWhenFollowWire,
        Self::SafeHoming,
    ];

    pub fn code(self) -> u8 {
        match self {
            Self::Start => 1,
            Self::Stop => 2,
            Self::Home => 3,
            Self::ZoneTraining => 4,
            Self::Lock => 5,
            Self::Unlock => 6,
            Self::Restart => 7,
            Self::PauseWhenFollowWire => 8,
            Self::SafeHoming => 9,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Stop => "STOP",
            Self::Home => "HOME",
            Self::ZoneTraining => "ZONETRAINING",
            Self::Lock => "LOCK",
            Self::Unlock => "UNLOCK",
            Self::Restart => "RESTART",
            Self::PauseWhenFollowWire => "PAUSE_WHEN_FOLLOW_WIRE",
            Self::SafeHoming => "SAFEHOMING",
        }
    }

    /// Lock and unlock are only valid on devices with the lock capability.
    pub fn needs_lock_capability(self) -> bool {
        matches!(self, Self::Lock | Self::Unlock)
    }
}

impl FromStr for ActionCode {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::ALL
                .into_iter()
                .find(|action| i64::from(action.code()) == code)
                .ok_or_else(|| SyncError::out_of_range("action code", code));
        }

        let upper = trimmed.to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == upper)
            .ok_or_else(|| SyncError::malformed("action", format!("unknown action `{trimmed}`")))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduledDayView {
    pub day: &'static str,
    pub enable: bool,
    #[serde(rename = "startHour")]
    pub start_hour: u8,
    #[serde(rename = "startMinute")]
    pub start_minute: u8,
    #[serde(rename = "durationMinutes")]
    pub duration_minutes: u32,
    pub edgecut: bool,
}

/// Read-only view of one device, served to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSnapshot {
    #[serde(rename = "serialNumber")]
    pub serial_number: String,
    pub online: bool,
    #[serde(rename = "lastOnlineCheckEpoch")]
    pub last_online_check_epoch: Option<i64>,
    #[serde(rename = "statusCode")]
    pub status_code: Option<i64>,
    #[serde(rename = "statusDescription")]
    pub status_description: Option<&'static str>,
    #[serde(rename = "errorCode")]
    pub error_code: Option<i64>,
    #[serde(rename = "errorDescription")]
    pub error_description: Option<&'static str>,
    #[serde(rename = "lockSupported")]
    pub lock_supported: bool,
    #[serde(rename = "rainDelaySupported")]
    pub rain_delay_supported: bool,
    #[serde(rename = "multiZoneSupported")]
    pub multi_zone_supported: bool,
    pub enable: bool,
    #[serde(rename = "timeExtension")]
    pub time_extension: i64,
    pub schedule: Vec<ScheduledDayView>,
    #[serde(rename = "zoneMeters")]
    pub zone_meters: [u32; 4],
    #[serde(rename = "zoneAllocations")]
    pub zone_allocations: [u8; 10],
    #[serde(rename = "multiZoneEnable")]
    pub multi_zone_enable: bool,
    #[serde(rename = "zoneOverrideActive")]
    pub zone_override_active: bool,
    #[serde(rename = "batteryLevel")]
    pub battery_level: Option<i64>,
    #[serde(rename = "batteryCharging")]
    pub battery_charging: Option<bool>,
    #[serde(rename = "lastZone")]
    pub last_zone: Option<u8>,
    pub locked: Option<bool>,
    #[serde(rename = "rainDelayMinutes")]
    pub rain_delay_minutes: Option<u32>,
    #[serde(rename = "deviceTime")]
    pub device_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_keeps_raw_code() {
        let status = MowerStatus::from_code(255);
        assert_eq!(status, MowerStatus::Unknown(255));
        assert_eq!(status.code(), 255);
        assert_eq!(status.as_str(), "Unknown");
    }

    #[test]
    fn status_codes_round_trip() {
        for code in (0..=12).chain(30..=34) {
            assert_eq!(MowerStatus::from_code(code).code(), code);
            assert!(!matches!(MowerStatus::from_code(code), MowerStatus::Unknown(_)));
        }
    }

    #[test]
    fn transient_zone_start_statuses() {
        assert!(MowerStatus::Home.is_zone_start_transient());
        assert!(MowerStatus::StartSequence.is_zone_start_transient());
        assert!(MowerStatus::LeavingHome.is_zone_start_transient());
        assert!(MowerStatus::SearchingZone.is_zone_start_transient());
        assert!(!MowerStatus::Mowing.is_zone_start_transient());
        assert!(!MowerStatus::Unknown(255).is_zone_start_transient());
    }

    #[test]
    fn unknown_error_code_is_categorised() {
        assert_eq!(MowerErrorCode::from_code(99), MowerErrorCode::Unknown(99));
        assert_eq!(MowerErrorCode::from_code(12), MowerErrorCode::BatteryLow);
    }

    #[test]
    fn action_parses_names_and_codes() {
        assert_eq!("start".parse::<ActionCode>(), Ok(ActionCode::Start));
        assert_eq!("SAFEHOMING".parse::<ActionCode>(), Ok(ActionCode::SafeHoming));
        assert_eq!("3".parse::<ActionCode>(), Ok(ActionCode::Home));
        assert!(matches!(
            "42".parse::<ActionCode>(),
            Err(SyncError::OutOfRange { .. })
        ));
        assert!(matches!(
            "dance".parse::<ActionCode>(),
            Err(SyncError::MalformedField { .. })
        ));
    }
}

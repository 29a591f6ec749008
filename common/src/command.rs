use serde::Serialize;

use crate::{
    error::SyncError,
    state::{DeviceState, ALLOCATION_COUNT, ZONE_COUNT},
    types::ActionCode,
};

/// Payload that only asks the device to push a fresh status.
pub const POLL_PAYLOAD: &str = "{}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Schedule,
    ZoneMeters,
    Allocations,
    Action(ActionCode),
    RainDelay(u32),
    Poll,
}

#[derive(Debug, Serialize)]
struct ScheduleCommand {
    sc: SchedulePayload,
}

#[derive(Debug, Serialize)]
struct SchedulePayload {
    p: i64,
    d: Vec<(String, u32, u8)>,
}

#[derive(Debug, Serialize)]
struct ZoneMeterCommand {
    mz: [u32; ZONE_COUNT],
}

#[derive(Debug, Serialize)]
struct AllocationCommand {
    mzv: [u8; ALLOCATION_COUNT],
}

#[derive(Debug, Serialize)]
struct ActionCommand {
    cmd: u8,
}

#[derive(Debug, Serialize)]
struct RainDelayCommand {
    rd: u32,
}

impl Command {
    /// Builds the device payload for this command from the fields it needs.
    pub fn encode(&self, state: &DeviceState) -> Result<String, SyncError> {
        let capabilities = state.capabilities();

        match *self {
            Self::Schedule => to_payload(&ScheduleCommand {
                sc: SchedulePayload {
                    p: state.effective_time_extension(),
                    d: state
                        .schedule()
                        .iter()
                        .map(|(_, day)| {
                            (
                                day.start_time(),
                                day.effective_duration(),
                                u8::from(day.edgecut()),
                            )
                        })
                        .collect(),
                },
            }),
            Self::ZoneMeters => {
                if !capabilities.multi_zone {
                    return Err(SyncError::precondition(
                        "multizone is not supported by this device",
                    ));
                }
                to_payload(&ZoneMeterCommand {
                    mz: state.zone_meters(),
                })
            }
            Self::Allocations => {
                if !capabilities.multi_zone {
                    return Err(SyncError::precondition(
                        "multizone is not supported by this device",
                    ));
                }
                to_payload(&AllocationCommand {
                    mzv: state.zone_allocations(),
                })
            }
            Self::Action(action) => {
                if action.needs_lock_capability() && !capabilities.lock {
                    return Err(SyncError::precondition(
                        "lock is not supported by this device",
                    ));
                }
                to_payload(&ActionCommand { cmd: action.code() })
            }
            Self::RainDelay(minutes) => {
                if !capabilities.rain_delay {
                    return Err(SyncError::precondition(
                        "rain delay is not supported by this device",
                    ));
                }
                to_payload(&RainDelayCommand { rd: minutes })
            }
            Self::Poll => Ok(POLL_PAYLOAD.to_string()),
        }
    }
}

fn to_payload<T: Serialize>(command: &T) -> Result<String, SyncError> {
    serde_json::to_string(command)
        .map_err(|err| SyncError::malformed("command", err.to_string()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::{schedule::DayOfWeek, state::Capabilities, telemetry::TelemetryDecoder};

    fn device(capabilities: Capabilities) -> DeviceState {
        DeviceState::new("201923456789", capabilities)
    }

    fn multi_zone() -> Capabilities {
        Capabilities {
            lock: false,
            rain_delay: false,
            multi_zone: true,
        }
    }

    #[test]
    fn schedule_round_trips_byte_for_byte() {
        let days = r#"[["0:00",0,0],["9:05",60,1],["10:30",45,0],["11:00",0,0],["12:15",120,1],["7:00",30,0],["23:59",15,1]]"#;
        let incoming: serde_json::Value =
            serde_json::from_str(&format!(r#"{{"cfg":{{"sc":{{"p":20,"d":{days}}}}}}}"#)).unwrap();

        let mut state = device(multi_zone());
        let report = TelemetryDecoder::new(chrono_tz::UTC).decode(&mut state, &incoming);
        assert!(report.errors.is_empty());

        let encoded = Command::Schedule.encode(&state).unwrap();
        assert_eq!(encoded, format!(r#"{{"sc":{{"p":20,"d":{days}}}}}"#));
    }

    #[test]
    fn disabled_device_sends_disabled_extension() {
        let mut state = device(multi_zone());
        state.set_time_extension(30).unwrap();
        state.set_enable(false);

        let encoded: serde_json::Value =
            serde_json::from_str(&Command::Schedule.encode(&state).unwrap()).unwrap();
        assert_eq!(encoded["sc"]["p"], json!(-100));
        assert_eq!(encoded["sc"]["d"].as_array().map(Vec::len), Some(7));
    }

    #[test]
    fn disabled_day_sends_zero_duration() {
        let mut state = device(multi_zone());
        state
            .update_scheduled_day(DayOfWeek::Tuesday, |day| {
                day.set_hour(8)?;
                day.set_minute(0)?;
                day.set_duration_minutes(90)?;
                day.set_enable(false);
                Ok(())
            })
            .unwrap();

        let encoded: serde_json::Value =
            serde_json::from_str(&Command::Schedule.encode(&state).unwrap()).unwrap();
        assert_eq!(encoded["sc"]["d"][2], json!(["8:00", 0, 0]));
    }

    #[test]
    fn zone_and_allocation_payloads() {
        let mut state = device(multi_zone());
        state.set_zone_meters([10, 20, 30, 40]);
        state.set_allocation(9, 3).unwrap();

        assert_eq!(
            Command::ZoneMeters.encode(&state).unwrap(),
            r#"{"mz":[10,20,30,40]}"#
        );
        assert_eq!(
            Command::Allocations.encode(&state).unwrap(),
            r#"{"mzv":[0,0,0,0,0,0,0,0,0,3]}"#
        );
    }

    #[test]
    fn gated_commands_are_refused() {
        let state = device(Capabilities::default());

        for command in [
            Command::ZoneMeters,
            Command::Allocations,
            Command::RainDelay(60),
            Command::Action(ActionCode::Lock),
            Command::Action(ActionCode::Unlock),
        ] {
            assert!(
                matches!(command.encode(&state), Err(SyncError::PreconditionFailed(_))),
                "{command:?} should be refused"
            );
        }
    }

    #[test]
    fn action_and_poll_payloads() {
        let state = device(Capabilities {
            lock: true,
            rain_delay: true,
            multi_zone: false,
        });

        assert_eq!(
            Command::Action(ActionCode::Start).encode(&state).unwrap(),
            r#"{"cmd":1}"#
        );
        assert_eq!(
            Command::Action(ActionCode::Unlock).encode(&state).unwrap(),
            r#"{"cmd":6}"#
        );
        assert_eq!(
            Command::RainDelay(120).encode(&state).unwrap(),
            r#"{"rd":120}"#
        );
        assert_eq!(Command::Poll.encode(&state).unwrap(), "{}");
    }

    #[test]
    fn encoding_does_not_touch_state() {
        let mut state = device(multi_zone());
        state.set_zone_meters([1, 2, 3, 4]);
        let before = state.clone();

        let first = Command::ZoneMeters.encode(&state).unwrap();
        let second = Command::ZoneMeters.encode(&state).unwrap();

        assert_eq!(first, second);
        assert_eq!(state, before);
    }
}

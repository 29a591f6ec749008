pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod intent;
pub mod schedule;
pub mod state;
pub mod telemetry;
pub mod topics;
pub mod types;
pub mod zone_restore;

pub use command::{Command, POLL_PAYLOAD};
pub use config::{MowerConfig, NetworkConfig, RegistryConfig, RuntimeConfig};
pub use engine::{EngineAction, MowerEngine, TelemetryOutcome};
pub use error::SyncError;
pub use intent::{DayEdit, Intent};
pub use schedule::{DayOfWeek, ScheduledDay, WeekSchedule};
pub use state::{Capabilities, DeviceState, Telemetry};
pub use telemetry::{DecodeReport, FieldValue, StateChange, TelemetryDecoder};
pub use topics::*;
pub use types::{ActionCode, DeviceSnapshot, MowerErrorCode, MowerStatus};
pub use zone_restore::ZoneRestore;

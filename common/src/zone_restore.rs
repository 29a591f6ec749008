use crate::{
    error::SyncError,
    state::{DeviceState, ZONE_COUNT},
    types::MowerStatus,
};

/// Emulates "mow this zone once": every zone meter is pointed at one zone, and the previous
/// meters are put back as soon as the mower reports a status outside the start-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZoneRestore {
    #[default]
    Idle,
    Overridden { saved: [u32; ZONE_COUNT] },
}

impl ZoneRestore {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Overridden { .. })
    }

    pub fn saved_zone_meters(&self) -> Option<[u32; ZONE_COUNT]> {
        match self {
            Self::Idle => None,
            Self::Overridden { saved } => Some(*saved),
        }
    }

    /// `Idle -> Overridden`. Nothing changes when this fails.
    pub fn begin(&mut self, state: &mut DeviceState, zone: usize) -> Result<(), SyncError> {
        if self.is_active() {
            return Err(SyncError::precondition("a zone override is already active"));
        }
        if !state.capabilities().multi_zone {
            return Err(SyncError::precondition(
                "multizone is not supported by this device",
            ));
        }
        if state.status() != Some(MowerStatus::Home) {
            return Err(SyncError::precondition(format!(
                "mower must be at home to start a zone, status is {}",
                state
                    .status()
                    .map(|status| status.to_string())
                    .unwrap_or_else(|| "not yet reported".to_string())
            )));
        }

        let meters = state.zone_meter(zone)?;
        let saved = state.zone_meters();
        state.set_zone_meters([meters; ZONE_COUNT]);
        *self = Self::Overridden { saved };
        Ok(())
    }

    /// Evaluated with the status just committed by the decoder. Returns `true` when the
    /// saved meters were put back.
    pub fn on_status(&mut self, state: &mut DeviceState, status: MowerStatus) -> bool {
        let Self::Overridden { saved } = *self else {
            return false;
        };
        if status.is_zone_start_transient() {
            return false;
        }

        state.set_zone_meters(saved);
        *self = Self::Idle;
        true
    }
}

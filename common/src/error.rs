use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// One telemetry field could not be decoded. The rest of the message is still applied.
    #[error("malformed field `{field}`: {reason}")]
    MalformedField { field: String, reason: String },

    #[error("{what} out of range: {value}")]
    OutOfRange { what: &'static str, value: i64 },

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("registry failure: {0}")]
    RegistryFailure(String),
}

impl SyncError {
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn out_of_range(what: &'static str, value: impl TryInto<i64>) -> Self {
        Self::OutOfRange {
            what,
            value: value.try_into().unwrap_or(i64::MAX),
        }
    }

    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::PreconditionFailed(reason.into())
    }
}

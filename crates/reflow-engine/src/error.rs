use crate::driver::DriverError;
use crate::storage::StorageError;

/// Errors surfaced to the engine's caller. Resolution failures inside a
/// running replay are not errors; they feed the retry policy and, at worst,
/// end the replay in an `Aborted` outcome.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no capture session is active")]
    NotCapturing,

    #[error("no replay is pending or in progress")]
    NotReplaying,

    #[error("a capture session is already active")]
    CaptureInProgress,

    #[error("a replay is in progress")]
    ReplayInProgress,

    #[error("persistence failure: {0}")]
    Persistence(#[from] StorageError),

    #[error("driver failure: {0}")]
    Driver(#[from] DriverError),
}

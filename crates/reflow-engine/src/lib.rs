pub mod driver;
pub mod engine;
pub mod error;
pub mod flows;
pub mod recorder;
pub mod replay;
pub mod session;
pub mod storage;

pub use driver::{DriverError, PageDriver};
pub use engine::{Engine, EngineMode};
pub use error::EngineError;
pub use flows::{FlowCatalog, FlowError};
pub use recorder::{ObservedInteraction, Recorder};
pub use replay::{
    AbortReason, ExhaustionPolicy, PendingReplay, ReplayConfig, ReplayOutcome, ReplayStart,
    Replayer,
};
pub use session::SessionControlState;
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};

pub use reflow_core;

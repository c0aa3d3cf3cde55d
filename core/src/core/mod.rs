pub mod control;
pub mod stage;
pub mod value;

// Re-export key types for easier access from other pipeloop modules (and lib.rs)
pub use control::LoopSignals;
pub use stage::{AsyncStageBody, StageBody, StageDescriptor, StageMode, SyncStageFn};
pub use value::{StageOutcome, StageValue};

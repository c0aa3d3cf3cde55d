// pipeloop/src/pipeline/mod.rs

//! Defines the `Pipeline` struct, its construction, hysteresis table, and the
//! parallel-loop execution logic.

pub mod definition;
pub mod execution;
pub mod hysteresis;
pub mod options;
pub(crate) mod task;

// Re-export the main Pipeline struct
pub use definition::Pipeline;
pub use hysteresis::compute_hysteresis;
pub use options::{RunHandle, RunOptions};

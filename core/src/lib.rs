// src/lib.rs

//! Pipeloop: software-pipelined parallel loops for Rust.
//!
//! A loop body is split into a chain of stages. Pipeloop runs the chain as a
//! continuously overlapping loop: while stage `k` works on iteration `N`, stage
//! `k + 1` can already work on iteration `N - 1`. Features:
//!  - Inline stages that run on the loop driver and blocking or async stages
//!    scheduled onto a tokio runtime.
//!  - Values flowing from producing stages to consuming stages, with the
//!    required iteration lag (hysteresis) computed once per pipeline.
//!  - Two signals: Stopping drains the loop so every stage completes the same
//!    number of iterations, Canceling aborts it.
//!  - Failures from every stage aggregated into a single result.
//!  - Immutable, append-only pipelines and typed fluent builders.

pub mod builder;
pub mod core;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod source;

// --- Re-exports for the Public API ---

pub use crate::core::control::LoopSignals;
pub use crate::core::stage::{AsyncStageBody, StageBody, StageDescriptor, StageMode, SyncStageFn};
pub use crate::core::value::{downcast_value, wrap_value, StageOutcome, StageValue};

pub use crate::pipeline::definition::Pipeline;
pub use crate::pipeline::hysteresis::compute_hysteresis;
pub use crate::pipeline::options::{RunHandle, RunOptions};

pub use crate::builder::{LoopBuilder, ValueLoopBuilder};
pub use crate::source::from_iter;

pub use crate::executor::{StageExecutor, TokioExecutor};

pub use crate::error::{LoopError, LoopResult, StageCanceled, StageFailure};

// The signal type used for Stopping and Canceling.
pub use tokio_util::sync::CancellationToken;

/*
    Core Workflow:
    1. Create a Stopping token (and optionally a Canceling token).
    2. Build the stages, e.g. `LoopBuilder::new().produce_inline(..).map_async(..).consume_inline(..)`,
       or assemble `StageDescriptor`s into a `Pipeline` by hand.
    3. Call `.run(RunOptions::new(stopping).canceling(canceling))` and await the result.
    4. Fire Stopping to let the loop finish the iterations already admitted, or
       Canceling to abandon them.
*/

// pipeloop/src/core/control.rs

//! Defines the two cancellation signals observed by a loop and the conditions
//! that end its wavefront loop.

use tokio_util::sync::CancellationToken;

/// The Stopping and Canceling signals of one run.
///
/// The two are never interchangeable: Stopping drains the loop so every stage
/// completes the same number of invocations, Canceling aborts it as soon as
/// practical.
#[derive(Debug, Clone)]
pub struct LoopSignals {
  pub stopping: CancellationToken,
  pub canceling: CancellationToken,
}

impl LoopSignals {
  pub fn new(stopping: CancellationToken, canceling: CancellationToken) -> Self {
    Self { stopping, canceling }
  }

  pub fn is_stopping(&self) -> bool {
    self.stopping.is_cancelled()
  }

  pub fn is_canceling(&self) -> bool {
    self.canceling.is_cancelled()
  }

  /// A cancellation reported by a stage is recognized only while one of the
  /// loop's own signals has fired.
  pub fn recognizes_cancellation(&self) -> bool {
    self.is_stopping() || self.is_canceling()
  }
}

/// Why the wavefront loop stopped admitting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Termination {
  /// The last stage reached the iteration at which Stopping was observed.
  Stopped,
  /// The Canceling signal was observed after a stage.
  Aborted,
  /// A stage task ended in failure or cancellation.
  StageFault { stage_index: usize },
}

// pipeloop/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

/// Marker error a stage body returns (wrapped in `anyhow::Error`) to report that
/// it was canceled rather than failed.
///
/// Whether that cancellation is tolerated depends on the loop's signals: it is
/// only recognized while the Stopping or the Canceling signal has fired. Otherwise
/// it is reported as `StageFailure::UnexpectedCancellation`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("Stage canceled")]
pub struct StageCanceled;

/// One error collected from a stage while draining a loop.
#[derive(Debug, Error)]
pub enum StageFailure {
  #[error("Stage {stage_index} failed. Source: {source}")]
  Faulted {
    stage_index: usize,
    #[source]
    source: AnyhowError,
  },

  #[error("Stage {stage_index} was canceled by an unrecognized cancellation source")]
  UnexpectedCancellation { stage_index: usize },
}

impl StageFailure {
  pub fn stage_index(&self) -> usize {
    match self {
      StageFailure::Faulted { stage_index, .. } | StageFailure::UnexpectedCancellation { stage_index } => *stage_index,
    }
  }

  /// The error returned by the stage body, if the stage faulted.
  pub fn source_error(&self) -> Option<&AnyhowError> {
    match self {
      StageFailure::Faulted { source, .. } => Some(source),
      StageFailure::UnexpectedCancellation { .. } => None,
    }
  }
}

#[derive(Debug, Error)]
pub enum LoopError {
  #[error("Pipeline has no stages and is not runnable")]
  NotRunnable,

  #[error("Parallel loop was canceled")]
  Canceled,

  #[error("Parallel loop failed with {} stage error(s)", .0.len())]
  Failed(Vec<StageFailure>),

  #[error("Stage {stage_index} expects an input value but none was produced upstream")]
  MissingInput { stage_index: usize },

  #[error("Type mismatch for stage value (expected {expected_type})")]
  TypeMismatch { expected_type: String },

  #[error("Internal pipeloop error: {0}")]
  Internal(String),
}

impl LoopError {
  /// The aggregated stage errors of a failed run. Empty for any other variant.
  pub fn errors(&self) -> &[StageFailure] {
    match self {
      LoopError::Failed(errors) => errors,
      _ => &[],
    }
  }

  pub fn is_canceled(&self) -> bool {
    matches!(self, LoopError::Canceled)
  }
}

pub type LoopResult<T, E = LoopError> = std::result::Result<T, E>;

/// Returns `true` if `err` reports a cancellation (its root cause is `StageCanceled`).
pub(crate) fn is_cancellation(err: &AnyhowError) -> bool {
  err.is::<StageCanceled>() || err.root_cause().is::<StageCanceled>()
}

// pipeloop/src/pipeline/definition.rs

//! Contains the `Pipeline` struct definition and its pure-append construction.

use crate::core::stage::StageDescriptor;
use crate::pipeline::hysteresis::compute_hysteresis;
use std::sync::Arc;

/// An ordered, immutable chain of stages.
///
/// Pipelines only grow through [`Pipeline::append`], which returns a new pipeline
/// and leaves the receiver untouched, so every intermediate pipeline remains
/// independently runnable. A pipeline with zero stages is a valid value but
/// fails when run.
#[derive(Clone)]
pub struct Pipeline {
  pub(crate) stages: Arc<[StageDescriptor]>,
  pub(crate) hysteresis: Arc<[i64]>,
}

impl Pipeline {
  /// Creates an empty pipeline.
  pub fn new() -> Self {
    Self::from_stages(Vec::new())
  }

  /// Creates a pipeline holding exactly `stage`.
  pub fn begin_with(stage: StageDescriptor) -> Self {
    Self::from_stages(vec![stage])
  }

  fn from_stages(stages: Vec<StageDescriptor>) -> Self {
    let hysteresis = compute_hysteresis(&stages);
    Self {
      stages: stages.into(),
      hysteresis: hysteresis.into(),
    }
  }

  /// Returns a new pipeline with `stage` added after the existing stages.
  ///
  /// Copies the stage list; building an n-stage pipeline costs O(n²) overall.
  pub fn append(&self, stage: StageDescriptor) -> Self {
    let mut stages = Vec::with_capacity(self.stages.len() + 1);
    stages.extend(self.stages.iter().cloned());
    stages.push(stage);
    Self::from_stages(stages)
  }

  pub fn len(&self) -> usize {
    self.stages.len()
  }

  pub fn is_empty(&self) -> bool {
    self.stages.is_empty()
  }

  pub fn stages(&self) -> &[StageDescriptor] {
    &self.stages
  }

  /// First iteration at which each stage may run, indexed like `stages()`.
  pub fn hysteresis(&self) -> &[i64] {
    &self.hysteresis
  }
}

impl Default for Pipeline {
  fn default() -> Self {
    Self::new()
  }
}

impl std::fmt::Debug for Pipeline {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Pipeline")
      .field("stages", &self.stages)
      .field("hysteresis", &self.hysteresis)
      .finish()
  }
}

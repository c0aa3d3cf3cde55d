// pipeloop/src/pipeline/hysteresis.rs

//! Computes, per stage, the first iteration at which the stage may run.
//!
//! An inline producer hands its value to a consumer within the same wavefront,
//! so it adds no lag. A scheduled producer's value for iteration N is only
//! awaited when the driver revisits that stage on wavefront N + 1, so the next
//! consuming stage after it must start one iteration later.

use crate::core::stage::{StageDescriptor, StageMode};

/// Builds the hysteresis table for `stages` in a single left-to-right pass.
pub fn compute_hysteresis(stages: &[StageDescriptor]) -> Vec<i64> {
  let mut table = Vec::with_capacity(stages.len());
  let mut depth: i64 = 0;
  let mut pending_bump = false;

  for stage in stages {
    if stage.consumes_value && pending_bump {
      depth += 1;
      pending_bump = false;
    }
    table.push(depth);
    if stage.produces_value && stage.mode() == StageMode::Scheduled {
      pending_bump = true;
    }
  }

  table
}

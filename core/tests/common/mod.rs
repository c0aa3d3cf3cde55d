// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use pipeloop::{CancellationToken, LoopError, LoopResult, StageFailure};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::time::Duration;
use tracing::Level;

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Per-stage invocation counters ---
#[derive(Clone, Debug)]
pub struct StageCounters {
  counts: Arc<Vec<AtomicUsize>>,
}

impl StageCounters {
  pub fn new(num_stages: usize) -> Self {
    Self {
      counts: Arc::new((0..num_stages).map(|_| AtomicUsize::new(0)).collect()),
    }
  }

  pub fn bump(&self, stage: usize) -> usize {
    self.counts[stage].fetch_add(1, Ordering::SeqCst) + 1
  }

  pub fn get(&self, stage: usize) -> usize {
    self.counts[stage].load(Ordering::SeqCst)
  }

  pub fn snapshot(&self) -> Vec<i64> {
    self.counts.iter().map(|c| c.load(Ordering::SeqCst) as i64).collect()
  }

  pub fn assert_all_equal(&self) -> usize {
    let snapshot = self.snapshot();
    assert!(
      snapshot.windows(2).all(|w| w[0] == w[1]),
      "Expected every stage to complete the same number of invocations, got {:?}",
      snapshot
    );
    snapshot[0] as usize
  }
}

// --- Error Type for Stage Bodies ---
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("Test stage failed at value {0}")]
  StageFailed(i64),
}

/// Fires `token` after `delay` from a separate task.
pub fn fire_after(token: CancellationToken, delay: Duration) {
  tokio::spawn(async move {
    tokio::time::sleep(delay).await;
    tracing::debug!(target: "test_signals", "firing signal after {:?}", delay);
    token.cancel();
  });
}

/// Asserts the run failed and returns the failing stage indices, in order.
pub fn failed_stage_indices<T: std::fmt::Debug>(result: &LoopResult<T>) -> Vec<usize> {
  match result {
    Err(LoopError::Failed(errors)) => errors.iter().map(StageFailure::stage_index).collect(),
    other => panic!("Expected LoopError::Failed, got {:?}", other),
  }
}

/// Upper bound on how long a single loop in these tests may take.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(10);

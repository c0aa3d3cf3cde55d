// pipeloop/src/executor.rs

//! The worker pool capability used to run scheduled stages.

use crate::core::value::StageOutcome;
use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Submits scheduled stage work and reports its completion through a `JoinHandle`.
///
/// Implementations must run submitted work concurrently with the caller; the
/// loop driver never blocks on a submission.
pub trait StageExecutor: Send + Sync {
  /// Runs an asynchronous stage invocation.
  fn spawn(&self, task: BoxFuture<'static, StageOutcome>) -> JoinHandle<StageOutcome>;

  /// Runs a synchronous stage invocation on a thread where blocking is acceptable.
  fn spawn_blocking(&self, task: Box<dyn FnOnce() -> StageOutcome + Send + 'static>) -> JoinHandle<StageOutcome>;
}

/// Default executor backed by a tokio runtime.
///
/// Without an explicit handle, work goes to the runtime the loop is running on.
#[derive(Debug, Clone, Default)]
pub struct TokioExecutor {
  handle: Option<Handle>,
}

impl TokioExecutor {
  pub fn new() -> Self {
    Self::default()
  }

  /// Pins all submitted work to the runtime behind `handle`.
  pub fn with_handle(handle: Handle) -> Self {
    Self { handle: Some(handle) }
  }
}

impl StageExecutor for TokioExecutor {
  fn spawn(&self, task: BoxFuture<'static, StageOutcome>) -> JoinHandle<StageOutcome> {
    match &self.handle {
      Some(handle) => handle.spawn(task),
      None => tokio::spawn(task),
    }
  }

  fn spawn_blocking(&self, task: Box<dyn FnOnce() -> StageOutcome + Send + 'static>) -> JoinHandle<StageOutcome> {
    match &self.handle {
      Some(handle) => handle.spawn_blocking(task),
      None => tokio::task::spawn_blocking(task),
    }
  }
}

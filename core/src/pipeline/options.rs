// pipeloop/src/pipeline/options.rs

//! Run configuration for a parallel loop and the handle that resolves when it ends.

use crate::core::control::LoopSignals;
use crate::core::value::StageValue;
use crate::error::{LoopError, LoopResult};
use crate::executor::{StageExecutor, TokioExecutor};
use futures::future::BoxFuture;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Options for one run of a pipeline.
///
/// Only the Stopping signal is required. The Canceling signal defaults to a
/// token nobody else holds, which therefore never fires.
#[derive(Clone)]
pub struct RunOptions {
  pub(crate) signals: LoopSignals,
  pub(crate) execute_on_current_context: bool,
  pub(crate) executor: Arc<dyn StageExecutor>,
}

impl RunOptions {
  pub fn new(stopping: CancellationToken) -> Self {
    Self {
      signals: LoopSignals::new(stopping, CancellationToken::new()),
      execute_on_current_context: false,
      executor: Arc::new(TokioExecutor::new()),
    }
  }

  /// Sets the Canceling signal.
  pub fn canceling(mut self, canceling: CancellationToken) -> Self {
    self.signals.canceling = canceling;
    self
  }

  /// When `true`, the loop driver runs inside the future returned by `run`
  /// instead of being spawned onto the runtime.
  pub fn execute_on_current_context(mut self, on_current_context: bool) -> Self {
    self.execute_on_current_context = on_current_context;
    self
  }

  /// Replaces the executor scheduled stages are submitted to.
  pub fn executor(mut self, executor: Arc<dyn StageExecutor>) -> Self {
    self.executor = executor;
    self
  }

  pub fn signals(&self) -> &LoopSignals {
    &self.signals
  }
}

impl std::fmt::Debug for RunOptions {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RunOptions")
      .field("signals", &self.signals)
      .field("execute_on_current_context", &self.execute_on_current_context)
      .finish_non_exhaustive()
  }
}

/// Completion handle of a running loop.
///
/// Resolves to `Ok(value)` on success (the last stage's final value if it
/// produces one), `Err(LoopError::Canceled)` when canceled, and
/// `Err(LoopError::Failed(..))` with every collected stage error on failure.
/// Dropping a handle of a spawned loop detaches it; it keeps running.
pub struct RunHandle {
  inner: RunHandleInner,
}

enum RunHandleInner {
  Inline(BoxFuture<'static, LoopResult<Option<StageValue>>>),
  Spawned(JoinHandle<LoopResult<Option<StageValue>>>),
}

impl RunHandle {
  pub(crate) fn inline(driver: BoxFuture<'static, LoopResult<Option<StageValue>>>) -> Self {
    Self {
      inner: RunHandleInner::Inline(driver),
    }
  }

  pub(crate) fn spawned(driver: JoinHandle<LoopResult<Option<StageValue>>>) -> Self {
    Self {
      inner: RunHandleInner::Spawned(driver),
    }
  }

  pub(crate) fn resolved(result: LoopResult<Option<StageValue>>) -> Self {
    Self::inline(Box::pin(futures::future::ready(result)))
  }
}

impl Future for RunHandle {
  type Output = LoopResult<Option<StageValue>>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    match &mut self.inner {
      RunHandleInner::Inline(driver) => driver.as_mut().poll(cx),
      RunHandleInner::Spawned(driver) => match Pin::new(driver).poll(cx) {
        Poll::Ready(Ok(result)) => Poll::Ready(result),
        Poll::Ready(Err(join_err)) => Poll::Ready(Err(LoopError::Internal(format!(
          "loop driver terminated abnormally: {join_err}"
        )))),
        Poll::Pending => Poll::Pending,
      },
    }
  }
}

impl std::fmt::Debug for RunHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mode = match self.inner {
      RunHandleInner::Inline(_) => "inline",
      RunHandleInner::Spawned(_) => "spawned",
    };
    f.debug_struct("RunHandle").field("mode", &mode).finish()
  }
}

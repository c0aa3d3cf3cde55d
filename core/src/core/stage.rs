// pipeloop/src/core/stage.rs

//! Defines the immutable descriptor of a single stage within a pipeline.

use super::value::{StageOutcome, StageValue};
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Type alias for a synchronous stage body: optional input in, optional output out.
pub type SyncStageFn = Arc<dyn Fn(Option<StageValue>) -> StageOutcome + Send + Sync + 'static>;

/// An asynchronous stage body.
///
/// `canceling` is the loop's Canceling signal, passed as a cooperative hint. The
/// engine never aborts a running body; a body that gives up early should return
/// `Err(StageCanceled.into())`.
#[async_trait]
pub trait AsyncStageBody: Send + Sync {
  async fn invoke(&self, input: Option<StageValue>, canceling: &CancellationToken) -> StageOutcome;
}

/// Where a stage's invocations run relative to the loop driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageMode {
  /// Runs synchronously on the driver; its result is available in the same wavefront.
  Inline,
  /// Submitted to the executor; its result is awaited on the next wavefront.
  Scheduled,
}

/// How a stage body is invoked.
#[derive(Clone)]
pub enum StageBody {
  /// Synchronous body called directly on the driver.
  Inline(SyncStageFn),
  /// Synchronous body submitted to the executor's blocking pool.
  Blocking(SyncStageFn),
  /// Asynchronous body submitted to the executor.
  Async(Arc<dyn AsyncStageBody>),
}

impl StageBody {
  pub fn mode(&self) -> StageMode {
    match self {
      StageBody::Inline(_) => StageMode::Inline,
      StageBody::Blocking(_) | StageBody::Async(_) => StageMode::Scheduled,
    }
  }
}

/// Immutable description of one link of the pipeline.
#[derive(Clone)]
pub struct StageDescriptor {
  pub(crate) consumes_value: bool,
  pub(crate) produces_value: bool,
  pub(crate) body: StageBody,
}

impl StageDescriptor {
  pub fn new(consumes_value: bool, produces_value: bool, body: StageBody) -> Self {
    Self {
      consumes_value,
      produces_value,
      body,
    }
  }

  pub fn inline(
    consumes_value: bool,
    produces_value: bool,
    body: impl Fn(Option<StageValue>) -> StageOutcome + Send + Sync + 'static,
  ) -> Self {
    Self::new(consumes_value, produces_value, StageBody::Inline(Arc::new(body)))
  }

  pub fn blocking(
    consumes_value: bool,
    produces_value: bool,
    body: impl Fn(Option<StageValue>) -> StageOutcome + Send + Sync + 'static,
  ) -> Self {
    Self::new(consumes_value, produces_value, StageBody::Blocking(Arc::new(body)))
  }

  pub fn asynchronous<F, Fut>(consumes_value: bool, produces_value: bool, body: F) -> Self
  where
    F: Fn(Option<StageValue>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StageOutcome> + Send + 'static,
  {
    Self::new(
      consumes_value,
      produces_value,
      StageBody::Async(Arc::new(AsyncFnBody::new(body))),
    )
  }

  pub fn consumes_value(&self) -> bool {
    self.consumes_value
  }

  pub fn produces_value(&self) -> bool {
    self.produces_value
  }

  pub fn mode(&self) -> StageMode {
    self.body.mode()
  }

  pub fn body(&self) -> &StageBody {
    &self.body
  }
}

// SyncStageFn and dyn AsyncStageBody don't implement Debug.
impl std::fmt::Debug for StageDescriptor {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StageDescriptor")
      .field("consumes_value", &self.consumes_value)
      .field("produces_value", &self.produces_value)
      .field("mode", &self.mode())
      .finish()
  }
}

/// Adapts a closure returning a future into an `AsyncStageBody`.
struct AsyncFnBody<F, Fut>
where
  F: Fn(Option<StageValue>, CancellationToken) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = StageOutcome> + Send + 'static,
{
  inner: F,
  _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut> AsyncFnBody<F, Fut>
where
  F: Fn(Option<StageValue>, CancellationToken) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = StageOutcome> + Send + 'static,
{
  fn new(inner: F) -> Self {
    Self {
      inner,
      _marker: PhantomData,
    }
  }
}

#[async_trait]
impl<F, Fut> AsyncStageBody for AsyncFnBody<F, Fut>
where
  F: Fn(Option<StageValue>, CancellationToken) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = StageOutcome> + Send + 'static,
{
  async fn invoke(&self, input: Option<StageValue>, canceling: &CancellationToken) -> StageOutcome {
    (self.inner)(input, canceling.clone()).await
  }
}

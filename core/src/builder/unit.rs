// pipeloop/src/builder/unit.rs

//! `LoopBuilder`: the builder used while no value flows between stages.

use crate::builder::bodies::{action, async_action, async_producer, producer};
use crate::builder::value::ValueLoopBuilder;
use crate::core::stage::StageDescriptor;
use crate::error::LoopResult;
use crate::pipeline::{Pipeline, RunHandle, RunOptions};
use std::any::Any;
use std::future::Future;

/// Builds a pipeline whose stages so far exchange no value.
///
/// Every method appends one stage and returns a new builder; the receiver is
/// left as it was, so a shared prefix can be extended in several directions.
#[derive(Debug, Clone, Default)]
pub struct LoopBuilder {
  pipeline: Pipeline,
}

impl LoopBuilder {
  /// A builder over the empty pipeline. Running it fails with `NotRunnable`.
  pub fn new() -> Self {
    Self::default()
  }

  pub fn begin_with_inline<F>(f: F) -> Self
  where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
  {
    Self::new().then_inline(f)
  }

  pub fn begin_with_blocking<F>(f: F) -> Self
  where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
  {
    Self::new().then_blocking(f)
  }

  pub fn begin_with_async<F, Fut>(f: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
  {
    Self::new().then_async(f)
  }

  /// Wraps an already built pipeline.
  pub fn from_pipeline(pipeline: Pipeline) -> Self {
    Self { pipeline }
  }

  /// Appends a raw stage descriptor.
  pub fn then_stage(&self, stage: StageDescriptor) -> Self {
    Self::from_pipeline(self.pipeline.append(stage))
  }

  pub fn then_inline<F>(&self, f: F) -> Self
  where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
  {
    self.then_stage(StageDescriptor::inline(false, false, action(f)))
  }

  pub fn then_blocking<F>(&self, f: F) -> Self
  where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
  {
    self.then_stage(StageDescriptor::blocking(false, false, action(f)))
  }

  pub fn then_async<F, Fut>(&self, f: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
  {
    self.then_stage(StageDescriptor::asynchronous(false, false, async_action(f)))
  }

  pub fn produce_inline<R, F>(&self, f: F) -> ValueLoopBuilder<R>
  where
    R: Any + Send + Sync + Clone,
    F: Fn() -> anyhow::Result<R> + Send + Sync + 'static,
  {
    ValueLoopBuilder::from_pipeline(self.pipeline.append(StageDescriptor::inline(false, true, producer(f))))
  }

  pub fn produce_blocking<R, F>(&self, f: F) -> ValueLoopBuilder<R>
  where
    R: Any + Send + Sync + Clone,
    F: Fn() -> anyhow::Result<R> + Send + Sync + 'static,
  {
    ValueLoopBuilder::from_pipeline(self.pipeline.append(StageDescriptor::blocking(false, true, producer(f))))
  }

  pub fn produce_async<R, F, Fut>(&self, f: F) -> ValueLoopBuilder<R>
  where
    R: Any + Send + Sync + Clone,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
  {
    ValueLoopBuilder::from_pipeline(
      self
        .pipeline
        .append(StageDescriptor::asynchronous(false, true, async_producer(f))),
    )
  }

  pub fn pipeline(&self) -> &Pipeline {
    &self.pipeline
  }

  pub fn into_pipeline(self) -> Pipeline {
    self.pipeline
  }

  /// Starts the loop. See [`Pipeline::run`].
  pub fn run(&self, options: RunOptions) -> RunHandle {
    self.pipeline.run(options)
  }

  /// Starts the loop and discards any final value.
  pub fn run_to_completion(&self, options: RunOptions) -> impl Future<Output = LoopResult<()>> + Send + 'static {
    let handle = self.pipeline.run(options);
    async move { handle.await.map(|_| ()) }
  }
}

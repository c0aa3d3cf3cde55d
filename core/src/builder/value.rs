// pipeloop/src/builder/value.rs

//! `ValueLoopBuilder<T>`: the builder used once a stage produces values of type `T`.

use crate::builder::bodies::{
  action, async_action, async_consumer, async_mapper, async_producer, consumer, mapper, producer,
};
use crate::core::stage::StageDescriptor;
use crate::core::value::downcast_value;
use crate::error::LoopResult;
use crate::pipeline::{Pipeline, RunHandle, RunOptions};
use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;

/// Builds a pipeline whose most recent producing stage yields `T`.
///
/// Consuming stages receive the value produced by the nearest producing stage
/// before them in the same iteration. `consume_*` stages leave `T` flowing to
/// later consumers; `map_*` stages replace it with their own output.
///
/// `T` is cloned out of the shared container for each consumer, hence the
/// `Clone` bound.
pub struct ValueLoopBuilder<T> {
  pipeline: Pipeline,
  _value: PhantomData<fn() -> T>,
}

impl<T> Clone for ValueLoopBuilder<T> {
  fn clone(&self) -> Self {
    Self::from_pipeline(self.pipeline.clone())
  }
}

impl<T> std::fmt::Debug for ValueLoopBuilder<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ValueLoopBuilder")
      .field("value_type", &std::any::type_name::<T>())
      .field("pipeline", &self.pipeline)
      .finish()
  }
}

impl<T> ValueLoopBuilder<T> {
  /// Wraps an already built pipeline. The caller vouches that the nearest
  /// producing stage yields `T`.
  pub fn from_pipeline(pipeline: Pipeline) -> Self {
    Self {
      pipeline,
      _value: PhantomData,
    }
  }

  pub fn pipeline(&self) -> &Pipeline {
    &self.pipeline
  }

  pub fn into_pipeline(self) -> Pipeline {
    self.pipeline
  }

  fn next_index(&self) -> usize {
    self.pipeline.len()
  }

  fn append<U>(&self, stage: StageDescriptor) -> ValueLoopBuilder<U> {
    ValueLoopBuilder::from_pipeline(self.pipeline.append(stage))
  }
}

impl<T> ValueLoopBuilder<T>
where
  T: Any + Send + Sync + Clone,
{
  pub fn begin_with_inline<F>(f: F) -> Self
  where
    F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
  {
    Self::from_pipeline(Pipeline::begin_with(StageDescriptor::inline(false, true, producer(f))))
  }

  pub fn begin_with_blocking<F>(f: F) -> Self
  where
    F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
  {
    Self::from_pipeline(Pipeline::begin_with(StageDescriptor::blocking(false, true, producer(f))))
  }

  pub fn begin_with_async<F, Fut>(f: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
  {
    Self::from_pipeline(Pipeline::begin_with(StageDescriptor::asynchronous(
      false,
      true,
      async_producer(f),
    )))
  }

  /// Appends a raw stage descriptor that does not change the flowing type.
  pub fn then_stage(&self, stage: StageDescriptor) -> Self {
    self.append(stage)
  }

  // Independent stages: neither consume nor produce.

  pub fn then_inline<F>(&self, f: F) -> Self
  where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
  {
    self.append(StageDescriptor::inline(false, false, action(f)))
  }

  pub fn then_blocking<F>(&self, f: F) -> Self
  where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
  {
    self.append(StageDescriptor::blocking(false, false, action(f)))
  }

  pub fn then_async<F, Fut>(&self, f: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
  {
    self.append(StageDescriptor::asynchronous(false, false, async_action(f)))
  }

  // Independent producers: ignore `T`, start flowing `R`.

  pub fn produce_inline<R, F>(&self, f: F) -> ValueLoopBuilder<R>
  where
    R: Any + Send + Sync + Clone,
    F: Fn() -> anyhow::Result<R> + Send + Sync + 'static,
  {
    self.append(StageDescriptor::inline(false, true, producer(f)))
  }

  pub fn produce_blocking<R, F>(&self, f: F) -> ValueLoopBuilder<R>
  where
    R: Any + Send + Sync + Clone,
    F: Fn() -> anyhow::Result<R> + Send + Sync + 'static,
  {
    self.append(StageDescriptor::blocking(false, true, producer(f)))
  }

  pub fn produce_async<R, F, Fut>(&self, f: F) -> ValueLoopBuilder<R>
  where
    R: Any + Send + Sync + Clone,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
  {
    self.append(StageDescriptor::asynchronous(false, true, async_producer(f)))
  }

  // Consumers: take `T`, produce nothing.

  pub fn consume_inline<F>(&self, f: F) -> Self
  where
    F: Fn(T) -> anyhow::Result<()> + Send + Sync + 'static,
  {
    self.append(StageDescriptor::inline(true, false, consumer(self.next_index(), f)))
  }

  pub fn consume_blocking<F>(&self, f: F) -> Self
  where
    F: Fn(T) -> anyhow::Result<()> + Send + Sync + 'static,
  {
    self.append(StageDescriptor::blocking(true, false, consumer(self.next_index(), f)))
  }

  pub fn consume_async<F, Fut>(&self, f: F) -> Self
  where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
  {
    self.append(StageDescriptor::asynchronous(
      true,
      false,
      async_consumer(self.next_index(), f),
    ))
  }

  // Transforms: take `T`, produce `R`.

  pub fn map_inline<R, F>(&self, f: F) -> ValueLoopBuilder<R>
  where
    R: Any + Send + Sync + Clone,
    F: Fn(T) -> anyhow::Result<R> + Send + Sync + 'static,
  {
    self.append(StageDescriptor::inline(true, true, mapper(self.next_index(), f)))
  }

  pub fn map_blocking<R, F>(&self, f: F) -> ValueLoopBuilder<R>
  where
    R: Any + Send + Sync + Clone,
    F: Fn(T) -> anyhow::Result<R> + Send + Sync + 'static,
  {
    self.append(StageDescriptor::blocking(true, true, mapper(self.next_index(), f)))
  }

  pub fn map_async<R, F, Fut>(&self, f: F) -> ValueLoopBuilder<R>
  where
    R: Any + Send + Sync + Clone,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
  {
    self.append(StageDescriptor::asynchronous(true, true, async_mapper(self.next_index(), f)))
  }

  /// Starts the loop and returns the untyped handle. See [`Pipeline::run`].
  pub fn run_untyped(&self, options: RunOptions) -> RunHandle {
    self.pipeline.run(options)
  }

  /// Starts the loop.
  ///
  /// Resolves to the last stage's value from the final completed iteration when
  /// the last stage produces one, otherwise to `None`.
  pub fn run(&self, options: RunOptions) -> impl Future<Output = LoopResult<Option<T>>> + Send + 'static {
    let handle = self.pipeline.run(options);
    async move {
      match handle.await? {
        Some(value) => downcast_value::<T>(&value).map(Some),
        None => Ok(None),
      }
    }
  }
}

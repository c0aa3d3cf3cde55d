// pipeloop/src/builder/bodies.rs

//! Adapters from typed user closures to the engine's type-erased stage bodies.

use crate::core::value::{downcast_value, wrap_value, StageOutcome, StageValue};
use crate::error::LoopError;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use tokio_util::sync::CancellationToken;

pub(crate) type AsyncBodyFuture = BoxFuture<'static, StageOutcome>;

/// Pulls the typed input out of the value handed to the stage at `stage_index`.
pub(crate) fn take_input<T>(stage_index: usize, input: Option<StageValue>) -> anyhow::Result<T>
where
  T: Any + Send + Sync + Clone,
{
  let value = input.ok_or(LoopError::MissingInput { stage_index })?;
  Ok(downcast_value::<T>(&value)?)
}

pub(crate) fn action<F>(f: F) -> impl Fn(Option<StageValue>) -> StageOutcome + Send + Sync + 'static
where
  F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
{
  move |_: Option<StageValue>| f().map(|()| None)
}

pub(crate) fn producer<R, F>(f: F) -> impl Fn(Option<StageValue>) -> StageOutcome + Send + Sync + 'static
where
  R: Any + Send + Sync,
  F: Fn() -> anyhow::Result<R> + Send + Sync + 'static,
{
  move |_: Option<StageValue>| f().map(|value| Some(wrap_value(value)))
}

pub(crate) fn consumer<T, F>(stage_index: usize, f: F) -> impl Fn(Option<StageValue>) -> StageOutcome + Send + Sync + 'static
where
  T: Any + Send + Sync + Clone,
  F: Fn(T) -> anyhow::Result<()> + Send + Sync + 'static,
{
  move |input: Option<StageValue>| {
    let value = take_input::<T>(stage_index, input)?;
    f(value).map(|()| None)
  }
}

pub(crate) fn mapper<T, R, F>(stage_index: usize, f: F) -> impl Fn(Option<StageValue>) -> StageOutcome + Send + Sync + 'static
where
  T: Any + Send + Sync + Clone,
  R: Any + Send + Sync,
  F: Fn(T) -> anyhow::Result<R> + Send + Sync + 'static,
{
  move |input: Option<StageValue>| {
    let value = take_input::<T>(stage_index, input)?;
    f(value).map(|output| Some(wrap_value(output)))
  }
}

pub(crate) fn async_action<F, Fut>(
  f: F,
) -> impl Fn(Option<StageValue>, CancellationToken) -> AsyncBodyFuture + Send + Sync + 'static
where
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
  move |_: Option<StageValue>, _: CancellationToken| f().map(|result| result.map(|()| None)).boxed()
}

pub(crate) fn async_producer<R, F, Fut>(
  f: F,
) -> impl Fn(Option<StageValue>, CancellationToken) -> AsyncBodyFuture + Send + Sync + 'static
where
  R: Any + Send + Sync,
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
{
  move |_: Option<StageValue>, _: CancellationToken| f().map(|result| result.map(|value| Some(wrap_value(value)))).boxed()
}

pub(crate) fn async_consumer<T, F, Fut>(
  stage_index: usize,
  f: F,
) -> impl Fn(Option<StageValue>, CancellationToken) -> AsyncBodyFuture + Send + Sync + 'static
where
  T: Any + Send + Sync + Clone,
  F: Fn(T) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
  move |input: Option<StageValue>, _: CancellationToken| match take_input::<T>(stage_index, input) {
    Ok(value) => f(value).map(|result| result.map(|()| None)).boxed(),
    Err(err) => futures::future::ready(Err(err)).boxed(),
  }
}

pub(crate) fn async_mapper<T, R, F, Fut>(
  stage_index: usize,
  f: F,
) -> impl Fn(Option<StageValue>, CancellationToken) -> AsyncBodyFuture + Send + Sync + 'static
where
  T: Any + Send + Sync + Clone,
  R: Any + Send + Sync,
  F: Fn(T) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
{
  move |input: Option<StageValue>, _: CancellationToken| match take_input::<T>(stage_index, input) {
    Ok(value) => f(value).map(|result| result.map(|output| Some(wrap_value(output)))).boxed(),
    Err(err) => futures::future::ready(Err(err)).boxed(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn consumer_reports_missing_input() {
    let body = consumer::<u32, _>(3, |_| Ok(()));
    let err = body(None).unwrap_err();
    assert!(matches!(
      err.downcast_ref::<LoopError>(),
      Some(LoopError::MissingInput { stage_index: 3 })
    ));
  }

  #[test]
  fn mapper_reports_type_mismatch() {
    let body = mapper::<u32, u32, _>(1, |v| Ok(v + 1));
    let err = body(Some(wrap_value("not a number"))).unwrap_err();
    assert!(matches!(err.downcast_ref::<LoopError>(), Some(LoopError::TypeMismatch { .. })));
  }

  #[test]
  fn mapper_wraps_output() {
    let body = mapper::<u32, String, _>(1, |v| Ok(format!("#{v}")));
    let output = body(Some(wrap_value(7u32))).unwrap().unwrap();
    assert_eq!(downcast_value::<String>(&output).unwrap(), "#7");
  }
}

// pipeloop/examples/cancellation.rs

use pipeloop::{
  CancellationToken, LoopBuilder, LoopError, Pipeline, RunOptions, StageCanceled, StageDescriptor, StageOutcome,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

// An endless producer -> slow transform -> consumer loop.
fn ticker(produced: Arc<AtomicU64>, consumed: Arc<AtomicU64>) -> Pipeline {
  LoopBuilder::new()
    .produce_inline(move || Ok(produced.fetch_add(1, Ordering::SeqCst) + 1))
    .map_async(|tick: u64| async move {
      tokio::time::sleep(Duration::from_millis(5)).await;
      Ok(tick * 2)
    })
    .consume_inline(move |_doubled: u64| {
      consumed.fetch_add(1, Ordering::SeqCst);
      Ok(())
    })
    .into_pipeline()
}

#[tokio::main]
async fn main() -> Result<(), LoopError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Stopping: drain, then finish ---");
  let produced = Arc::new(AtomicU64::new(0));
  let consumed = Arc::new(AtomicU64::new(0));
  let stopping = CancellationToken::new();
  let handle = ticker(produced.clone(), consumed.clone()).run(RunOptions::new(stopping.clone()));

  tokio::time::sleep(Duration::from_millis(50)).await;
  stopping.cancel();
  handle.await?;
  info!(
    "Stopped. produced = {}, consumed = {}",
    produced.load(Ordering::SeqCst),
    consumed.load(Ordering::SeqCst)
  );

  info!("--- Canceling: abort as soon as practical ---");
  let produced = Arc::new(AtomicU64::new(0));
  let consumed = Arc::new(AtomicU64::new(0));
  let canceling = CancellationToken::new();
  let options = RunOptions::new(CancellationToken::new()).canceling(canceling.clone());
  let handle = ticker(produced.clone(), consumed.clone()).run(options);

  tokio::time::sleep(Duration::from_millis(50)).await;
  canceling.cancel();
  match handle.await {
    Err(LoopError::Canceled) => info!(
      "Canceled. produced = {}, consumed = {}",
      produced.load(Ordering::SeqCst),
      consumed.load(Ordering::SeqCst)
    ),
    other => info!("Unexpected outcome: {:?}", other),
  }

  info!("--- Async stage cooperating with Canceling ---");
  let canceling = CancellationToken::new();
  let pipeline = Pipeline::begin_with(StageDescriptor::asynchronous(
    false,
    false,
    |_input, canceling: CancellationToken| async move {
      tokio::select! {
        _ = canceling.cancelled() => StageOutcome::Err(StageCanceled.into()),
        _ = tokio::time::sleep(Duration::from_secs(60)) => Ok(None),
      }
    },
  ));
  let handle = pipeline.run(RunOptions::new(CancellationToken::new()).canceling(canceling.clone()));
  canceling.cancel();
  info!("Long-running stage gave up: {:?}", handle.await.err());

  Ok(())
}

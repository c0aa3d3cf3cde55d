// tests/cancellation_tests.rs
mod common;
use common::*;
use pipeloop::{
  CancellationToken, LoopBuilder, LoopError, Pipeline, RunOptions, StageCanceled, StageDescriptor, StageFailure,
  StageOutcome,
};
use serial_test::serial;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// inline -> async -> blocking -> inline, each counting completed invocations.
fn counting_loop(counters: &StageCounters) -> LoopBuilder {
  let (c0, c1, c2, c3) = (counters.clone(), counters.clone(), counters.clone(), counters.clone());
  LoopBuilder::begin_with_inline(move || {
    c0.bump(0);
    Ok(())
  })
  .then_async(move || {
    let c = c1.clone();
    async move {
      sleep(Duration::from_millis(1)).await;
      c.bump(1);
      Ok(())
    }
  })
  .then_blocking(move || {
    std::thread::sleep(Duration::from_millis(1));
    c2.bump(2);
    Ok(())
  })
  .then_inline(move || {
    c3.bump(3);
    Ok(())
  })
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_stopping_drains_to_equal_invocation_counts() {
  setup_tracing();
  let counters = StageCounters::new(4);
  let stopping = CancellationToken::new();
  fire_after(stopping.clone(), Duration::from_millis(40));

  let result = timeout(RUN_TIMEOUT, counting_loop(&counters).run(RunOptions::new(stopping)))
    .await
    .expect("loop timed out");

  assert!(result.is_ok(), "Expected success, got {:?}", result);
  let completed = counters.assert_all_equal();
  assert!(completed > 0);
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_stopping_at_iteration_k_runs_every_stage_k_times() {
  setup_tracing();
  const K: usize = 7;
  let counters = StageCounters::new(3);
  let stopping = CancellationToken::new();
  let (c0, c1, c2) = (counters.clone(), counters.clone(), counters.clone());
  let stop = stopping.clone();

  // A dependent chain, so scheduled stages run behind the first one.
  let builder = LoopBuilder::new()
    .produce_inline(move || {
      if c0.bump(0) == K {
        stop.cancel();
      }
      Ok(c0.get(0))
    })
    .map_async(move |v: usize| {
      let c = c1.clone();
      async move {
        c.bump(1);
        Ok(v)
      }
    })
    .consume_blocking(move |_v: usize| {
      c2.bump(2);
      Ok(())
    });

  let result = timeout(RUN_TIMEOUT, builder.run(RunOptions::new(stopping)))
    .await
    .expect("loop timed out");
  assert!(result.is_ok(), "Expected success, got {:?}", result);
  assert_eq!(counters.assert_all_equal(), K);
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_canceling_resolves_canceled() {
  setup_tracing();
  let counters = StageCounters::new(4);
  let stopping = CancellationToken::new();
  let canceling = CancellationToken::new();
  fire_after(canceling.clone(), Duration::from_millis(30));

  let options = RunOptions::new(stopping).canceling(canceling);
  let result = timeout(RUN_TIMEOUT, counting_loop(&counters).run(options))
    .await
    .expect("loop timed out");

  match result {
    Err(err) => {
      assert!(err.is_canceled(), "Expected LoopError::Canceled, got {:?}", err);
      assert!(err.errors().is_empty());
    }
    Ok(value) => panic!("Expected cancellation, got success {:?}", value),
  }
  assert!(counters.get(0) > 0);
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_canceling_observed_by_stage_body_resolves_canceled() {
  setup_tracing();
  let stopping = CancellationToken::new();
  let canceling = CancellationToken::new();
  fire_after(canceling.clone(), Duration::from_millis(20));

  // The body waits on the token it is handed and reports cancellation.
  let stage = StageDescriptor::asynchronous(false, false, |_input, canceling: CancellationToken| async move {
    tokio::select! {
      _ = canceling.cancelled() => StageOutcome::Err(StageCanceled.into()),
      _ = sleep(Duration::from_millis(2)) => Ok(None),
    }
  });
  let pipeline = Pipeline::begin_with(stage);

  let options = RunOptions::new(stopping).canceling(canceling);
  let result = timeout(RUN_TIMEOUT, pipeline.run(options)).await.expect("loop timed out");
  assert!(matches!(result, Err(LoopError::Canceled)), "got {:?}", result);
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_stage_canceled_by_stopping_resolves_success() {
  setup_tracing();
  let stopping = CancellationToken::new();
  fire_after(stopping.clone(), Duration::from_millis(20));

  // A long-running stage that gives up as soon as Stopping fires.
  let stop = stopping.clone();
  let builder = LoopBuilder::begin_with_inline(|| Ok(())).then_async(move || {
    let stop = stop.clone();
    async move {
      tokio::select! {
        _ = stop.cancelled() => Err(anyhow::Error::from(StageCanceled)),
        _ = sleep(Duration::from_secs(30)) => Ok(()),
      }
    }
  });

  let result = timeout(RUN_TIMEOUT, builder.run(RunOptions::new(stopping)))
    .await
    .expect("loop timed out");
  assert!(result.is_ok(), "Expected success, got {:?}", result);
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_prefired_canceling_runs_nothing() {
  setup_tracing();
  let executed = Arc::new(AtomicBool::new(false));
  let flag = executed.clone();
  let builder = LoopBuilder::begin_with_inline(move || {
    flag.store(true, Ordering::SeqCst);
    Ok(())
  });

  let stopping = CancellationToken::new();
  let canceling = CancellationToken::new();
  canceling.cancel();
  stopping.cancel();

  // Canceling wins over Stopping when both fired before the run.
  let result = builder.run(RunOptions::new(stopping).canceling(canceling)).await;
  assert!(matches!(result, Err(LoopError::Canceled)), "got {:?}", result);
  assert!(!executed.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_prefired_stopping_succeeds_without_running() {
  setup_tracing();
  let executed = Arc::new(AtomicBool::new(false));
  let flag = executed.clone();
  let builder = LoopBuilder::new().produce_async(move || {
    let flag = flag.clone();
    async move {
      flag.store(true, Ordering::SeqCst);
      Ok(1u32)
    }
  });

  let stopping = CancellationToken::new();
  stopping.cancel();

  let result = builder.run(RunOptions::new(stopping)).await;
  assert!(matches!(result, Ok(None)), "got {:?}", result);
  assert!(!executed.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_canceling_during_drain_keeps_canceled_result() {
  setup_tracing();
  let stopping = CancellationToken::new();
  let canceling = CancellationToken::new();

  // Stopping fires first; the scheduled stage then fires Canceling and reports cancellation.
  let stop = stopping.clone();
  let cancel = canceling.clone();
  let builder = LoopBuilder::begin_with_inline(move || {
    stop.cancel();
    Ok(())
  })
  .then_async(move || {
    let cancel = cancel.clone();
    async move {
      cancel.cancel();
      Err::<(), _>(anyhow::Error::from(StageCanceled))
    }
  });

  let result = timeout(RUN_TIMEOUT, builder.run(RunOptions::new(stopping).canceling(canceling)))
    .await
    .expect("loop timed out");
  assert!(matches!(result, Err(LoopError::Canceled)), "got {:?}", result);
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_canceling_with_concurrent_failure_resolves_failed() {
  setup_tracing();
  let stopping = CancellationToken::new();
  let canceling = CancellationToken::new();

  // Both scheduled stages park until Canceling fires. One then fails for real,
  // the other reports cancellation.
  let failing_token = canceling.clone();
  let canceled_token = canceling.clone();
  let builder = LoopBuilder::begin_with_inline(|| Ok(()))
    .then_async(move || {
      let canceling = failing_token.clone();
      async move {
        canceling.cancelled().await;
        Err::<(), _>(anyhow::anyhow!("store rejected the batch after cancel"))
      }
    })
    .then_async(move || {
      let canceling = canceled_token.clone();
      async move {
        canceling.cancelled().await;
        Err::<(), _>(anyhow::Error::from(StageCanceled))
      }
    });

  fire_after(canceling.clone(), Duration::from_millis(20));
  let result = timeout(RUN_TIMEOUT, builder.run(RunOptions::new(stopping).canceling(canceling)))
    .await
    .expect("loop timed out");

  match result {
    Err(LoopError::Failed(errors)) => {
      assert_eq!(errors.len(), 1, "Expected only the real failure, got {:?}", errors);
      assert!(
        matches!(errors[0], StageFailure::Faulted { stage_index: 1, .. }),
        "got {:?}",
        errors[0]
      );
      assert!(!errors
        .iter()
        .any(|e| matches!(e, StageFailure::UnexpectedCancellation { .. })));
    }
    other => panic!("Expected Failed, got {:?}", other),
  }
}

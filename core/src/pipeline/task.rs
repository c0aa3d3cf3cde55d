// pipeloop/src/pipeline/task.rs

//! Starting stage invocations and holding their in-flight handles.
//!
//! Inline and scheduled invocations end up in the same `StageTask` shape, so the
//! run loop and the drain treat both kinds identically.

use crate::core::stage::{StageBody, StageDescriptor, SyncStageFn};
use crate::core::value::{StageOutcome, StageValue};
use crate::error::{is_cancellation, StageCanceled};
use crate::executor::StageExecutor;
use anyhow::anyhow;
use futures::FutureExt;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{event, Level};

/// Marker for a task that ended in failure or cancellation. The outcome itself
/// stays in the task until the drain collects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TaskFaulted;

enum TaskState {
  Pending(JoinHandle<StageOutcome>),
  Done(StageOutcome),
}

/// The single in-flight (or most recently finished) invocation of one stage.
pub(crate) struct StageTask {
  state: TaskState,
}

impl StageTask {
  fn done(outcome: StageOutcome) -> Self {
    Self {
      state: TaskState::Done(outcome),
    }
  }

  fn pending(handle: JoinHandle<StageOutcome>) -> Self {
    Self {
      state: TaskState::Pending(handle),
    }
  }

  /// Returns `true` if the task has already finished in failure or cancellation.
  /// Never waits.
  pub(crate) fn has_faulted(&mut self) -> bool {
    if let TaskState::Pending(handle) = &mut self.state {
      if !handle.is_finished() {
        return false;
      }
      // May yield `None` once the coop budget is spent; the fault then surfaces at the next settle.
      if let Some(joined) = handle.now_or_never() {
        self.state = TaskState::Done(outcome_from_join(joined));
      }
    }
    matches!(self.state, TaskState::Done(Err(_)))
  }

  /// Waits for the task to finish, keeps its outcome, and returns its value.
  /// Inline tasks are created settled, so this never suspends for them.
  pub(crate) async fn settle(&mut self) -> Result<Option<StageValue>, TaskFaulted> {
    let outcome = match std::mem::replace(&mut self.state, TaskState::Done(Ok(None))) {
      TaskState::Pending(handle) => outcome_from_join(handle.await),
      TaskState::Done(outcome) => outcome,
    };
    let settled = match &outcome {
      Ok(value) => Ok(value.clone()),
      Err(_) => Err(TaskFaulted),
    };
    self.state = TaskState::Done(outcome);
    settled
  }

  /// Waits for the task to finish and hands out its outcome.
  pub(crate) async fn join(self) -> StageOutcome {
    match self.state {
      TaskState::Pending(handle) => outcome_from_join(handle.await),
      TaskState::Done(outcome) => outcome,
    }
  }
}

/// Starts one invocation of `stage`.
///
/// Inline bodies run right here on the driver and come back already settled.
/// Scheduled bodies are submitted to `executor`; if `canceling` has fired by
/// the time the executor picks them up, they complete as canceled without
/// running.
pub(crate) fn start_stage(
  stage: &StageDescriptor,
  input: Option<StageValue>,
  canceling: &CancellationToken,
  executor: &dyn StageExecutor,
) -> StageTask {
  let input = if stage.consumes_value { input } else { None };

  match &stage.body {
    StageBody::Inline(body) => StageTask::done(invoke_sync(body, input)),
    StageBody::Blocking(body) => {
      let body = body.clone();
      let canceling = canceling.clone();
      StageTask::pending(executor.spawn_blocking(Box::new(move || {
        if canceling.is_cancelled() {
          return Err(StageCanceled.into());
        }
        invoke_sync(&body, input)
      })))
    }
    StageBody::Async(body) => {
      let body = body.clone();
      let canceling = canceling.clone();
      StageTask::pending(executor.spawn(
        async move {
          if canceling.is_cancelled() {
            return Err(StageCanceled.into());
          }
          body.invoke(input, &canceling).await
        }
        .boxed(),
      ))
    }
  }
}

fn invoke_sync(body: &SyncStageFn, input: Option<StageValue>) -> StageOutcome {
  match catch_unwind(AssertUnwindSafe(|| body(input))) {
    Ok(outcome) => outcome,
    Err(payload) => {
      let message = panic_message(payload.as_ref());
      event!(Level::ERROR, panic = %message, "Stage body panicked.");
      Err(anyhow!("Stage body panicked: {message}"))
    }
  }
}

fn outcome_from_join(joined: Result<StageOutcome, JoinError>) -> StageOutcome {
  match joined {
    Ok(outcome) => {
      if let Err(err) = &outcome {
        if !is_cancellation(err) {
          event!(Level::DEBUG, error = %err, "Scheduled stage invocation failed.");
        }
      }
      outcome
    }
    // Only the executor can cancel a scheduled task (e.g. runtime shutdown).
    Err(join_err) if join_err.is_cancelled() => Err(StageCanceled.into()),
    Err(join_err) => {
      let message = panic_message(join_err.into_panic().as_ref());
      event!(Level::ERROR, panic = %message, "Scheduled stage body panicked.");
      Err(anyhow!("Stage body panicked: {message}"))
    }
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    (*message).to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "non-string panic payload".to_string()
  }
}

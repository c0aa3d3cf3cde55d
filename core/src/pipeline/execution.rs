// pipeloop/src/pipeline/execution.rs

//! Contains `Pipeline::run()`: the wavefront loop that drives the stages as a
//! software-pipelined loop, and the drain that resolves the run once the loop
//! stops admitting work.

use crate::core::control::{LoopSignals, Termination};
use crate::core::stage::StageMode;
use crate::core::value::StageValue;
use crate::error::{is_cancellation, LoopError, LoopResult, StageFailure};
use crate::executor::StageExecutor;
use crate::pipeline::definition::Pipeline;
use crate::pipeline::options::{RunHandle, RunOptions};
use crate::pipeline::task::{start_stage, StageTask};
use futures::future::join_all;
use futures::FutureExt;
use std::sync::Arc;
use tracing::{event, instrument, span, Instrument, Level};

impl Pipeline {
  /// Starts running the pipeline as a parallel loop.
  ///
  /// Each stage runs sequentially with respect to itself, and concurrently with
  /// the other stages' invocations for neighbouring iterations. The loop ends
  /// when the Stopping signal fires (after every stage has completed the same
  /// number of invocations), when the Canceling signal fires, or when a stage
  /// fails.
  ///
  /// Unless `execute_on_current_context` is set, the driver is spawned and this
  /// must be called from within a tokio runtime.
  pub fn run(&self, options: RunOptions) -> RunHandle {
    if self.stages.is_empty() {
      event!(Level::ERROR, "Pipeline with no stages cannot run.");
      return RunHandle::resolved(Err(LoopError::NotRunnable));
    }
    if options.signals.is_canceling() {
      event!(Level::DEBUG, "Canceling signal already fired; loop not started.");
      return RunHandle::resolved(Err(LoopError::Canceled));
    }
    if options.signals.is_stopping() {
      event!(Level::DEBUG, "Stopping signal already fired; loop not started.");
      return RunHandle::resolved(Ok(None));
    }

    let run_span = span!(
      Level::INFO,
      "parallel_loop",
      num_stages = self.stages.len(),
      on_current_context = options.execute_on_current_context
    );
    let driver = LoopDriver::new(self.clone(), options.signals, options.executor);
    let driver_fut = driver.run().instrument(run_span);

    if options.execute_on_current_context {
      RunHandle::inline(driver_fut.boxed())
    } else {
      RunHandle::spawned(tokio::spawn(driver_fut))
    }
  }
}

/// Per-run state: one task slot per stage.
struct LoopDriver {
  pipeline: Pipeline,
  signals: LoopSignals,
  executor: Arc<dyn StageExecutor>,
  tasks: Vec<Option<StageTask>>,
}

impl LoopDriver {
  fn new(pipeline: Pipeline, signals: LoopSignals, executor: Arc<dyn StageExecutor>) -> Self {
    let tasks = (0..pipeline.len()).map(|_| None).collect();
    Self {
      pipeline,
      signals,
      executor,
      tasks,
    }
  }

  async fn run(mut self) -> LoopResult<Option<StageValue>> {
    event!(Level::DEBUG, hysteresis = ?self.pipeline.hysteresis(), "Parallel loop starting.");
    let termination = self.drive().await;
    self.drain(termination).await
  }

  /// Runs wavefronts until a termination condition is raised.
  async fn drive(&mut self) -> Termination {
    let stages = self.pipeline.stages.clone();
    let hysteresis = self.pipeline.hysteresis.clone();
    let last_index = stages.len() - 1;

    let mut iteration: i64 = -1;
    // First iteration that must not be admitted; set once, when Stopping is observed.
    let mut cancel_at: i64 = i64::MAX;

    loop {
      // A pipeline of inline stages never suspends otherwise.
      tokio::task::yield_now().await;
      iteration += 1;
      event!(Level::TRACE, iteration, "Wavefront starting.");
      let mut latest: Option<StageValue> = None;

      for (stage_index, stage) in stages.iter().enumerate() {
        let lag = hysteresis[stage_index];
        if iteration < lag {
          break;
        }

        // Deferred join: the task held in this slot was started one wavefront ago.
        let mut fresh: Option<StageValue> = None;
        if stage.mode() == StageMode::Scheduled {
          if let Some(task) = self.tasks[stage_index].as_mut() {
            match task.settle().await {
              Ok(value) => fresh = value,
              Err(_) => return Termination::StageFault { stage_index },
            }
          }
        }

        if stage_index == 0 && cancel_at == i64::MAX && self.signals.is_stopping() {
          cancel_at = iteration;
          event!(Level::DEBUG, iteration, "Stopping observed; no further iterations will be admitted.");
        }

        // A failure anywhere pre-empts starting new work.
        if let Some(faulted_index) = self.first_faulted_task() {
          return Termination::StageFault {
            stage_index: faulted_index,
          };
        }

        if iteration - lag < cancel_at {
          let mut task = start_stage(stage, latest.clone(), &self.signals.canceling, self.executor.as_ref());
          if stage.mode() == StageMode::Inline {
            let settled = task.settle().await;
            self.tasks[stage_index] = Some(task);
            match settled {
              Ok(value) => fresh = value,
              Err(_) => return Termination::StageFault { stage_index },
            }
          } else {
            self.tasks[stage_index] = Some(task);
          }
        }

        if stage.produces_value && fresh.is_some() {
          latest = fresh;
        }

        if stage_index == last_index && iteration - lag >= cancel_at {
          event!(Level::DEBUG, iteration, "All admitted iterations completed; stopping.");
          return Termination::Stopped;
        }

        if self.signals.is_canceling() {
          event!(Level::DEBUG, iteration, stage_index, "Canceling observed; aborting.");
          return Termination::Aborted;
        }
      }
    }
  }

  fn first_faulted_task(&mut self) -> Option<usize> {
    self
      .tasks
      .iter_mut()
      .position(|task| task.as_mut().is_some_and(StageTask::has_faulted))
  }

  /// Awaits every stored task and resolves the run.
  #[instrument(name = "parallel_loop_drain", skip(self))]
  async fn drain(self, termination: Termination) -> LoopResult<Option<StageValue>> {
    let LoopDriver {
      pipeline,
      signals,
      tasks,
      ..
    } = self;
    let last_index = pipeline.len() - 1;
    let last_produces = pipeline.stages[last_index].produces_value;

    let outcomes = join_all(
      tasks
        .into_iter()
        .enumerate()
        .filter_map(|(stage_index, task)| task.map(|task| async move { (stage_index, task.join().await) })),
    )
    .await;

    let mut failures = Vec::new();
    let mut canceled = false;
    let mut final_value = None;

    for (stage_index, outcome) in outcomes {
      match outcome {
        Ok(value) => {
          if stage_index == last_index && last_produces {
            final_value = value;
          }
        }
        Err(err) if is_cancellation(&err) => {
          if signals.recognizes_cancellation() {
            canceled = true;
          } else {
            event!(Level::WARN, stage_index, "Stage canceled by an unrecognized source; reporting as failure.");
            failures.push(StageFailure::UnexpectedCancellation { stage_index });
          }
        }
        Err(source) => {
          event!(Level::ERROR, stage_index, error = %source, "Stage failed.");
          failures.push(StageFailure::Faulted { stage_index, source });
        }
      }
    }

    if !failures.is_empty() {
      event!(Level::DEBUG, error_count = failures.len(), "Parallel loop failed.");
      return Err(LoopError::Failed(failures));
    }

    if canceled {
      // Stopping means drain-then-stop, so a cancellation it caused is not an error.
      if signals.is_stopping() && !signals.is_canceling() {
        event!(Level::DEBUG, "Stage cancellation attributed to Stopping; loop completed.");
        return Ok(final_value);
      }
      event!(Level::DEBUG, "Parallel loop canceled.");
      return Err(LoopError::Canceled);
    }

    match termination {
      Termination::Stopped => {
        event!(Level::DEBUG, "Parallel loop completed.");
        Ok(final_value)
      }
      Termination::Aborted => {
        event!(Level::DEBUG, "Parallel loop canceled.");
        Err(LoopError::Canceled)
      }
      Termination::StageFault { stage_index } => {
        event!(Level::ERROR, stage_index, "Stage reported as faulted but drained cleanly.");
        Err(LoopError::Internal(format!(
          "stage {stage_index} was reported faulted but every task completed successfully"
        )))
      }
    }
  }
}

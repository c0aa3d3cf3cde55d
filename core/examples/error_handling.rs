// pipeloop/examples/error_handling.rs

use pipeloop::{from_iter, CancellationToken, LoopError, RunOptions, StageFailure};
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
enum RecordError {
  #[error("record {0} is malformed")]
  Malformed(u32),
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Error Handling Example ---");

  let stopping = CancellationToken::new();
  let builder = from_iter(1..=100u32, stopping.clone())
    .map_async(|id: u32| async move {
      if id == 7 {
        return Err(anyhow::Error::from(RecordError::Malformed(id)));
      }
      Ok(id)
    })
    .map_blocking(|id: u32| {
      anyhow::ensure!(id != 6, "checksum mismatch for record {}", id);
      Ok(id)
    })
    .consume_inline(|id: u32| {
      info!("Processed record {}", id);
      Ok(())
    });

  // Every stage that failed before the loop drained is reported, not just the first.
  match builder.run(RunOptions::new(stopping)).await {
    Ok(_) => info!("All records processed."),
    Err(LoopError::Failed(failures)) => {
      for failure in &failures {
        match failure {
          StageFailure::Faulted { stage_index, source } => {
            let malformed = source.downcast_ref::<RecordError>().is_some();
            error!("Stage {} failed (malformed record: {}): {:#}", stage_index, malformed, source);
          }
          StageFailure::UnexpectedCancellation { stage_index } => {
            error!("Stage {} was canceled unexpectedly", stage_index);
          }
        }
      }
    }
    Err(other) => error!("Loop did not complete: {}", other),
  }
}

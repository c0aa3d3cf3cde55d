// pipeloop/examples/basic_loop.rs

use pipeloop::{from_iter, CancellationToken, LoopError, RunOptions};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), LoopError> {
  // Initialize tracing (optional, for demonstration)
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Basic Loop Example ---");

  // 1. The Stopping signal. `from_iter` fires it as it hands out the last line.
  let stopping = CancellationToken::new();

  let lines = vec!["alpha", "beta", "gamma", "delta", "epsilon"];

  // 2. Chain the stages. Each stage runs one invocation at a time, but the
  //    stages overlap: while "fetch" works on line N, "parse" already works
  //    on line N - 1.
  let builder = from_iter(lines.into_iter(), stopping.clone())
    .map_async(|line: &'static str| async move {
      // Pretend to fetch something for this line.
      tokio::time::sleep(Duration::from_millis(20)).await;
      Ok(format!("{line}:{}", line.len()))
    })
    .map_inline(|fetched: String| {
      let (name, len) = fetched.split_once(':').unwrap_or((fetched.as_str(), "0"));
      Ok((name.to_uppercase(), len.parse::<usize>()?))
    })
    .consume_blocking(|(name, len): (String, usize)| {
      info!("Stored {} ({} bytes)", name, len);
      Ok(())
    })
    .map_inline(|(_, len): (String, usize)| Ok(len));

  info!(
    "Pipeline has {} stages, hysteresis {:?}",
    builder.pipeline().len(),
    builder.pipeline().hysteresis()
  );

  // 3. Run until the input is exhausted.
  let last_len = builder.run(RunOptions::new(stopping)).await?;
  info!("Loop completed. Length of the last line: {:?}", last_len);

  Ok(())
}

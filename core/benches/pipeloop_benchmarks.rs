use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pipeloop::{
  compute_hysteresis, from_iter, CancellationToken, Pipeline, RunOptions, StageDescriptor, StageOutcome,
  ValueLoopBuilder,
};
use tokio::runtime::Runtime; // To run async code within Criterion

const ITEMS: u64 = 1_000;

// --- Helper: loop over ITEMS values through `num_stages` transform stages ---
fn build_chain(num_stages: usize, scheduled_every: usize) -> (ValueLoopBuilder<u64>, RunOptions) {
  let stopping = CancellationToken::new();
  let mut builder = from_iter(0..ITEMS, stopping.clone());
  for i in 0..num_stages {
    builder = if scheduled_every > 0 && i % scheduled_every == 0 {
      builder.map_async(|v: u64| async move { Ok(v.wrapping_add(1)) })
    } else {
      builder.map_inline(|v: u64| Ok(v.wrapping_add(1)))
    };
  }
  (builder, RunOptions::new(stopping))
}

// --- Benchmark Functions ---

fn bench_inline_chain(c: &mut Criterion) {
  let mut group = c.benchmark_group("InlineChain");
  let rt = Runtime::new().unwrap();

  for num_stages in [1, 5, 10].iter() {
    group.throughput(Throughput::Elements(ITEMS * *num_stages as u64));
    group.bench_with_input(BenchmarkId::from_parameter(num_stages), num_stages, |b, &num_stages| {
      b.to_async(&rt).iter_batched(
        || build_chain(num_stages, 0),
        |(builder, options)| async move { builder.run(options).await.unwrap() },
        criterion::BatchSize::SmallInput,
      );
    });
  }
  group.finish();
}

fn bench_mixed_chain(c: &mut Criterion) {
  let mut group = c.benchmark_group("MixedChain");
  let rt = Runtime::new().unwrap();

  for num_stages in [2, 6, 10].iter() {
    for scheduled_every in [1, 2].iter() {
      group.throughput(Throughput::Elements(ITEMS * *num_stages as u64));
      group.bench_with_input(
        BenchmarkId::new(format!("{}stages", num_stages), format!("every{}", scheduled_every)),
        &(*num_stages, *scheduled_every),
        |b, &(num_stages, scheduled_every)| {
          b.to_async(&rt).iter_batched(
            || build_chain(num_stages, scheduled_every),
            |(builder, options)| async move { builder.run(options).await.unwrap() },
            criterion::BatchSize::SmallInput,
          );
        },
      );
    }
  }
  group.finish();
}

fn bench_pipeline_construction(c: &mut Criterion) {
  let mut group = c.benchmark_group("PipelineConstruction");

  let stage = |i: usize| {
    if i % 2 == 0 {
      StageDescriptor::inline(true, true, |input| Ok(input))
    } else {
      StageDescriptor::asynchronous(true, true, |input, _| async move { StageOutcome::Ok(input) })
    }
  };

  for num_stages in [10, 100, 300].iter() {
    group.bench_with_input(BenchmarkId::new("append", num_stages), num_stages, |b, &num_stages| {
      b.iter(|| {
        let mut pipeline = Pipeline::new();
        for i in 0..num_stages {
          pipeline = pipeline.append(stage(i));
        }
        criterion::black_box(pipeline.len())
      })
    });

    let stages: Vec<StageDescriptor> = (0..*num_stages).map(stage).collect();
    group.bench_with_input(BenchmarkId::new("hysteresis", num_stages), &stages, |b, stages| {
      b.iter(|| criterion::black_box(compute_hysteresis(stages)))
    });
  }
  group.finish();
}

criterion_group!(benches, bench_inline_chain, bench_mixed_chain, bench_pipeline_construction);
criterion_main!(benches);

//! Benchmarks for planning and pipeline execution.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use typeline::prelude::*;

struct Keys {
    slots: Vec<Key<u64>>,
}

fn keys(width: usize) -> Keys {
    Keys {
        slots: (0..width).map(|i| create_key(format!("slot-{i}"))).collect(),
    }
}

/// A chain of fan-outs: step `i` requires slot `i / 2` and provides slot `i`.
fn fan_out(width: usize) -> Vec<StepFactory<Keys>> {
    (0..width)
        .map(|i| {
            define_step(move |k: &Keys| {
                let slot = k.slots[i].clone();
                let mut step = Step::from_fn(format!("step-{i}"), move |store| {
                    store.set(&slot, i as u64);
                    Ok(())
                })
                .provides(&k.slots[i]);
                if i > 0 {
                    step = step.requires(&k.slots[i / 2]);
                }
                step
            })
        })
        .collect()
}

fn plan_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");
    for width in [16, 128, 512] {
        let keys = keys(width);
        let factories = fan_out(width);
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            b.iter(|| black_box(plan(&keys, &factories).map(|p| p.level_count())));
        });
    }
    group.finish();
}

fn run_benchmark(c: &mut Criterion) {
    let Ok(runtime) = tokio::runtime::Runtime::new() else {
        return;
    };
    let width = 128;
    let pipeline = create_pipeline(keys(width));
    let Ok(entries) = optimize(pipeline.keys(), &fan_out(width)) else {
        return;
    };

    c.bench_function("run_optimized_fan_out", |b| {
        b.iter(|| runtime.block_on(async { black_box(pipeline.run(&entries).await.is_ok()) }));
    });
}

criterion_group!(benches, plan_benchmark, run_benchmark);
criterion_main!(benches);

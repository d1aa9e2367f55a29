//! # Relay Publish Benchmarks
//!
//! | Path | Target |
//! |------|--------|
//! | publish, one listener, queue drained | < 5µs per message |
//! | publish rejected by type check | < 1µs |
//! | publish, N concurrent publishers | scales with cores |

// Allow excessive nesting in benchmark code
#![allow(clippy::excessive_nesting)]

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use relay_bus::{payload_types, AsyncFnListener, BusConfig, Envelope, Registry};
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
struct Tick {
    value: u64,
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .expect("runtime")
}

fn quiet_registry() -> Arc<Registry> {
    Arc::new(Registry::with_config(BusConfig::default().with_verbose(false)))
}

/// Registry with one channel drained by a no-op async listener.
fn drained_channel(rt: &Runtime, name: &str, capacity: usize) -> Arc<Registry> {
    let registry = quiet_registry();
    registry
        .init_channel(name, capacity, payload_types![Tick])
        .expect("init");
    rt.block_on(async {
        registry
            .subscribe(
                name,
                Duration::from_millis(300),
                AsyncFnListener::new(|_env: Envelope| async { false }),
            )
            .expect("subscribe");
    });
    registry
}

fn bench_single_publisher(c: &mut Criterion) {
    let rt = runtime();
    let registry = drained_channel(&rt, "bench", 1 << 16);

    let mut group = c.benchmark_group("publish");
    group.throughput(Throughput::Elements(1));
    group.bench_function("accepted", |b| {
        let mut value = 0_u64;
        b.iter(|| {
            value += 1;
            // Full is possible if the listener falls behind; still measured.
            black_box(registry.publish("bench", Tick { value }).is_ok())
        })
    });
    group.bench_function("type_rejected", |b| {
        b.iter(|| black_box(registry.publish("bench", black_box(1_u8)).is_err()))
    });
    group.bench_function("not_found", |b| {
        b.iter(|| black_box(registry.publish("missing", Tick { value: 0 }).is_err()))
    });
    group.finish();

    rt.block_on(registry.shutdown());
}

fn bench_concurrent_publishers(c: &mut Criterion) {
    let rt = runtime();
    let registry = drained_channel(&rt, "shared", 1 << 16);

    let mut group = c.benchmark_group("publish_concurrent");
    for publishers in [1_u64, 2, 4, 8] {
        const PER_TASK: u64 = 256;
        group.throughput(Throughput::Elements(publishers * PER_TASK));
        group.bench_with_input(
            BenchmarkId::from_parameter(publishers),
            &publishers,
            |b, &publishers| {
                b.to_async(&rt).iter(|| {
                    let registry = Arc::clone(&registry);
                    async move {
                        let tasks = (0..publishers).map(|_| {
                            let registry = Arc::clone(&registry);
                            tokio::spawn(async move {
                                let mut accepted = 0_u64;
                                for value in 0..PER_TASK {
                                    if registry.publish("shared", Tick { value }).is_ok() {
                                        accepted += 1;
                                    }
                                }
                                accepted
                            })
                        });
                        black_box(futures::future::join_all(tasks).await)
                    }
                })
            },
        );
    }
    group.finish();

    rt.block_on(registry.shutdown());
}

criterion_group!(benches, bench_single_publisher, bench_concurrent_publishers);
criterion_main!(benches);

//! Throughput benchmarks for Courier.
//!
//! These benchmarks measure notification fan-out across the star and the
//! raw cost of the routing tables.

use courier_bench::{bind_counter, payload, wait_for, BenchStar};
use courier_core::{HandlerResult, Notification, RequestCorrelator, SubscriptionRegistry};
use courier_transport::PeerId;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Runtime;

/// Benchmark subscription table operations.
fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");

    group.bench_function("subscribe", |b| {
        let registry = SubscriptionRegistry::new();
        let mut i = 0u64;
        b.iter(|| {
            let channel = format!("channel:{}", i);
            i += 1;
            let _ = registry.subscribe_notification(&channel, |_n: Notification| async {
                HandlerResult::Ok(())
            });
        });
    });

    // Setup: 1000 bound channels
    let registry = SubscriptionRegistry::new();
    for i in 0..1000 {
        let channel = format!("channel:{}", i);
        let _ = registry.subscribe_notification(&channel, |_n: Notification| async {
            HandlerResult::Ok(())
        });
    }

    group.bench_function("lookup", |b| {
        let mut i = 0;
        b.iter(|| {
            let channel = format!("channel:{}", i % 1000);
            i += 1;
            registry.notification_handler(black_box(&channel)).is_some()
        });
    });

    group.finish();
}

/// Benchmark request correlation without a network.
fn bench_correlator(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlator");
    let correlator = RequestCorrelator::new();
    let peer = PeerId::new("peer");
    let body = payload(64);

    group.bench_function("create_resolve", |b| {
        b.iter(|| {
            let (id, pending) = correlator.create_pending(peer.clone());
            correlator.resolve(id, body.clone()).unwrap();
            black_box(pending)
        });
    });

    group.bench_function("create_cancel", |b| {
        b.iter(|| {
            let (id, _pending) = correlator.create_pending(peer.clone());
            correlator.cancel(black_box(id))
        });
    });

    group.finish();
}

/// Benchmark notification fan-out from the hub to every spoke.
fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout");
    let rt = Runtime::new().unwrap();
    let body = payload(64);

    for size in [1usize, 10, 100].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let count = Arc::new(AtomicUsize::new(0));
            let star = rt.block_on(async {
                let star = BenchStar::new(size);
                for spoke in &star.spokes {
                    bind_counter(spoke, "broadcast", &count);
                }
                star
            });

            b.iter_custom(|iters| {
                rt.block_on(async {
                    let target = count.load(Ordering::Relaxed) + iters as usize * size;
                    let start = Instant::now();
                    for _ in 0..iters {
                        star.hub.notify("broadcast", body.clone()).await.unwrap();
                    }
                    wait_for(&count, target).await;
                    start.elapsed()
                })
            });

            star.shutdown();
        });
    }

    group.finish();
}

criterion_group!(benches, bench_registry, bench_correlator, bench_fanout);
criterion_main!(benches);

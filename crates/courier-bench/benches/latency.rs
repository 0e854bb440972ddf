//! Latency benchmarks for Courier.
//!
//! These benchmarks measure request round trips through the star network.

use courier_bench::{bind_echo, payload, BenchStar};
use courier_protocol::{codec, Envelope};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Instant;
use tokio::runtime::Runtime;

/// Benchmark round-trip encode/decode latency.
fn bench_codec_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_roundtrip");

    let envelope = Envelope::request(42, "test:channel", vec![0u8; 256]);

    group.bench_function("256B", |b| {
        b.iter(|| {
            let encoded = codec::encode(black_box(&envelope)).unwrap();
            codec::decode(black_box(&encoded)).unwrap()
        });
    });

    group.finish();
}

/// Benchmark request/response round trips.
fn bench_request_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_latency");
    let rt = Runtime::new().unwrap();
    let star = rt.block_on(async {
        let star = BenchStar::new(2);
        bind_echo(&star.hub, "echo");
        bind_echo(&star.spokes[1], "echo");
        star
    });
    let body = payload(64);

    group.bench_function("spoke_to_hub", |b| {
        let hub = star.hub.local_id().clone();
        b.iter_custom(|iters| {
            rt.block_on(async {
                let start = Instant::now();
                for _ in 0..iters {
                    star.spokes[0]
                        .request(&hub, "echo", Some(body.clone()))
                        .await
                        .unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.bench_function("spoke_to_spoke", |b| {
        let target = star.spokes[1].local_id().clone();
        b.iter_custom(|iters| {
            rt.block_on(async {
                let start = Instant::now();
                for _ in 0..iters {
                    star.spokes[0]
                        .request(&target, "echo", Some(body.clone()))
                        .await
                        .unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.bench_function("empty_body", |b| {
        let hub = star.hub.local_id().clone();
        b.iter_custom(|iters| {
            rt.block_on(async {
                let start = Instant::now();
                for _ in 0..iters {
                    star.spokes[0].request(&hub, "echo", None).await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.finish();
    star.shutdown();
}

criterion_group!(benches, bench_codec_roundtrip, bench_request_latency);
criterion_main!(benches);

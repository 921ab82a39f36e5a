use std::hint::black_box;

use amino::{driver::memory::Broker, Amino, DriverOptions, Pattern};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use serde_json::json;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

fn bench_broker_publish(c: &mut Criterion) {
    let broker = Broker::new();
    let _subs: Vec<_> = (0..10).map(|_| broker.subscribe("chan", 1024)).collect();
    c.bench_function("broker_publish_10_subs", |b| {
        b.iter(|| black_box(broker.publish("chan", json!("x"))))
    });
}

fn bench_publish_ready(c: &mut Criterion) {
    let amino = Amino::new();
    amino
        .use_driver(Pattern::Pubsub, "memory", DriverOptions::new())
        .unwrap();
    c.bench_function("facade_publish_ready_0_subs", |b| {
        b.iter(|| amino.publish("chan", black_box(json!({ "n": 1 }))).unwrap())
    });
}

fn bench_queue_ready(c: &mut Criterion) {
    let amino = Amino::new();
    amino
        .use_driver(Pattern::Queue, "memory", DriverOptions::new())
        .unwrap();
    c.bench_function("facade_queue_ready", |b| {
        b.iter(|| amino.queue("jobs", black_box(json!("job"))).unwrap())
    });
}

/// Постановка 100 вызовов в очередь и их разбор после подключения.
fn bench_deferred_drain(c: &mut Criterion) {
    let rt = runtime();
    c.bench_function("facade_deferred_100_then_drain", |b| {
        b.to_async(&rt).iter_batched(
            || {
                let _guard = rt.enter();
                let amino = Amino::new();
                amino
                    .use_driver(
                        Pattern::Queue,
                        "memory",
                        DriverOptions::new().with("connect_delay_ms", 0),
                    )
                    .unwrap();
                amino
            },
            |amino| async move {
                for n in 0..100 {
                    amino.queue("jobs", n).unwrap();
                }
                while amino.pending(Pattern::Queue) > 0 || !amino.is_ready(Pattern::Queue) {
                    tokio::task::yield_now().await;
                }
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_broker_publish,
    bench_publish_ready,
    bench_queue_ready,
    bench_deferred_drain,
);
criterion_main!(benches);

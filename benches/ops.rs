//! Operation Benchmarks for TierCache
//!
//! Measures the core store operations, the typed counters, and the two
//! transaction modes. No backend is attached and the background tasks are
//! disabled, so numbers reflect the in-memory paths only.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;
use tiercache::{BatchItem, Config, DataType, Store, TxMode};

fn open_store() -> Arc<Store> {
    let config = Config {
        gc_interval: Duration::ZERO,
        save_interval: Duration::ZERO,
        ..Config::default()
    };
    Store::open(config, None).unwrap()
}

/// Benchmark set operations
fn bench_set(c: &mut Criterion) {
    let store = open_store();

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i);
            store
                .set(&key, DataType::Raw, Bytes::from_static(b"small_value"), None)
                .unwrap();
            i += 1;
        });
    });

    group.bench_function("set_medium", |b| {
        let mut i = 0u64;
        let value = Bytes::from("x".repeat(1024)); // 1KB value
        b.iter(|| {
            let key = format!("key:{}", i);
            store
                .set(&key, DataType::Raw, value.clone(), None)
                .unwrap();
            i += 1;
        });
    });

    group.bench_function("set_with_ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("temp:{}", i);
            store
                .set(
                    &key,
                    DataType::Raw,
                    Bytes::from_static(b"value"),
                    Some(Duration::from_secs(3600)),
                )
                .unwrap();
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark get operations, copying and non-copying
fn bench_get(c: &mut Criterion) {
    let store = open_store();

    // Pre-populate
    for i in 0..100_000 {
        let key = format!("key:{}", i);
        store
            .set(&key, DataType::Raw, Bytes::from("x".repeat(128)), None)
            .unwrap();
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(store.get(&key).unwrap());
            i += 1;
        });
    });

    group.bench_function("get_nocopy_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(store.get_nocopy(&key).unwrap());
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(store.get(&key).ok());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark typed counters
fn bench_incr(c: &mut Criterion) {
    let store = open_store();

    let mut group = c.benchmark_group("incr");
    group.throughput(Throughput::Elements(1));

    // Single counter (high contention)
    group.bench_function("single_counter", |b| {
        b.iter(|| {
            black_box(store.incr("counter", 1i64, None).unwrap());
        });
    });

    // Multiple counters (low contention)
    group.bench_function("multiple_counters", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("counter:{}", i % 1000);
            black_box(store.incr(&key, 1i64, None).unwrap());
            i += 1;
        });
    });

    group.bench_function("float_counter", |b| {
        b.iter(|| {
            black_box(store.incr("float", 0.5f64, None).unwrap());
        });
    });

    group.finish();
}

/// Benchmark the two transaction modes over the same workload
fn bench_tx(c: &mut Criterion) {
    let store = open_store();
    for i in 0..10_000 {
        let key = format!("key:{}", i);
        store
            .set(&key, DataType::Raw, Bytes::from_static(b"value"), None)
            .unwrap();
    }

    let mut group = c.benchmark_group("tx");
    group.throughput(Throughput::Elements(10));

    for mode in [TxMode::Lock, TxMode::Snapshot] {
        let name = match mode {
            TxMode::Lock => "lock_10_reads",
            TxMode::Snapshot => "snapshot_10_reads",
        };
        group.bench_function(name, |b| {
            let mut i = 0u64;
            b.iter(|| {
                store
                    .read_tx(mode, |tx| {
                        for n in 0..10 {
                            let key = format!("key:{}", (i + n) % 10_000);
                            black_box(tx.get_nocopy(&key)?);
                        }
                        Ok(())
                    })
                    .unwrap();
                i += 1;
            });
        });
    }

    group.finish();
}

/// Benchmark batch operations against per-key loops
fn bench_batch(c: &mut Criterion) {
    let store = open_store();
    for i in 0..10_000 {
        let key = format!("key:{}", i);
        store
            .set(&key, DataType::Raw, Bytes::from_static(b"value"), None)
            .unwrap();
    }

    let mut group = c.benchmark_group("batch");
    group.throughput(Throughput::Elements(100));

    group.bench_function("get_many_100", |b| {
        let keys: Vec<String> = (0..100).map(|i| format!("key:{}", i)).collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        b.iter(|| {
            black_box(store.get_many(&refs));
        });
    });

    group.bench_function("set_many_100", |b| {
        b.iter(|| {
            let items: Vec<BatchItem> = (0..100)
                .map(|i| {
                    BatchItem::new(
                        format!("batch:{}", i),
                        DataType::Raw,
                        Bytes::from_static(b"value"),
                        None,
                    )
                })
                .collect();
            black_box(store.set_many(items));
        });
    });

    group.finish();
}

/// Benchmark concurrent mixed access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let store = open_store();
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let store = Arc::clone(&store);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = format!("key:{}:{}", t, i);
                            store
                                .set(&key, DataType::Raw, Bytes::from_static(b"value"), None)
                                .unwrap();
                            store.get_nocopy(&key).unwrap();
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(store.keys().len());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set,
    bench_get,
    bench_incr,
    bench_tx,
    bench_batch,
    bench_concurrent,
);

criterion_main!(benches);

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use consumer_pool::ConsumerPool;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

const JOBS: usize = 1000;

fn busy_work(counter: &AtomicUsize) {
    let mut acc = 0u64;
    for i in 0..1_000u64 {
        acc = acc.wrapping_mul(31).wrapping_add(i);
    }
    criterion::black_box(acc);
    counter.fetch_add(1, Ordering::SeqCst);
}

fn drain_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain");

    for threads in [1, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("consumer_pool", threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    let counter = Arc::new(AtomicUsize::new(0));
                    let pool = ConsumerPool::new(threads).unwrap();
                    pool.start().unwrap();
                    for _ in 0..JOBS {
                        let counter = counter.clone();
                        pool.enq(move || busy_work(&counter));
                    }
                    pool.poison();
                    pool.join().unwrap();
                    assert_eq!(counter.load(Ordering::SeqCst), JOBS);
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("rayon", threads), &threads, |b, &threads| {
            b.iter(|| {
                let counter = Arc::new(AtomicUsize::new(0));
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .unwrap();
                pool.scope(|s| {
                    for _ in 0..JOBS {
                        let counter = counter.clone();
                        s.spawn(move |_| busy_work(&counter));
                    }
                });
                assert_eq!(counter.load(Ordering::SeqCst), JOBS);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, drain_bench);
criterion_main!(benches);

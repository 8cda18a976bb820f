use criterion::{black_box, criterion_group, criterion_main, Criterion};
use privatized_registry::{Registry, BLOCK_SIZE};
use std::sync::Arc;
use std::thread;

fn get_throughput(readers: usize, pid: i64) {
    let registry = Arc::new(Registry::new());
    registry.publish(pid, 0x1 as *mut _);

    let handles: Vec<_> = (0..readers)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    black_box(registry.get(black_box(pid)));
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
}

fn publish_with_growth(writers: usize, n: usize) {
    let registry = Arc::new(Registry::new());

    let handles: Vec<_> = (0..writers)
        .map(|w| {
            let registry = registry.clone();
            thread::spawn(move || {
                let base = (w * n) as i64 * BLOCK_SIZE as i64;
                for i in 0..n as i64 {
                    registry.publish(base + i, black_box(0x1 as *mut _));
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
}

fn bench_get_single_reader(c: &mut Criterion) {
    c.bench_function("get_single_reader", |b| b.iter(|| get_throughput(1, 0)));
}

fn bench_get_m10_readers(c: &mut Criterion) {
    c.bench_function("get_m10_readers", |b| b.iter(|| get_throughput(10, 0)));
}

fn bench_publish_n1000_m1_with_growth(c: &mut Criterion) {
    c.bench_function("publish_n1000_m1_with_growth", |b| {
        b.iter(|| publish_with_growth(1, 1000))
    });
}

fn bench_publish_n100_m10_with_growth(c: &mut Criterion) {
    c.bench_function("publish_n100_m10_with_growth", |b| {
        b.iter(|| publish_with_growth(10, 100))
    });
}

criterion_group!(
    benches,
    bench_get_single_reader,
    bench_get_m10_readers,
    bench_publish_n1000_m1_with_growth,
    bench_publish_n100_m10_with_growth
);
criterion_main!(benches);

//! Multithreaded scenarios: concurrent readers during a grow, and
//! concurrent writers to distinct pids.

use privatized_registry::{Registry, BLOCK_SIZE};
use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn ptr(n: usize) -> *mut c_void {
    n as *mut c_void
}

#[test]
fn concurrent_readers_during_grow_never_see_garbage() {
    // One thread repeatedly gets pid 0 while another grows the registry
    // far out by publishing a large pid. The reader must never observe
    // anything other than null or the last value published to pid 0.
    let registry = Arc::new(Registry::new());
    registry.publish(0, ptr(0xdead));

    let stop = Arc::new(AtomicBool::new(false));

    let reader = {
        let registry = registry.clone();
        let stop = stop.clone();
        std::thread::spawn(move || {
            let mut reads = 0usize;
            while !stop.load(Ordering::Relaxed) {
                let v = registry.get(0);
                assert!(v.is_null() || v == ptr(0xdead));
                reads += 1;
            }
            reads
        })
    };

    let writer = {
        let registry = registry.clone();
        std::thread::spawn(move || {
            registry.publish(10_000_000, ptr(0xbeef));
        })
    };

    writer.join().unwrap();
    stop.store(true, Ordering::Relaxed);
    let reads = reader.join().unwrap();
    assert!(reads > 0);

    assert_eq!(registry.get(0), ptr(0xdead));
    assert_eq!(registry.get(10_000_000), ptr(0xbeef));
}

#[test]
fn concurrent_writers_to_distinct_pids() {
    // N threads each publish their own pid, then every reader sees its
    // own writer's value.
    let n = 64i64;
    let registry = Arc::new(Registry::new());

    let writers: Vec<_> = (0..n)
        .map(|tid| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                registry.publish(tid, ptr(tid as usize + 1000));
            })
        })
        .collect();

    for w in writers {
        w.join().unwrap();
    }

    for tid in 0..n {
        assert_eq!(registry.get(tid), ptr(tid as usize + 1000));
    }
}

#[test]
fn concurrent_writers_across_block_boundary() {
    // Same as above, but spread across enough pids to force multiple
    // concurrent growers racing on the same target block.
    let n = 32i64;
    let registry = Arc::new(Registry::new());
    let base = BLOCK_SIZE as i64 * 4;

    let writers: Vec<_> = (0..n)
        .map(|i| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                let pid = base + i;
                registry.publish(pid, ptr(i as usize + 1));
            })
        })
        .collect();

    for w in writers {
        w.join().unwrap();
    }

    for i in 0..n {
        assert_eq!(registry.get(base + i), ptr(i as usize + 1));
    }
    assert!(registry.capacity() as i64 > base + n);
}

#[test]
fn many_readers_one_writer_monotonic_stream() {
    // One writer publishes an increasing sequence to a single pid, many
    // readers must never observe a value go backwards.
    let n = 500usize;
    let m = 8usize;
    let registry = Arc::new(Registry::new());
    registry.publish(0, ptr(0));

    let readers: Vec<_> = (0..m)
        .map(|_| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                let mut prev = 0usize;
                loop {
                    let v = registry.get(0) as usize;
                    assert!(v >= prev, "{v} < {prev}");
                    prev = v;
                    if v == n {
                        break;
                    }
                    std::thread::yield_now();
                }
            })
        })
        .collect();

    let writer = {
        let registry = registry.clone();
        std::thread::spawn(move || {
            for i in 1..=n {
                registry.publish(0, ptr(i));
                std::thread::yield_now();
            }
        })
    };

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
}

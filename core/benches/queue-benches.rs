use parking_lot::Mutex;
use std::{collections::VecDeque, sync::Arc};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use fifoq_core::{Fifo, FixedFifo, Queue};

const WORKERS: usize = 16;

/// Every worker pushes `n` items then pops `n` items, retrying while full / empty
fn push_pop<Q: Queue<u64> + 'static>(queue: &Arc<Q>, n: usize) {
    rayon::scope(|s| {
        for w in 0..WORKERS {
            let queue = Arc::clone(queue);
            s.spawn(move |_| {
                let mut pushed = 0;
                let mut popped = 0;
                while popped < n {
                    if pushed < n && queue.enqueue((w * n + pushed) as u64).is_ok() {
                        pushed += 1;
                    }
                    if queue.dequeue().is_ok() {
                        popped += 1;
                    }
                }
            });
        }
    });
}

fn concurrent_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_push_pop");

    for i in (4..14).step_by(2) {
        let i = 1 << i;
        group.bench_with_input(BenchmarkId::new("Fifo", i), &i, |b, i| {
            let queue = Arc::new(Fifo::with_capacity(*i));
            b.iter(|| push_pop(&queue, *i));
        });
        group.bench_with_input(BenchmarkId::new("FixedFifo", i), &i, |b, i| {
            let queue = Arc::new(FixedFifo::new(WORKERS * *i));
            b.iter(|| push_pop(&queue, *i));
        });
        group.bench_with_input(BenchmarkId::new("Mutexed VecDeque", i), &i, |b, i| {
            let queue: Arc<Mutex<VecDeque<u64>>> =
                Arc::new(Mutex::new(VecDeque::with_capacity(*i)));

            b.iter(|| {
                rayon::scope(|s| {
                    for w in 0..WORKERS {
                        let queue = Arc::clone(&queue);
                        s.spawn(move |_| {
                            let mut popped = 0;
                            for j in 0..*i {
                                queue.lock().push_back((w * *i + j) as u64);
                            }
                            while popped < *i {
                                if queue.lock().pop_front().is_some() {
                                    popped += 1;
                                }
                            }
                        });
                    }
                });
            });
        });
    }

    group.finish();
}

fn hand_off_to_waiter(c: &mut Criterion) {
    let mut group = c.benchmark_group("hand_off_to_waiter");
    let n = 1024u64;

    group.bench_function("Fifo", |b| {
        let queue = Arc::new(Fifo::new());
        b.iter(|| hand_off(&queue, n));
    });
    group.bench_function("FixedFifo", |b| {
        let queue = Arc::new(FixedFifo::new(64));
        b.iter(|| hand_off(&queue, n));
    });

    group.finish();
}

fn hand_off<Q: Queue<u64> + 'static>(queue: &Arc<Q>, n: u64) {
    let consumer = {
        let queue = Arc::clone(queue);
        std::thread::spawn(move || {
            for _ in 0..n {
                queue.dequeue_or_wait_for_next_element().unwrap();
            }
        })
    };
    for i in 0..n {
        while queue.enqueue(i).is_err() {
            std::thread::yield_now();
        }
    }
    consumer.join().unwrap();
}

criterion_group!(queue_benches, concurrent_push_pop, hand_off_to_waiter);
criterion_main!(queue_benches);

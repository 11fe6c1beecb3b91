use std::{
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
    sync::Arc,
    sync::Barrier,
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, bail, Context};
use fifoq_core::{Queue, QueueError};
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct Workload {
    pub producers: usize,
    pub consumers: usize,
    pub messages: usize,
    /// how long a consumer waits for the next message before checking if it's done
    pub idle_timeout: Duration,
}

#[derive(Debug, Default)]
pub struct Report {
    pub elapsed: Duration,
    /// pushes rejected because the queue was full
    pub full_retries: u64,
    /// waits that timed out before a message arrived
    pub idle_timeouts: u64,
}

/// Push `messages` distinct ids through `queue` and check each arrived exactly once
pub fn run(queue: Arc<dyn Queue<u64>>, workload: &Workload) -> anyhow::Result<Report> {
    if workload.producers == 0 || workload.consumers == 0 {
        bail!("Need at least one producer and one consumer");
    }
    let total = workload.messages;
    let bar = Arc::new(Barrier::new(workload.producers + workload.consumers + 1));
    let received = Arc::new(AtomicUsize::new(0));
    let full_retries = Arc::new(AtomicU64::new(0));
    let idle_timeouts = Arc::new(AtomicU64::new(0));

    let producers = (0..workload.producers)
        .map(|p| {
            let queue = Arc::clone(&queue);
            let bar = Arc::clone(&bar);
            let full_retries = Arc::clone(&full_retries);
            let ids = (p..total).step_by(workload.producers);
            thread::spawn(move || -> anyhow::Result<()> {
                bar.wait();
                for id in ids {
                    'retry: loop {
                        match queue.enqueue(id as u64) {
                            Ok(()) => break 'retry,
                            Err(QueueError::FullCapacity) => {
                                full_retries.fetch_add(1, Ordering::Relaxed);
                                thread::yield_now();
                            }
                            Err(err) => {
                                return Err(err).with_context(|| format!("Failed to push {}", id))
                            }
                        }
                    }
                }
                debug!(producer = p, "Producer finished");
                Ok(())
            })
        })
        .collect::<Vec<_>>();

    let consumers = (0..workload.consumers)
        .map(|c| {
            let queue = Arc::clone(&queue);
            let bar = Arc::clone(&bar);
            let received = Arc::clone(&received);
            let idle_timeouts = Arc::clone(&idle_timeouts);
            let idle_timeout = workload.idle_timeout;
            thread::spawn(move || -> anyhow::Result<Vec<u64>> {
                bar.wait();
                let mut got = Vec::new();
                while received.load(Ordering::Acquire) < total {
                    match queue.dequeue_or_wait_for_next_element_with_timeout(idle_timeout) {
                        Ok(id) => {
                            got.push(id);
                            received.fetch_add(1, Ordering::AcqRel);
                        }
                        Err(QueueError::WaitTimeout) => {
                            trace!(consumer = c, "No message within the idle timeout");
                            idle_timeouts.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => return Err(err).context("Failed to pop"),
                    }
                }
                debug!(consumer = c, count = got.len(), "Consumer finished");
                Ok(got)
            })
        })
        .collect::<Vec<_>>();

    bar.wait();
    let start = Instant::now();

    for producer in producers {
        producer
            .join()
            .map_err(|_| anyhow!("Producer thread panicked"))??;
    }
    let mut seen = vec![0u32; total];
    for consumer in consumers {
        let got = consumer
            .join()
            .map_err(|_| anyhow!("Consumer thread panicked"))??;
        for id in got {
            let slot = seen
                .get_mut(id as usize)
                .ok_or_else(|| anyhow!("Received unknown message {}", id))?;
            *slot += 1;
        }
    }
    let elapsed = start.elapsed();

    if let Some((id, count)) = seen.iter().enumerate().find(|(_, count)| **count != 1) {
        bail!("Message {} was received {} times", id, count);
    }
    if !queue.is_empty() {
        bail!("{} messages left in the queue", queue.len());
    }

    Ok(Report {
        elapsed,
        full_retries: full_retries.load(Ordering::Relaxed),
        idle_timeouts: idle_timeouts.load(Ordering::Relaxed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fifoq_core::QueueOptions;

    fn workload() -> Workload {
        Workload {
            producers: 3,
            consumers: 2,
            messages: 2000,
            idle_timeout: Duration::from_millis(10),
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn unbounded_delivers_everything_once() {
        let report = run(QueueOptions::unbounded().build(), &workload()).unwrap();
        assert_eq!(report.full_retries, 0);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn small_fixed_queue_still_delivers() {
        run(QueueOptions::fixed(8).build(), &workload()).unwrap();
    }

    #[test]
    fn locked_queue_fails_the_run() {
        let queue = QueueOptions::unbounded().build::<u64>();
        queue.lock();
        let err = run(queue, &workload()).unwrap_err();
        assert!(format!("{:#}", err).contains("locked"), "{:#}", err);
    }

    #[test]
    fn needs_both_roles() {
        let mut w = workload();
        w.consumers = 0;
        assert!(run(QueueOptions::unbounded().build(), &w).is_err());
    }
}

pub mod fifo;
pub mod fixed_fifo;
mod lock;


use std::time::Duration;

use crate::deadline::Deadline;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum QueueError {
    #[error("Queue is empty")]
    Empty,
    #[error("Queue is at full capacity")]
    FullCapacity,
    #[error("Queue is locked")]
    Locked,
    #[error("Timed out while waiting for the next element")]
    WaitTimeout,
    #[error("Cancelled while waiting for the next element")]
    WaitCancelled,
    #[error("Index {index} is out of range for a queue of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Internal channel closed while waiting for the next element")]
    ChannelClosed,
}

/// Maximum number of elements a queue may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    Unbounded,
    Bounded(usize),
}

impl Capacity {
    #[inline]
    pub fn is_bounded(self) -> bool {
        matches!(self, Capacity::Bounded(_))
    }

    /// `None` if unbounded
    #[inline]
    pub fn limit(self) -> Option<usize> {
        match self {
            Capacity::Unbounded => None,
            Capacity::Bounded(n) => Some(n),
        }
    }
}

/// Operations shared by every queue engine.
///
/// All methods take `&self`; share an instance between threads by wrapping it in an `Arc`.
pub trait Queue<T>: Send + Sync {
    /// Push `value` to the tail of the queue.
    ///
    /// If a consumer is blocked waiting for an element, exactly one of them receives `value`
    /// directly instead.
    fn enqueue(&self, value: T) -> QueueResult<()>;

    /// Pop the head of the queue. Never blocks.
    fn dequeue(&self) -> QueueResult<T>;

    /// Pop the head of the queue, waiting until one is available or `deadline` fires.
    ///
    /// If the queue is not empty the head is returned even if `deadline` already expired.
    /// On `WaitTimeout` / `WaitCancelled` the caller is no longer registered as a waiter.
    fn dequeue_or_wait_for_next_element_until(&self, deadline: &Deadline) -> QueueResult<T>;

    /// Pop the head of the queue, waiting indefinitely for one to arrive.
    fn dequeue_or_wait_for_next_element(&self) -> QueueResult<T> {
        self.dequeue_or_wait_for_next_element_until(&Deadline::never())
    }

    fn dequeue_or_wait_for_next_element_with_timeout(&self, timeout: Duration) -> QueueResult<T> {
        self.dequeue_or_wait_for_next_element_until(&Deadline::after(timeout))
    }

    /// Number of elements at the time of the call. May be stale by the time it returns.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> Capacity;

    /// Number of consumers currently blocked waiting for an element
    fn waiting(&self) -> usize;

    /// Reject all mutating operations until `unlock` is called. Idempotent.
    fn lock(&self);

    fn unlock(&self);

    fn is_locked(&self) -> bool;
}

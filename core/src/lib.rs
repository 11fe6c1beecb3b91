//! Concurrency-safe FIFO queues.
//!
//! Two engines implement the [`Queue`](collections::Queue) contract:
//!
//! - [`Fifo`](collections::fifo::Fifo): unbounded, supports positional `get` / `remove`
//! - [`FixedFifo`](collections::fixed_fifo::FixedFifo): fixed capacity, rejects pushes when full
//!
//! Both support blocking consumers via `dequeue_or_wait_for_next_element*` and can be
//! paused with `lock` / `unlock`.
//!
//! # Features
//!
//! | name | description |
//! | :-- | :-- |
//! | serde | Enables serde integration for [`QueueOptions`](options::QueueOptions) and errors |
//!
pub mod collections;
pub mod deadline;
pub mod options;

pub use collections::{
    fifo::Fifo, fixed_fifo::FixedFifo, Capacity, Queue, QueueError, QueueResult,
};
pub use deadline::{CancellationToken, Deadline};
pub use options::QueueOptions;

//! # Fifo
//!
//! Unbounded multi producer multi consumer First In First Out queue.
//!
//! Consumers waiting for an element register a private single-slot channel. Producers hand new
//! elements to the oldest registered waiter before touching the backing buffer, so waiters are
//! served in the order they started waiting.
//!

use std::collections::VecDeque;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::{lock::LockFlag, Capacity, Queue, QueueError, QueueResult};
use crate::deadline::Deadline;

const NAME: &str = "Fifo";

struct Waiter<T> {
    id: u64,
    tx: Sender<T>,
}

struct State<T> {
    items: VecDeque<T>,
    waiters: VecDeque<Waiter<T>>,
    next_waiter_id: u64,
}

impl<T> State<T> {
    /// Hand `value` to the oldest live waiter. Returns the value if nobody took it.
    fn hand_off(&mut self, mut value: T) -> Option<T> {
        while let Some(waiter) = self.waiters.pop_front() {
            match waiter.tx.try_send(value) {
                Ok(()) => {
                    trace!(waiter = waiter.id, "Handed element to waiter");
                    return None;
                }
                Err(TrySendError::Disconnected(v)) | Err(TrySendError::Full(v)) => {
                    warn!(waiter = waiter.id, "Waiter channel is gone, skipping it");
                    value = v;
                }
            }
        }
        Some(value)
    }

    /// Returns true if the waiter was still registered
    fn deregister(&mut self, id: u64) -> bool {
        match self.waiters.iter().position(|w| w.id == id) {
            Some(pos) => {
                self.waiters.remove(pos);
                true
            }
            None => false,
        }
    }
}

pub struct Fifo<T> {
    state: Mutex<State<T>>,
    locked: LockFlag,
}

impl<T> std::fmt::Debug for Fifo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Fifo")
            .field("len", &state.items.len())
            .field("waiting", &state.waiters.len())
            .field("locked", &self.locked.is_set())
            .finish()
    }
}

impl<T> Default for Fifo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Fifo<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Preallocate room for `capacity` elements. The queue still grows past it.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                waiters: VecDeque::new(),
                next_waiter_id: 0,
            }),
            locked: LockFlag::default(),
        }
    }

    /// Clone of the element at `index`, 0 being the head. Allowed while locked.
    pub fn get(&self, index: usize) -> QueueResult<T>
    where
        T: Clone,
    {
        let state = self.state.lock();
        let len = state.items.len();
        state
            .items
            .get(index)
            .cloned()
            .ok_or(QueueError::IndexOutOfRange { index, len })
    }

    /// Remove the element at `index`, shifting the ones behind it forward.
    pub fn remove(&self, index: usize) -> QueueResult<T> {
        let mut state = self.state.lock();
        self.locked.ensure_unlocked()?;
        let len = state.items.len();
        state
            .items
            .remove(index)
            .ok_or(QueueError::IndexOutOfRange { index, len })
    }
}

impl<T: Send> Queue<T> for Fifo<T> {
    fn enqueue(&self, value: T) -> QueueResult<()> {
        let mut state = self.state.lock();
        self.locked.ensure_unlocked()?;
        if let Some(value) = state.hand_off(value) {
            state.items.push_back(value);
        }
        Ok(())
    }

    fn dequeue(&self) -> QueueResult<T> {
        let mut state = self.state.lock();
        self.locked.ensure_unlocked()?;
        state.items.pop_front().ok_or(QueueError::Empty)
    }

    fn dequeue_or_wait_for_next_element_until(&self, deadline: &Deadline) -> QueueResult<T> {
        let (id, rx): (u64, Receiver<T>) = {
            let mut state = self.state.lock();
            self.locked.ensure_unlocked()?;
            if let Some(value) = state.items.pop_front() {
                return Ok(value);
            }
            let id = state.next_waiter_id;
            state.next_waiter_id = state.next_waiter_id.wrapping_add(1);
            let (tx, rx) = crossbeam_channel::bounded(1);
            state.waiters.push_back(Waiter { id, tx });
            trace!(waiter = id, "Waiting for the next element");
            (id, rx)
        };

        match deadline.recv(&rx) {
            Ok(value) => Ok(value),
            Err(err) => {
                let mut state = self.state.lock();
                if state.deregister(id) {
                    debug!(waiter = id, error = %err, "Stopped waiting for the next element");
                    return Err(err);
                }
                // a producer took our registration, so the value is already in our channel
                trace!(waiter = id, "Element arrived while giving up");
                rx.try_recv().map_err(|_| QueueError::ChannelClosed)
            }
        }
    }

    fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    fn capacity(&self) -> Capacity {
        Capacity::Unbounded
    }

    fn waiting(&self) -> usize {
        self.state.lock().waiters.len()
    }

    fn lock(&self) {
        let _state = self.state.lock();
        self.locked.set(true, NAME);
    }

    fn unlock(&self) {
        let _state = self.state.lock();
        self.locked.set(false, NAME);
    }

    fn is_locked(&self) -> bool {
        self.locked.is_set()
    }
}

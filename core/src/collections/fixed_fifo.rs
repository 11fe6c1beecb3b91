//! # FixedFifo
//!
//! Fixed capacity multi producer multi consumer First In First Out Queue
//!
//! The slot buffer is allocated once and never resized, pushing into a full queue fails with
//! [`QueueError::FullCapacity`].
//!
//! Waiting consumers share a single hand-off channel that only exists while at least one of
//! them is owed an element.
//!

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::{lock::LockFlag, Capacity, Queue, QueueError, QueueResult};
use crate::deadline::Deadline;

const NAME: &str = "FixedFifo";

type HandOff<T> = (Sender<T>, Receiver<T>);

struct State<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    len: usize,

    /// number of registered waiters no element was routed to yet
    waiting: usize,
    hand_off: Option<HandOff<T>>,
}

impl<T> State<T> {
    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn push(&mut self, value: T) -> QueueResult<()> {
        if self.len == self.capacity() {
            return Err(QueueError::FullCapacity);
        }
        let tail = (self.head + self.len) % self.capacity();
        debug_assert!(self.slots[tail].is_none());
        self.slots[tail] = Some(value);
        self.len += 1;
        Ok(())
    }

    fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let value = self.slots[self.head].take();
        debug_assert!(value.is_some(), "Occupied slot was empty");
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        value
    }

    /// Route `value` to a waiter. Returns the value if it could not be sent.
    fn hand_off(&mut self, value: T) -> Option<T> {
        if self.waiting == 0 {
            return Some(value);
        }
        // a waiter that gave up may have torn the channel down already
        let (tx, _) = match self.hand_off.as_ref() {
            Some(hand_off) => hand_off,
            None => {
                warn!(
                    waiting = self.waiting,
                    "Waiters registered without a hand-off channel"
                );
                return Some(value);
            }
        };
        match tx.try_send(value) {
            Ok(()) => {
                self.waiting -= 1;
                trace!(waiting = self.waiting, "Handed element to a waiter");
                None
            }
            Err(err) => {
                warn!("Failed to hand element to a waiter, storing it instead");
                Some(err.into_inner())
            }
        }
    }

    fn register_waiter(&mut self) -> Receiver<T> {
        self.waiting += 1;
        let (_, rx) = self
            .hand_off
            .get_or_insert_with(crossbeam_channel::unbounded);
        rx.clone()
    }

    /// Drop the hand-off channel once nobody is owed an element and nothing is in flight
    fn release_hand_off(&mut self) {
        let drained = self
            .hand_off
            .as_ref()
            .map(|(_, rx)| rx.is_empty())
            .unwrap_or(true);
        if self.waiting == 0 && drained && self.hand_off.take().is_some() {
            trace!("Closed hand-off channel");
        }
    }
}

pub struct FixedFifo<T> {
    state: Mutex<State<T>>,
    locked: LockFlag,
}

impl<T> std::fmt::Debug for FixedFifo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FixedFifo")
            .field("len", &state.len)
            .field("capacity", &state.capacity())
            .field("waiting", &state.waiting)
            .field("locked", &self.locked.is_set())
            .finish()
    }
}

impl<T> FixedFifo<T> {
    /// A capacity of 0 never stores anything, pushes only succeed if a consumer is waiting.
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            state: Mutex::new(State {
                slots: slots.into_boxed_slice(),
                head: 0,
                len: 0,
                waiting: 0,
                hand_off: None,
            }),
            locked: LockFlag::default(),
        }
    }

    pub fn is_full(&self) -> bool {
        let state = self.state.lock();
        state.len == state.capacity()
    }
}

impl<T: Send> Queue<T> for FixedFifo<T> {
    fn enqueue(&self, value: T) -> QueueResult<()> {
        let mut state = self.state.lock();
        self.locked.ensure_unlocked()?;
        match state.hand_off(value) {
            Some(value) => state.push(value),
            None => Ok(()),
        }
    }

    fn dequeue(&self) -> QueueResult<T> {
        let mut state = self.state.lock();
        self.locked.ensure_unlocked()?;
        state.pop().ok_or(QueueError::Empty)
    }

    fn dequeue_or_wait_for_next_element_until(&self, deadline: &Deadline) -> QueueResult<T> {
        let rx = {
            let mut state = self.state.lock();
            self.locked.ensure_unlocked()?;
            if let Some(value) = state.pop() {
                return Ok(value);
            }
            let rx = state.register_waiter();
            trace!(waiting = state.waiting, "Waiting for the next element");
            rx
        };

        let result = deadline.recv(&rx);

        let mut state = self.state.lock();
        let result = match result {
            Ok(value) => Ok(value),
            // an element may have been routed to us while we were giving up
            Err(err) => match rx.try_recv() {
                Ok(value) => {
                    trace!("Element arrived while giving up");
                    Ok(value)
                }
                Err(_) => {
                    state.waiting -= 1;
                    debug!(error = %err, "Stopped waiting for the next element");
                    Err(err)
                }
            },
        };
        drop(rx);
        state.release_hand_off();
        result
    }

    fn len(&self) -> usize {
        self.state.lock().len
    }

    fn capacity(&self) -> Capacity {
        Capacity::Bounded(self.state.lock().capacity())
    }

    fn waiting(&self) -> usize {
        self.state.lock().waiting
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

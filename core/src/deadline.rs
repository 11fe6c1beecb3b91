//! # Deadline
//!
//! Explicit limits for the blocking `dequeue_or_wait_for_next_element*` family.
//!
//! A [`Deadline`] combines an optional point in time with an optional [`CancellationToken`].
//! Whichever fires first ends the wait.
//!
use std::{
    fmt::Debug,
    sync::atomic::AtomicBool,
    sync::atomic::Ordering,
    sync::Arc,
    time::{Duration, Instant},
};

use crossbeam_channel::{never, select, Receiver, Sender};
use parking_lot::Mutex;

use crate::collections::{QueueError, QueueResult};

/// Cloneable handle used to abort waits from another thread.
///
/// Cancelling wakes every wait that uses this token or any of its clones.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    cancelled: AtomicBool,
    // dropping the only sender disconnects `signal`, which wakes all receivers at once
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

impl Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(tx)),
                signal: rx,
            }),
        }
    }

    /// Idempotent
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        let trigger = self.inner.trigger.lock().take();
        drop(trigger);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    fn signal(&self) -> Receiver<()> {
        self.inner.signal.clone()
    }
}

/// When to give up waiting for the next element.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    at: Option<Instant>,
    token: Option<CancellationToken>,
}

impl Deadline {
    /// Wait forever
    pub fn never() -> Self {
        Self::default()
    }

    /// Durations too large to represent as an `Instant` are treated as `never`
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(timeout),
            token: None,
        }
    }

    pub fn at(instant: Instant) -> Self {
        Self {
            at: Some(instant),
            token: None,
        }
    }

    pub fn cancelled_by(token: CancellationToken) -> Self {
        Self {
            at: None,
            token: Some(token),
        }
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    pub fn token(&self) -> Option<&CancellationToken> {
        self.token.as_ref()
    }

    /// Time left until the deadline. `None` if there is no time limit.
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// True if the time limit passed or the token was cancelled
    pub fn is_expired(&self) -> bool {
        self.at.map(|at| at <= Instant::now()).unwrap_or(false)
            || self
                .token
                .as_ref()
                .map(CancellationToken::is_cancelled)
                .unwrap_or(false)
    }

    /// Block until `rx` yields a value or this deadline fires.
    pub(crate) fn recv<T>(&self, rx: &Receiver<T>) -> QueueResult<T> {
        let timer = match self.at {
            Some(at) => crossbeam_channel::at(at),
            None => never(),
        };
        let cancelled = match self.token.as_ref() {
            Some(token) => token.signal(),
            None => never(),
        };
        select! {
            recv(rx) -> value => value.map_err(|_| QueueError::ChannelClosed),
            recv(cancelled) -> _ => Err(QueueError::WaitCancelled),
            recv(timer) -> _ => Err(QueueError::WaitTimeout),
        }
    }
}

impl From<Duration> for Deadline {
    fn from(timeout: Duration) -> Self {
        Deadline::after(timeout)
    }
}

impl From<Instant> for Deadline {
    fn from(instant: Instant) -> Self {
        Deadline::at(instant)
    }
}

impl From<CancellationToken> for Deadline {
    fn from(token: CancellationToken) -> Self {
        Deadline::cancelled_by(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_has_no_limit() {
        let deadline = Deadline::never();
        assert!(deadline.instant().is_none());
        assert!(deadline.remaining().is_none());
        assert!(!deadline.is_expired());
    }

    #[test]
    fn huge_timeout_saturates_to_never() {
        let deadline = Deadline::after(Duration::from_secs(u64::MAX));
        assert!(deadline.instant().is_none());
        assert!(!deadline.is_expired());
    }

    #[test]
    fn reached_instant_times_out() {
        let deadline = Deadline::at(Instant::now());
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Some(Duration::from_secs(0)));

        let (_tx, rx) = crossbeam_channel::unbounded::<u32>();
        assert_eq!(deadline.recv(&rx), Err(QueueError::WaitTimeout));
    }

    #[test]
    fn cancel_is_shared_by_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        let deadline = Deadline::cancelled_by(clone);
        assert!(!deadline.is_expired());

        token.cancel();
        token.cancel(); // idempotent

        assert!(token.is_cancelled());
        assert!(deadline.is_expired());

        let (_tx, rx) = crossbeam_channel::unbounded::<u32>();
        assert_eq!(deadline.recv(&rx), Err(QueueError::WaitCancelled));
    }

    #[test]
    fn recv_returns_ready_value() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(42u32).unwrap();
        let deadline = Deadline::after(Duration::from_secs(5));
        assert_eq!(deadline.recv(&rx), Ok(42));
    }

    #[test]
    fn recv_reports_closed_channel() {
        let (tx, rx) = crossbeam_channel::unbounded::<u32>();
        drop(tx);
        assert_eq!(Deadline::never().recv(&rx), Err(QueueError::ChannelClosed));
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn cancel_wakes_blocked_recv() {
        let token = CancellationToken::new();
        let deadline = Deadline::after(Duration::from_secs(10)).with_token(token.clone());

        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            token.cancel();
        });

        let (_tx, rx) = crossbeam_channel::unbounded::<u32>();
        let start = Instant::now();
        assert_eq!(deadline.recv(&rx), Err(QueueError::WaitCancelled));
        assert!(start.elapsed() < Duration::from_secs(5));

        canceller.join().unwrap();
    }
}

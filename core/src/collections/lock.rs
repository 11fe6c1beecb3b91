use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use super::{QueueError, QueueResult};

/// Pause flag shared by the queue engines.
///
/// Writes must happen while holding the engine's mutex, so every mutating operation that
/// checks the flag under the same mutex observes `lock` / `unlock` in order.
/// Reads through [`LockFlag::is_set`] don't need the mutex.
#[derive(Debug, Default)]
pub(crate) struct LockFlag(AtomicBool);

impl LockFlag {
    /// Call with the engine mutex held
    pub fn set(&self, locked: bool, queue: &'static str) {
        let was = self.0.swap(locked, Ordering::AcqRel);
        if was != locked {
            debug!(queue, locked, "Queue lock state changed");
        }
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Call with the engine mutex held
    #[inline]
    pub fn ensure_unlocked(&self) -> QueueResult<()> {
        if self.is_set() {
            return Err(QueueError::Locked);
        }
        Ok(())
    }
}

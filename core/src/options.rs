use std::sync::Arc;

use crate::collections::{fifo::Fifo, fixed_fifo::FixedFifo, Capacity, Queue};

/// Describes which queue engine to build.
///
/// ```
/// use fifoq_core::{Capacity, Queue, QueueOptions};
///
/// let queue = QueueOptions::fixed(2).build::<u32>();
/// assert_eq!(queue.capacity(), Capacity::Bounded(2));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueueOptions {
    /// `None` builds an unbounded [`Fifo`], `Some(n)` a [`FixedFifo`] of capacity `n`
    #[cfg_attr(feature = "serde", serde(default))]
    pub capacity: Option<usize>,
}

impl QueueOptions {
    pub fn unbounded() -> Self {
        Self { capacity: None }
    }

    pub fn fixed(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
        }
    }

    pub fn capacity(&self) -> Capacity {
        match self.capacity {
            Some(n) => Capacity::Bounded(n),
            None => Capacity::Unbounded,
        }
    }

    pub fn build<T: Send + 'static>(&self) -> Arc<dyn Queue<T>> {
        match self.capacity {
            Some(n) => Arc::new(FixedFifo::new(n)),
            None => Arc::new(Fifo::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_matching_engine() {
        let queue = QueueOptions::default().build::<u8>();
        assert_eq!(queue.capacity(), Capacity::Unbounded);

        let queue = QueueOptions::fixed(16).build::<u8>();
        assert_eq!(queue.capacity(), Capacity::Bounded(16));
        assert_eq!(QueueOptions::fixed(16).capacity().limit(), Some(16));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn loads_from_json() {
        let options: QueueOptions = serde_json::from_str(r#"{"capacity": 128}"#).unwrap();
        assert_eq!(options, QueueOptions::fixed(128));

        let options: QueueOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, QueueOptions::unbounded());
        assert!(!options.capacity().is_bounded());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn errors_serialize() {
        use crate::collections::QueueError;

        let err = QueueError::IndexOutOfRange { index: 4, len: 2 };
        let json = serde_json::to_string(&err).unwrap();
        let back: QueueError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}

//! Bounded lock-free channels for control messages.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_queue::ArrayQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("queue is full")]
    Full,
    #[error("queue is empty")]
    Empty,
}

struct Shared<T> {
    queue: ArrayQueue<T>,
    dropped: AtomicU64,
}

/// Creates a fixed-capacity channel. The capacity never changes afterwards.
pub fn channel<T>(capacity: usize) -> (EventSender<T>, EventReceiver<T>) {
    let shared = Arc::new(Shared {
        queue: ArrayQueue::new(capacity.max(1)),
        dropped: AtomicU64::new(0),
    });
    (
        EventSender {
            shared: Arc::clone(&shared),
        },
        EventReceiver { shared },
    )
}

/// Producing half. Clones share the queue; callers keep all clones on one
/// thread so pushes stay ordered.
pub struct EventSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for EventSender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> EventSender<T> {
    /// Pushes `value`, handing the queue-full condition back to the caller.
    /// Entries already queued are never touched.
    pub fn try_push(&self, value: T) -> Result<(), QueueError> {
        self.shared.queue.push(value).map_err(|_| QueueError::Full)
    }

    /// Pushes `value` or drops it when the queue is full. Used where losing a
    /// display update is acceptable and blocking is not.
    #[inline]
    pub fn push_lossy(&self, value: T) -> bool {
        if self.shared.queue.push(value).is_ok() {
            true
        } else {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.shared.queue.capacity()
    }
}

/// Consuming half. Not `Clone`: exactly one thread drains a channel.
pub struct EventReceiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> EventReceiver<T> {
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.shared.queue.pop()
    }

    pub fn try_pop(&mut self) -> Result<T, QueueError> {
        self.pop().ok_or(QueueError::Empty)
    }

    /// Pops until the queue is empty, returning how many entries were seen.
    pub fn drain(&mut self, mut f: impl FnMut(T)) -> usize {
        let mut count = 0;
        while let Some(value) = self.pop() {
            f(value);
            count += 1;
        }
        count
    }

    pub fn len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

//! Min-priority queue keyed by next-run time

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Mutex;

/// An entry waiting in the queue
#[derive(Debug)]
struct QueueItem<T> {
    value: T,
    /// Next-run time as unix seconds; smallest pops first
    priority: i64,
}

impl<T> PartialEq for QueueItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}

impl<T> Eq for QueueItem<T> {}

impl<T> PartialOrd for QueueItem<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for QueueItem<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.cmp(&other.priority)
    }
}

/// A thread-safe min-priority queue of scheduled items
///
/// Registration tasks push while the run loops pop; both paths take the
/// inner lock for the duration of a single heap operation only. Ties on
/// priority pop in arbitrary order.
#[derive(Debug)]
pub struct ScheduleQueue<T> {
    heap: Mutex<BinaryHeap<Reverse<QueueItem<T>>>>,
}

impl<T> ScheduleQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
        }
    }

    /// Insert an item with its unix-seconds priority
    pub fn push(&self, value: T, priority: i64) {
        let mut heap = self.heap.lock().expect("schedule queue lock poisoned");
        heap.push(Reverse(QueueItem { value, priority }));
    }

    /// Remove and return the earliest item, if any
    pub fn pop(&self) -> Option<T> {
        let mut heap = self.heap.lock().expect("schedule queue lock poisoned");
        heap.pop().map(|Reverse(item)| item.value)
    }

    /// Peek at the earliest priority without removing it
    pub fn peek_priority(&self) -> Option<i64> {
        let heap = self.heap.lock().expect("schedule queue lock poisoned");
        heap.peek().map(|Reverse(item)| item.priority)
    }

    pub fn len(&self) -> usize {
        self.heap.lock().expect("schedule queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for ScheduleQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

use crate::diff::DiffFile;
use std::collections::VecDeque;

/// What a queue entry fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTask {
    /// The whole file fragment
    File,
    /// The unchanged lines of one collapsed group
    Chunk { group: usize, chunk_index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadQueueEntry {
    pub container: usize,
    pub file: DiffFile,
    pub task: LoadTask,
    /// Page generation the entry was queued in; results from an older
    /// generation are dropped
    pub generation: u64,
}

impl LoadQueueEntry {
    pub fn file(container: usize, file: DiffFile) -> Self {
        LoadQueueEntry {
            container,
            file,
            task: LoadTask::File,
            generation: 0,
        }
    }
}

/// Strict FIFO with a single slot in flight.
///
/// `start` and `complete` hand back the entry to dispatch next, so the
/// caller's completion handler is the only thing that advances the queue.
#[derive(Debug)]
pub struct LoadQueue<T> {
    pending: VecDeque<T>,
    in_flight: bool,
    started: bool,
}

impl<T> Default for LoadQueue<T> {
    fn default() -> Self {
        LoadQueue {
            pending: VecDeque::new(),
            in_flight: false,
            started: false,
        }
    }
}

impl<T> LoadQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, entry: T) {
        self.pending.push_back(entry);
    }

    /// Begin (or resume) processing. Returns the entry to dispatch when
    /// nothing is in flight.
    pub fn start(&mut self) -> Option<T> {
        self.started = true;
        self.dispatch()
    }

    /// Mark the in-flight entry done and hand back the next one
    pub fn complete(&mut self) -> Option<T> {
        self.in_flight = false;
        self.dispatch()
    }

    /// Drop everything still pending and stop dispatching.
    /// Returns the number of dropped entries.
    pub fn cancel(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.started = false;
        self.in_flight = false;
        dropped
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn is_idle(&self) -> bool {
        !self.in_flight && self.pending.is_empty()
    }

    fn dispatch(&mut self) -> Option<T> {
        if !self.started || self.in_flight {
            return None;
        }
        let next = self.pending.pop_front()?;
        self.in_flight = true;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_dispatches_before_start() {
        let mut queue = LoadQueue::new();
        queue.enqueue(1);
        assert_eq!(queue.complete(), None);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.start(), Some(1));
    }

    #[test]
    fn only_one_entry_in_flight() {
        let mut queue = LoadQueue::new();
        queue.enqueue("a");
        queue.enqueue("b");
        assert_eq!(queue.start(), Some("a"));
        assert_eq!(queue.start(), None);
        assert!(queue.in_flight());
        assert_eq!(queue.complete(), Some("b"));
        assert_eq!(queue.complete(), None);
        assert!(queue.is_idle());
    }

    #[test]
    fn entries_dispatch_in_enqueue_order() {
        let mut queue = LoadQueue::new();
        for i in 0..5 {
            queue.enqueue(i);
        }
        let mut order = vec![queue.start().unwrap()];
        while let Some(next) = queue.complete() {
            order.push(next);
        }
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn enqueue_after_drain_resumes_on_start() {
        let mut queue = LoadQueue::new();
        queue.enqueue(1);
        assert_eq!(queue.start(), Some(1));
        assert_eq!(queue.complete(), None);
        queue.enqueue(2);
        assert_eq!(queue.start(), Some(2));
    }

    #[test]
    fn cancel_drops_pending_and_stops() {
        let mut queue = LoadQueue::new();
        queue.enqueue(1);
        queue.enqueue(2);
        queue.enqueue(3);
        assert_eq!(queue.start(), Some(1));
        assert_eq!(queue.cancel(), 2);
        assert_eq!(queue.complete(), None);
        assert!(queue.is_idle());
    }
}

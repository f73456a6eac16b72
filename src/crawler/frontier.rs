//! Bounded FIFO frontier of pending crawl tasks
//!
//! The frontier is deliberately lossy: pushes beyond capacity are dropped and
//! reported as [`PushOutcome::Dropped`]. It performs no URL dedup; that is
//! checked when a task is processed.

use crate::crawler::task::CrawlTask;
use std::collections::VecDeque;

/// Result of pushing a task onto the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted,
    Dropped,
}

impl PushOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PushOutcome::Accepted)
    }
}

/// Breadth-first work queue with a hard capacity
#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<CrawlTask>,
    capacity: usize,
}

impl Frontier {
    /// Creates an empty frontier holding at most `capacity` tasks
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Creates a frontier pre-filled with seed tasks (subject to capacity)
    pub fn with_seeds(capacity: usize, seeds: impl IntoIterator<Item = CrawlTask>) -> Self {
        let mut frontier = Self::new(capacity);
        for seed in seeds {
            if !frontier.push(seed).is_accepted() {
                tracing::warn!("Frontier full while seeding; extra seeds dropped");
                break;
            }
        }
        frontier
    }

    /// Appends a task to the tail, or drops it if the frontier is full
    pub fn push(&mut self, task: CrawlTask) -> PushOutcome {
        if self.queue.len() >= self.capacity {
            tracing::debug!(
                "Frontier at capacity ({}), dropping {} task {}",
                self.capacity,
                task.role,
                task.url
            );
            return PushOutcome::Dropped;
        }

        self.queue.push_back(task);
        PushOutcome::Accepted
    }

    /// Removes and returns the oldest task
    pub fn pop(&mut self) -> Option<CrawlTask> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::task::TaskRole;
    use url::Url;

    fn task(n: usize) -> CrawlTask {
        let url = Url::parse(&format!("https://example.com/author/{}-x", n)).unwrap();
        CrawlTask::seed(url, TaskRole::Detail)
    }

    #[test]
    fn test_new_frontier() {
        let frontier = Frontier::new(10);
        assert_eq!(frontier.len(), 0);
        assert!(frontier.is_empty());
        assert_eq!(frontier.capacity(), 10);
    }

    #[test]
    fn test_fifo_order() {
        let mut frontier = Frontier::new(10);
        for n in 0..3 {
            assert!(frontier.push(task(n)).is_accepted());
        }

        assert_eq!(frontier.pop(), Some(task(0)));
        assert_eq!(frontier.pop(), Some(task(1)));
        assert_eq!(frontier.pop(), Some(task(2)));
        assert_eq!(frontier.pop(), None);
    }

    #[test]
    fn test_push_beyond_capacity_is_dropped() {
        let mut frontier = Frontier::new(2);
        assert_eq!(frontier.push(task(0)), PushOutcome::Accepted);
        assert_eq!(frontier.push(task(1)), PushOutcome::Accepted);
        assert_eq!(frontier.push(task(2)), PushOutcome::Dropped);
        assert_eq!(frontier.len(), 2);

        frontier.pop();
        assert_eq!(frontier.push(task(3)), PushOutcome::Accepted);
        assert_eq!(frontier.len(), 2);
    }

    #[test]
    fn test_duplicates_are_allowed() {
        let mut frontier = Frontier::new(5);
        frontier.push(task(7));
        frontier.push(task(7));
        assert_eq!(frontier.len(), 2);
    }

    #[test]
    fn test_with_seeds_respects_capacity() {
        let frontier = Frontier::with_seeds(3, (0..5).map(task));
        assert_eq!(frontier.len(), 3);
    }
}

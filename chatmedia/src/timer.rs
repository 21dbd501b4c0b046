//! Deferred full-tier promotions.
//!
//! After a thumbnail settles, the scheduler arms a one-shot promotion for the
//! image. Promotions are kept in a due-timestamp queue that the dispatcher
//! drains on each tick, so the delay is driven by the tokio clock and can be
//! advanced deterministically in tests.
//!
//! At most one promotion is armed per image; re-arming replaces the previous
//! deadline. Cancelling drops the image's entry, so nothing refers to an image
//! after it is destroyed.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use tokio::time::Instant;

use crate::media::LogicalImageId;

/// Due-timestamp queue of pending promotions.
#[derive(Debug)]
pub struct PromotionTimer {
    delay: Duration,
    /// Min-heap of `(due, generation)`; stale entries are skipped on pop.
    deadlines: BinaryHeap<Reverse<(Instant, u64)>>,
    /// Live entries by generation.
    armed: HashMap<u64, LogicalImageId>,
    /// Current generation per image.
    by_image: HashMap<LogicalImageId, u64>,
    next_generation: u64,
}

impl PromotionTimer {
    /// Creates a timer that fires `delay` after each promotion is scheduled.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadlines: BinaryHeap::new(),
            armed: HashMap::new(),
            by_image: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Arms a promotion for `image`, due one delay from now.
    pub fn schedule(&mut self, image: LogicalImageId) {
        self.cancel(&image);

        let generation = self.next_generation;
        self.next_generation += 1;

        let due = Instant::now() + self.delay;
        self.deadlines.push(Reverse((due, generation)));
        self.armed.insert(generation, image.clone());
        self.by_image.insert(image, generation);
    }

    /// Drops the pending promotion for `image`, if any.
    pub fn cancel(&mut self, image: &LogicalImageId) -> bool {
        match self.by_image.remove(image) {
            Some(generation) => {
                self.armed.remove(&generation);
                true
            }
            None => false,
        }
    }

    /// Returns true if `image` has a pending promotion.
    pub fn is_pending(&self, image: &LogicalImageId) -> bool {
        self.by_image.contains_key(image)
    }

    /// Removes and returns every promotion due at or before `now`, in due order.
    pub fn take_due(&mut self, now: Instant) -> Vec<LogicalImageId> {
        let mut due = Vec::new();
        while let Some(Reverse((deadline, generation))) = self.deadlines.peek().copied() {
            if deadline > now {
                break;
            }
            self.deadlines.pop();
            if let Some(image) = self.armed.remove(&generation) {
                self.by_image.remove(&image);
                due.push(image);
            }
        }
        due
    }

    /// Number of pending promotions.
    pub fn len(&self) -> usize {
        self.armed.len()
    }

    /// Returns true if no promotion is pending.
    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> LogicalImageId {
        LogicalImageId::new(name)
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_due_before_delay() {
        let mut timer = PromotionTimer::new(Duration::from_millis(5000));
        timer.schedule(id("a"));

        tokio::time::advance(Duration::from_millis(4999)).await;
        assert!(timer.take_due(Instant::now()).is_empty());
        assert!(timer.is_pending(&id("a")));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(timer.take_due(Instant::now()), vec![id("a")]);
        assert!(timer.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_in_due_order() {
        let mut timer = PromotionTimer::new(Duration::from_millis(100));
        timer.schedule(id("a"));
        tokio::time::advance(Duration::from_millis(10)).await;
        timer.schedule(id("b"));

        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(timer.take_due(Instant::now()), vec![id("a"), id("b")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_promotion() {
        let mut timer = PromotionTimer::new(Duration::from_millis(100));
        timer.schedule(id("a"));
        assert!(timer.cancel(&id("a")));
        assert!(!timer.cancel(&id("a")));

        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(timer.take_due(Instant::now()).is_empty());
        assert_eq!(timer.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_deadline() {
        let mut timer = PromotionTimer::new(Duration::from_millis(100));
        timer.schedule(id("a"));
        tokio::time::advance(Duration::from_millis(60)).await;
        timer.schedule(id("a"));
        assert_eq!(timer.len(), 1);

        // The first deadline passes without firing
        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(timer.take_due(Instant::now()).is_empty());

        tokio::time::advance(Duration::from_millis(40)).await;
        assert_eq!(timer.take_due(Instant::now()), vec![id("a")]);
    }
}

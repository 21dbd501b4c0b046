//! Scheduler statistics for debugging and user feedback.
//!
//! ```text
//! Scheduler state ─────► SchedulerStats ─────► Views
//!                        (point-in-time copy)   (CLI JSON, logs)
//! ```

use std::fmt;

use serde::Serialize;

use crate::queue::QueueLengths;

/// Point-in-time snapshot of the scheduler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Pending tasks per queue.
    pub queues: QueueLengths,

    /// Loads currently in flight.
    pub current_loading: usize,

    /// Registered images.
    pub total_images: usize,

    /// Images with a displayed thumbnail.
    pub loaded_thumbnails: usize,

    /// Images whose full tier has been fetched.
    pub loaded_full_images: usize,

    /// Images out of automatic scheduling after a failed `Small` tier.
    pub failed_images: usize,

    /// Armed full-tier promotions.
    pub pending_promotions: usize,
}

impl SchedulerStats {
    /// Returns true when nothing is queued, in flight or waiting to promote.
    pub fn is_idle(&self) -> bool {
        self.queues.total() == 0 && self.current_loading == 0 && self.pending_promotions == 0
    }

    /// Renders the snapshot as pretty-printed JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| String::from("{}"))
    }
}

impl fmt::Display for SchedulerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} images: {} thumbnails, {} full, {} failed | loading {} | queued {} | promotions {}",
            self.total_images,
            self.loaded_thumbnails,
            self.loaded_full_images,
            self.failed_images,
            self.current_loading,
            self.queues.total(),
            self.pending_promotions
        )
    }
}

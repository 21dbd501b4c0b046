//! Priority queues for pending image loads.
//!
//! The scheduler keeps four queues, drained in a fixed order:
//!
//! 1. `UserRequested` - explicit user requests for full fidelity
//! 2. `VisibleThumbnails` - thumbnails of images inside the viewport
//! 3. `HiddenThumbnails` - thumbnails of images outside the viewport
//! 4. `FullImages` - background full-fidelity prefetch
//!
//! Within a queue, tasks come out in enqueue order (earliest stamp first).
//! Enqueue is idempotent per `(image, queue)`: a second enqueue of an image
//! already waiting in that queue is ignored.
//!
//! # Example
//!
//! ```
//! use chatmedia::media::PlaceholderRef;
//! use chatmedia::queue::{QueueName, QueueSet};
//!
//! let mut queues = QueueSet::new();
//! queues.enqueue(QueueName::HiddenThumbnails, "a".into(), PlaceholderRef(1));
//! queues.enqueue(QueueName::VisibleThumbnails, "b".into(), PlaceholderRef(2));
//!
//! // Visible thumbnails are dispatched before hidden ones
//! let next = queues.dequeue_next().unwrap();
//! assert_eq!(next.image.as_str(), "b");
//! ```

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::fmt;

use serde::Serialize;
use tokio::time::Instant;

use crate::media::{LogicalImageId, PlaceholderRef};

// =============================================================================
// Queue Names
// =============================================================================

/// One of the four scheduler queues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum QueueName {
    UserRequested,
    VisibleThumbnails,
    HiddenThumbnails,
    FullImages,
}

impl QueueName {
    /// Queues in dispatch priority order, highest first.
    pub const DISPATCH_ORDER: [QueueName; 4] = [
        QueueName::UserRequested,
        QueueName::VisibleThumbnails,
        QueueName::HiddenThumbnails,
        QueueName::FullImages,
    ];

    /// The kind of load a task in this queue performs.
    pub fn job(&self) -> LoadJob {
        match self {
            QueueName::VisibleThumbnails | QueueName::HiddenThumbnails => LoadJob::Thumbnail,
            QueueName::UserRequested | QueueName::FullImages => LoadJob::Full,
        }
    }

    /// Short name for logs and stats.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::UserRequested => "user_requested",
            QueueName::VisibleThumbnails => "visible_thumbnails",
            QueueName::HiddenThumbnails => "hidden_thumbnails",
            QueueName::FullImages => "full_images",
        }
    }

    fn index(&self) -> usize {
        match self {
            QueueName::UserRequested => 0,
            QueueName::VisibleThumbnails => 1,
            QueueName::HiddenThumbnails => 2,
            QueueName::FullImages => 3,
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a dispatched task loads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadJob {
    /// `Small`, then `Medium`.
    Thumbnail,
    /// `Full` only, without changing the display.
    Full,
}

// =============================================================================
// Load Task
// =============================================================================

/// A pending load waiting in one queue.
///
/// Tasks are created by [`QueueSet::enqueue`], which stamps them and derives
/// the job kind from the destination queue.
#[derive(Clone)]
pub struct LoadTask {
    /// Image to load.
    pub image: LogicalImageId,

    /// Presentation handle passed back on completion.
    pub placeholder: PlaceholderRef,

    /// Queue the task was placed in.
    pub queue: QueueName,

    /// When the task was enqueued. Earlier wins.
    pub enqueued_at: Instant,

    /// Tie-break for equal stamps.
    sequence: u64,
}

impl LoadTask {
    /// The kind of load this task performs.
    pub fn job(&self) -> LoadJob {
        self.queue.job()
    }

    /// How long the task has been waiting.
    pub fn wait_time(&self) -> std::time::Duration {
        self.enqueued_at.elapsed()
    }
}

impl fmt::Debug for LoadTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadTask")
            .field("image", &self.image)
            .field("queue", &self.queue)
            .field("job", &self.job())
            .field("sequence", &self.sequence)
            .finish()
    }
}

// Ordering for BinaryHeap: earliest stamp first, then lowest sequence
impl PartialEq for LoadTask {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for LoadTask {}

impl PartialOrd for LoadTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LoadTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, so both keys are reversed
        other
            .enqueued_at
            .cmp(&self.enqueued_at)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

// =============================================================================
// Single Queue
// =============================================================================

/// One FIFO-by-stamp queue with at most one task per image.
#[derive(Default)]
struct TaskQueue {
    heap: BinaryHeap<LoadTask>,
    members: HashSet<LogicalImageId>,
}

impl TaskQueue {
    fn push(&mut self, task: LoadTask) -> bool {
        if !self.members.insert(task.image.clone()) {
            return false;
        }
        self.heap.push(task);
        true
    }

    fn pop(&mut self) -> Option<LoadTask> {
        let task = self.heap.pop()?;
        self.members.remove(&task.image);
        Some(task)
    }

    fn remove(&mut self, id: &LogicalImageId) -> bool {
        if !self.members.remove(id) {
            return false;
        }
        let remaining: Vec<_> = self.heap.drain().filter(|t| t.image != *id).collect();
        self.heap = BinaryHeap::from(remaining);
        true
    }

    fn contains(&self, id: &LogicalImageId) -> bool {
        self.members.contains(id)
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}

// =============================================================================
// Queue Set
// =============================================================================

/// Queue lengths at a point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QueueLengths {
    pub user_requested: usize,
    pub visible_thumbnails: usize,
    pub hidden_thumbnails: usize,
    pub full_images: usize,
}

impl QueueLengths {
    /// Total number of pending tasks.
    pub fn total(&self) -> usize {
        self.user_requested + self.visible_thumbnails + self.hidden_thumbnails + self.full_images
    }
}

/// The four scheduler queues.
///
/// Not thread-safe; the scheduler owns it and mutates it from a single
/// context.
#[derive(Default)]
pub struct QueueSet {
    queues: [TaskQueue; 4],
    next_sequence: u64,
}

impl QueueSet {
    /// Creates four empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task for `image` to `queue` with a fresh stamp.
    ///
    /// Returns false if the image already had a task in that queue.
    pub fn enqueue(
        &mut self,
        queue: QueueName,
        image: LogicalImageId,
        placeholder: PlaceholderRef,
    ) -> bool {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.queues[queue.index()].push(LoadTask {
            image,
            placeholder,
            queue,
            enqueued_at: Instant::now(),
            sequence,
        })
    }

    /// Removes and returns the earliest task of `queue`.
    pub fn dequeue(&mut self, queue: QueueName) -> Option<LoadTask> {
        self.queues[queue.index()].pop()
    }

    /// Removes and returns the next task in dispatch priority order.
    pub fn dequeue_next(&mut self) -> Option<LoadTask> {
        QueueName::DISPATCH_ORDER
            .iter()
            .find_map(|queue| self.dequeue(*queue))
    }

    /// Removes a pending task for `image` from `queue`, if present.
    pub fn remove(&mut self, queue: QueueName, image: &LogicalImageId) -> bool {
        self.queues[queue.index()].remove(image)
    }

    /// Moves an image's task from one queue to another with a fresh stamp.
    pub fn requeue(
        &mut self,
        from: QueueName,
        to: QueueName,
        image: LogicalImageId,
        placeholder: PlaceholderRef,
    ) -> bool {
        self.remove(from, &image);
        self.enqueue(to, image, placeholder)
    }

    /// Removes every pending task for `image`. Returns how many were removed.
    pub fn remove_everywhere(&mut self, image: &LogicalImageId) -> usize {
        self.queues
            .iter_mut()
            .map(|queue| queue.remove(image))
            .filter(|removed| *removed)
            .count()
    }

    /// Returns true if `image` has a pending task in `queue`.
    pub fn contains(&self, queue: QueueName, image: &LogicalImageId) -> bool {
        self.queues[queue.index()].contains(image)
    }

    /// Number of pending tasks in `queue`.
    pub fn len(&self, queue: QueueName) -> usize {
        self.queues[queue.index()].len()
    }

    /// Returns true if every queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(|queue| queue.len() == 0)
    }

    /// Pending task count per queue.
    pub fn lengths(&self) -> QueueLengths {
        QueueLengths {
            user_requested: self.len(QueueName::UserRequested),
            visible_thumbnails: self.len(QueueName::VisibleThumbnails),
            hidden_thumbnails: self.len(QueueName::HiddenThumbnails),
            full_images: self.len(QueueName::FullImages),
        }
    }
}

impl fmt::Debug for QueueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueSet")
            .field("lengths", &self.lengths())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

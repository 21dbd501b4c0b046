//! Progressive media-loading scheduler.
//!
//! Decides, for every registered image, when and at what fidelity to fetch
//! it. The [`Scheduler`] is the single-context core; the [`SchedulerDaemon`]
//! drives it on a tokio task behind a [`SchedulerHandle`].
//!
//! # Lifecycle of one image
//!
//! 1. `register` queues a thumbnail task in `HiddenThumbnails`.
//! 2. Visibility events move it between `HiddenThumbnails` and
//!    `VisibleThumbnails` until it loads.
//! 3. A dispatched thumbnail task shows `Small` provisionally, then `Medium`.
//! 4. After `promotion_delay_ms` the full tier is prefetched in the
//!    background through `FullImages`.
//! 5. `request_full` jumps the line through `UserRequested` at any time.

mod daemon;
mod dispatcher;
mod load;

pub use daemon::{SchedulerCommand, SchedulerDaemon, SchedulerHandle, DEFAULT_CHANNEL_CAPACITY};
pub use dispatcher::Scheduler;
pub use load::{LoadOutcome, LoadResult};

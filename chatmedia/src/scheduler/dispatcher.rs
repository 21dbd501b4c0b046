//! The scheduler core.
//!
//! [`Scheduler`] owns the resource store, the queue set, the promotion timer
//! and every in-flight load. It is a plain struct mutated from one context:
//! [`Scheduler::tick`] only starts loads, and completions are applied through
//! [`Scheduler::complete`] on the same context, so no state is shared with the
//! load futures beyond the collaborators they were given.
//!
//! # Dispatch
//!
//! ```text
//!  register ──► HiddenThumbnails ◄──leave── VisibleThumbnails ◄── enter
//!                     │                            │
//!  request_full ──► UserRequested                  │
//!                     │                            │
//!  promotion ────► FullImages                      │
//!                     ▼                            ▼
//!              tick(): UserRequested > Visible > Hidden > Full
//!                     │  while current_loading < max_concurrent
//!                     ▼
//!              FuturesUnordered<LoadOutcome> ──► complete()
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::{ConfigError, SchedulerConfig};
use crate::error::LoadError;
use crate::media::{FidelityTier, LogicalImage, LogicalImageId, PlaceholderRef};
use crate::presentation::PresentationAdapter;
use crate::provider::{BoxFuture, ByteFetcher, ResourceLocator};
use crate::queue::{LoadJob, LoadTask, QueueName, QueueSet};
use crate::store::{ResourceState, ResourceStore};
use crate::telemetry::SchedulerStats;
use crate::timer::PromotionTimer;
use crate::viewport::{VisibilityChange, VisibilityEvent};

use super::load::{LoadContext, LoadOutcome, LoadResult};

type InFlight = FuturesUnordered<BoxFuture<'static, LoadOutcome>>;
type LoadKey = (LogicalImageId, LoadJob);

/// A started load of a live image.
struct ActiveLoad {
    id: u64,
    destroyed: CancellationToken,
}

/// Progressive media-loading scheduler.
pub struct Scheduler {
    config: SchedulerConfig,
    store: ResourceStore,
    queues: QueueSet,
    promotions: PromotionTimer,
    context: LoadContext,
    in_flight: InFlight,
    /// In-flight loads of live images. Loads of destroyed images leave this
    /// map but keep their slot until they complete.
    active: HashMap<LoadKey, ActiveLoad>,
    /// User requests waiting for an in-flight load of the same key.
    deferred: HashMap<LoadKey, LoadTask>,
    next_load_id: u64,
    current_loading: usize,
    last_cleanup: Instant,
}

impl Scheduler {
    /// Creates a scheduler.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: SchedulerConfig,
        locator: Arc<dyn ResourceLocator>,
        fetcher: Arc<dyn ByteFetcher>,
        presenter: Arc<dyn PresentationAdapter>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            promotions: PromotionTimer::new(config.promotion_delay()),
            config,
            store: ResourceStore::new(),
            queues: QueueSet::new(),
            context: LoadContext {
                locator,
                fetcher,
                presenter,
            },
            in_flight: FuturesUnordered::new(),
            active: HashMap::new(),
            deferred: HashMap::new(),
            next_load_id: 0,
            current_loading: 0,
            last_cleanup: Instant::now(),
        })
    }

    /// Registers an image placeholder.
    ///
    /// A new image gets a thumbnail task in `HiddenThumbnails`. A known image
    /// only has its placeholder refreshed. Returns true for a new image.
    pub fn register(&mut self, image: LogicalImage, placeholder: PlaceholderRef) -> bool {
        let id = image.id.clone();
        if !self.store.register(image, placeholder) {
            debug!(image = %id, "Placeholder refreshed");
            return false;
        }

        debug!(image = %id, "Image registered");
        self.queues
            .enqueue(QueueName::HiddenThumbnails, id, placeholder);
        true
    }

    /// Applies a visibility transition from the viewport tracker.
    pub fn apply_visibility(&mut self, event: VisibilityEvent) {
        match event.change {
            VisibilityChange::Enter => self.on_enter(&event.image),
            VisibilityChange::Leave => self.on_leave(&event.image),
        }
    }

    /// Moves a pending thumbnail task to `VisibleThumbnails`.
    pub fn on_enter(&mut self, image: &LogicalImageId) {
        self.reclassify(image, QueueName::HiddenThumbnails, QueueName::VisibleThumbnails);
    }

    /// Moves a pending thumbnail task to `HiddenThumbnails`.
    pub fn on_leave(&mut self, image: &LogicalImageId) {
        self.reclassify(image, QueueName::VisibleThumbnails, QueueName::HiddenThumbnails);
    }

    fn reclassify(&mut self, image: &LogicalImageId, from: QueueName, to: QueueName) {
        let Some(state) = self.store.get(image) else {
            return;
        };
        if !state.needs_thumbnail() || self.is_loading(image, LoadJob::Thumbnail) {
            return;
        }

        let placeholder = state.placeholder;
        self.queues.requeue(from, to, image.clone(), placeholder);
        trace!(image = %image, from = %from, to = %to, "Thumbnail task moved");
    }

    /// Queues the full tier at the highest priority.
    ///
    /// Enqueues even if the full tier is already loaded, and clears a previous
    /// thumbnail failure. Returns false if the image is not registered.
    pub fn request_full(&mut self, image: &LogicalImageId) -> bool {
        let Some(state) = self.store.get(image) else {
            debug!(image = %image, "Full tier requested for unknown image");
            return false;
        };

        let placeholder = state.placeholder;
        self.store.clear_failed(image);
        let added = self
            .queues
            .enqueue(QueueName::UserRequested, image.clone(), placeholder);
        info!(image = %image, queued = added, "Full tier requested");
        true
    }

    /// Forces a load of `tier`, bypassing the visibility and loaded guards.
    ///
    /// `Small` and `Medium` queue a thumbnail task in `VisibleThumbnails` and
    /// clear a previous failure; `Full` queues into `FullImages`.
    pub fn manual_load(&mut self, image: &LogicalImageId, tier: FidelityTier) -> bool {
        let Some(state) = self.store.get(image) else {
            return false;
        };

        let placeholder = state.placeholder;
        let queue = if tier.is_thumbnail() {
            self.store.clear_failed(image);
            self.queues.remove(QueueName::HiddenThumbnails, image);
            QueueName::VisibleThumbnails
        } else {
            QueueName::FullImages
        };

        self.queues.enqueue(queue, image.clone(), placeholder);
        debug!(image = %image, tier = %tier, queue = %queue, "Manual load queued");
        true
    }

    /// Destroys an image.
    ///
    /// Pending tasks and the promotion are dropped. In-flight loads run to
    /// completion but no longer notify the presentation layer, and their
    /// outcomes are discarded even if the id is registered again.
    pub fn destroy(&mut self, image: &LogicalImageId) -> bool {
        if self.store.remove(image).is_none() {
            return false;
        }

        let removed = self.forget(image);
        debug!(image = %image, pending_removed = removed, "Image destroyed");
        true
    }

    /// Drops every reference the scheduler holds to a removed image.
    fn forget(&mut self, image: &LogicalImageId) -> usize {
        let removed = self.queues.remove_everywhere(image);
        self.promotions.cancel(image);
        for job in [LoadJob::Thumbnail, LoadJob::Full] {
            let key = (image.clone(), job);
            self.deferred.remove(&key);
            if let Some(load) = self.active.remove(&key) {
                load.destroyed.cancel();
            }
        }
        removed
    }

    /// Destroys every image whose placeholder is no longer attached.
    pub fn cleanup(&mut self) -> Vec<LogicalImageId> {
        self.last_cleanup = Instant::now();

        let presenter = Arc::clone(&self.context.presenter);
        let detached = self
            .store
            .cleanup(|placeholder| presenter.is_attached(placeholder));

        for image in &detached {
            self.forget(image);
        }

        if !detached.is_empty() {
            debug!(count = detached.len(), "Detached images cleaned up");
        }
        detached
    }

    /// Runs one dispatch step.
    ///
    /// Fires due promotions, runs the cleanup pass when its interval has
    /// elapsed, then admits queued tasks until the concurrency budget is
    /// spent. Never waits on a load. Returns the number of loads started.
    pub fn tick(&mut self) -> usize {
        let now = Instant::now();
        self.fire_promotions(now);
        if now.duration_since(self.last_cleanup) >= self.config.cleanup_interval() {
            self.cleanup();
        }

        let mut started = 0;
        while self.current_loading < self.config.max_concurrent {
            let Some(task) = self.queues.dequeue_next() else {
                break;
            };
            if self.start(task) {
                started += 1;
            }
        }
        started
    }

    fn fire_promotions(&mut self, now: Instant) {
        for image in self.promotions.take_due(now) {
            let Some(state) = self.store.get(&image) else {
                continue;
            };
            if !state.wants_promotion() {
                trace!(image = %image, "Promotion no longer needed");
                continue;
            }

            let placeholder = state.placeholder;
            debug!(image = %image, "Promoting to full tier");
            self.queues
                .enqueue(QueueName::FullImages, image, placeholder);
        }
    }

    fn start(&mut self, task: LoadTask) -> bool {
        if !self.store.contains(&task.image) {
            debug!(
                image = %task.image,
                error = %LoadError::ImageDestroyed(task.image.clone()),
                "Dropping task"
            );
            return false;
        }

        let key = (task.image.clone(), task.job());
        if self.active.contains_key(&key) {
            if task.queue == QueueName::UserRequested {
                debug!(image = %task.image, "Full load in flight, deferring user request");
                self.deferred.insert(key, task);
            } else {
                debug!(image = %task.image, job = ?key.1, "Load already in flight, dropping task");
            }
            return false;
        }

        debug!(
            image = %task.image,
            queue = %task.queue,
            waited_ms = task.wait_time().as_millis() as u64,
            "Starting load"
        );

        let id = self.next_load_id;
        self.next_load_id += 1;
        let destroyed = CancellationToken::new();
        self.active.insert(
            key,
            ActiveLoad {
                id,
                destroyed: destroyed.clone(),
            },
        );
        self.current_loading += 1;

        let context = self.context.clone();
        self.in_flight.push(context.run(id, task, destroyed).boxed());
        true
    }

    /// Applies a finished load to the scheduler state.
    ///
    /// Only the load currently registered for the image's key may change its
    /// state; outcomes of loads whose image was destroyed just free the slot.
    pub fn complete(&mut self, outcome: LoadOutcome) {
        self.current_loading = self.current_loading.saturating_sub(1);

        let key = (outcome.image, outcome.job);
        if self.active.get(&key).map(|load| load.id) != Some(outcome.load_id) {
            // ImageDestroyed: nothing left to update or notify
            trace!(
                image = %key.0,
                load_id = outcome.load_id,
                "Completion for destroyed image absorbed"
            );
            return;
        }
        self.active.remove(&key);
        self.resume_deferred(&key);

        let image = key.0;
        match outcome.result {
            LoadResult::ThumbnailSettled { best } => {
                self.store.mark_thumbnail_loaded(&image, best);
                self.queues.remove(QueueName::VisibleThumbnails, &image);
                self.queues.remove(QueueName::HiddenThumbnails, &image);
                self.promotions.schedule(image.clone());
                debug!(image = %image, best = %best, "Thumbnail loaded");
            }
            LoadResult::ThumbnailFailed => {
                self.store.mark_failed(&image);
                self.queues.remove(QueueName::VisibleThumbnails, &image);
                self.queues.remove(QueueName::HiddenThumbnails, &image);
                debug!(image = %image, "Thumbnail failed, image parked");
            }
            LoadResult::FullLoaded => {
                self.store.mark_full_loaded(&image);
                debug!(image = %image, "Full tier loaded");
            }
            LoadResult::FullFailed => {
                debug!(image = %image, "Full tier failed");
            }
        }
    }

    /// Puts a user request that waited on `key` back at the head of the line.
    fn resume_deferred(&mut self, key: &LoadKey) {
        let Some(task) = self.deferred.remove(key) else {
            return;
        };
        let Some(state) = self.store.get(&task.image) else {
            return;
        };

        let placeholder = state.placeholder;
        debug!(image = %task.image, "Resuming deferred user request");
        self.queues.enqueue(task.queue, task.image, placeholder);
    }

    /// Waits for the next in-flight load to finish.
    ///
    /// Resolves to `None` immediately when nothing is in flight. The caller
    /// passes the outcome to [`Scheduler::complete`].
    pub async fn next_completion(&mut self) -> Option<LoadOutcome> {
        self.in_flight.next().await
    }

    /// Applies every completion that is ready without waiting.
    ///
    /// Returns the number of completions applied.
    pub fn poll_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Some(Some(outcome)) = self.in_flight.next().now_or_never() {
            self.complete(outcome);
            applied += 1;
        }
        applied
    }

    /// Waits for every in-flight load and applies the outcomes.
    pub async fn settle(&mut self) {
        while let Some(outcome) = self.next_completion().await {
            self.complete(outcome);
        }
    }

    /// Returns true if any load is in flight.
    pub fn has_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Returns true if a load of `job` for `image` is in flight.
    pub fn is_loading(&self, image: &LogicalImageId, job: LoadJob) -> bool {
        self.active.contains_key(&(image.clone(), job))
    }

    /// Loads currently in flight.
    pub fn current_loading(&self) -> usize {
        self.current_loading
    }

    /// Load state of one image.
    pub fn state(&self, image: &LogicalImageId) -> Option<&ResourceState> {
        self.store.get(image)
    }

    /// Pending tasks.
    pub fn queues(&self) -> &QueueSet {
        &self.queues
    }

    /// Returns true if a promotion is armed for `image`.
    pub fn promotion_pending(&self, image: &LogicalImageId) -> bool {
        self.promotions.is_pending(image)
    }

    /// Effective configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Point-in-time statistics.
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            queues: self.queues.lengths(),
            current_loading: self.current_loading,
            total_images: self.store.len(),
            loaded_thumbnails: self.store.loaded_thumbnails(),
            loaded_full_images: self.store.loaded_full_images(),
            failed_images: self.store.failed_images(),
            pending_promotions: self.promotions.len(),
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("queues", &self.queues)
            .field("current_loading", &self.current_loading)
            .field("images", &self.store.len())
            .finish()
    }
}

//! Execution of one admitted load task.
//!
//! A thumbnail task fetches `Small` and shows it immediately as a provisional
//! preview (first light), then fetches `Medium` and settles the display. A
//! `Medium` failure is reported but the thumbnail still counts as loaded. A
//! `Small` failure takes the image out of automatic scheduling.
//!
//! A full task fetches `Full` in the background without touching the display.
//!
//! Loads never retry. They report back to the scheduler through a
//! [`LoadOutcome`]; only the scheduler mutates load state.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::Url;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::LoadError;
use crate::media::{FidelityTier, LogicalImageId};
use crate::presentation::{DisplayMode, PresentationAdapter, TierAvailable};
use crate::provider::{ByteFetcher, ResourceLocator};
use crate::queue::{LoadJob, LoadTask};

/// What a finished load achieved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadResult {
    /// At least `Small` was displayed; `best` is the highest tier shown.
    ThumbnailSettled { best: FidelityTier },
    /// `Small` failed; nothing was displayed.
    ThumbnailFailed,
    /// `Full` was fetched.
    FullLoaded,
    /// `Full` failed; state is unchanged.
    FullFailed,
}

/// Completion report of one load task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Id the scheduler gave the load when it started.
    pub load_id: u64,
    pub image: LogicalImageId,
    pub job: LoadJob,
    pub result: LoadResult,
}

/// Collaborators shared by every load.
#[derive(Clone)]
pub(crate) struct LoadContext {
    pub locator: Arc<dyn ResourceLocator>,
    pub fetcher: Arc<dyn ByteFetcher>,
    pub presenter: Arc<dyn PresentationAdapter>,
}

impl LoadContext {
    /// Runs `task` to completion, tagging the outcome with `load_id`.
    ///
    /// `destroyed` is cancelled by the scheduler if the image is destroyed
    /// while the load is in flight; the load still finishes but stops
    /// notifying the presentation layer.
    pub async fn run(
        self,
        load_id: u64,
        task: LoadTask,
        destroyed: CancellationToken,
    ) -> LoadOutcome {
        let job = task.job();
        let result = match job {
            LoadJob::Thumbnail => self.load_thumbnail(&task, &destroyed).await,
            LoadJob::Full => self.load_full(&task, &destroyed).await,
        };
        LoadOutcome {
            load_id,
            image: task.image,
            job,
            result,
        }
    }

    async fn load_thumbnail(&self, task: &LoadTask, destroyed: &CancellationToken) -> LoadResult {
        let image = &task.image;

        match self.fetch_tier(image, FidelityTier::Small).await {
            Ok(data) => self.announce(
                task,
                FidelityTier::Small,
                DisplayMode::Provisional,
                data,
                destroyed,
            ),
            Err(error) => {
                self.report_failure(image, FidelityTier::Small, &error, destroyed);
                return LoadResult::ThumbnailFailed;
            }
        }

        match self.fetch_tier(image, FidelityTier::Medium).await {
            Ok(data) => {
                self.announce(task, FidelityTier::Medium, DisplayMode::Settled, data, destroyed);
                LoadResult::ThumbnailSettled {
                    best: FidelityTier::Medium,
                }
            }
            Err(error) => {
                // Small stays on screen
                self.report_failure(image, FidelityTier::Medium, &error, destroyed);
                LoadResult::ThumbnailSettled {
                    best: FidelityTier::Small,
                }
            }
        }
    }

    async fn load_full(&self, task: &LoadTask, destroyed: &CancellationToken) -> LoadResult {
        match self.fetch_tier(&task.image, FidelityTier::Full).await {
            Ok(data) => {
                self.announce(task, FidelityTier::Full, DisplayMode::Background, data, destroyed);
                LoadResult::FullLoaded
            }
            Err(error) => {
                self.report_failure(&task.image, FidelityTier::Full, &error, destroyed);
                LoadResult::FullFailed
            }
        }
    }

    async fn fetch_tier(&self, image: &LogicalImageId, tier: FidelityTier) -> Result<Bytes, LoadError> {
        let url = self.locator.build_url(image, tier);
        if url.is_empty() || Url::parse(&url).is_err() {
            return Err(LoadError::LocatorUnavailable {
                image: image.clone(),
                tier,
            });
        }

        debug!(image = %image, tier = %tier, "Fetching tier");
        self.fetcher
            .load(&url)
            .await
            .map_err(|e| LoadError::fetch(&url, e))
    }

    fn announce(
        &self,
        task: &LoadTask,
        tier: FidelityTier,
        display: DisplayMode,
        data: Bytes,
        destroyed: &CancellationToken,
    ) {
        if destroyed.is_cancelled() {
            return;
        }
        self.presenter.on_tier_available(&TierAvailable {
            image: task.image.clone(),
            placeholder: task.placeholder,
            tier,
            display,
            data,
        });
    }

    fn report_failure(
        &self,
        image: &LogicalImageId,
        tier: FidelityTier,
        error: &LoadError,
        destroyed: &CancellationToken,
    ) {
        if destroyed.is_cancelled() {
            return;
        }
        warn!(image = %image, tier = %tier, error = %error, "Tier load failed");
        self.presenter.on_load_failed(image, tier, error);
    }
}

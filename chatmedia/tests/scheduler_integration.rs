//! Integration tests for the scheduler daemon.
//!
//! These tests drive the complete flow through the public API:
//! - SchedulerHandle → SchedulerDaemon → Scheduler
//! - ViewportTracker transitions → queue reclassification
//! - Byte fetcher → presentation notifications
//!
//! Run with: `cargo test --test scheduler_integration`

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use chatmedia::error::FetchError;
use chatmedia::presentation::{DisplayMode, PresentationAdapter, TierAvailable};
use chatmedia::provider::{BoxFuture, ByteFetcher, SharedCredential, TemplateLocator};
use chatmedia::viewport::{PlaceholderBounds, Viewport, ViewportTracker};
use chatmedia::{
    FidelityTier, LoadError, LogicalImage, LogicalImageId, PlaceholderRef, Scheduler,
    SchedulerConfig, SchedulerDaemon, SchedulerError, SchedulerHandle,
};

// ============================================================================
// Helper Types
// ============================================================================

const GIF_BYTES: &[u8] = b"GIF89a\x01\x00\x01\x00";

/// Fetcher that serves a GIF for every URL and records each request.
#[derive(Default)]
struct RecordingFetcher {
    requests: Mutex<Vec<String>>,
    broken: Mutex<Vec<String>>,
}

impl RecordingFetcher {
    fn broken_on(fragment: &str) -> Self {
        let fetcher = Self::default();
        fetcher.broken.lock().push(fragment.to_string());
        fetcher
    }

    fn requests_for(&self, fragment: &str) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter(|url| url.contains(fragment))
            .cloned()
            .collect()
    }
}

impl ByteFetcher for RecordingFetcher {
    fn load<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>> {
        Box::pin(async move {
            self.requests.lock().push(url.to_string());
            // Simulate network latency on the tokio clock
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.broken.lock().iter().any(|f| url.contains(f.as_str())) {
                return Err(FetchError::Status(404));
            }
            Ok(Bytes::from_static(GIF_BYTES))
        })
    }
}

/// Presenter that records `(image, tier, display)` and failures.
#[derive(Default)]
struct Screen {
    painted: Mutex<Vec<(String, FidelityTier, DisplayMode)>>,
    failed: Mutex<Vec<(String, FidelityTier)>>,
}

impl PresentationAdapter for Screen {
    fn on_tier_available(&self, event: &TierAvailable) {
        self.painted
            .lock()
            .push((event.image.to_string(), event.tier, event.display));
    }

    fn on_load_failed(&self, image: &LogicalImageId, tier: FidelityTier, _error: &LoadError) {
        self.failed.lock().push((image.to_string(), tier));
    }
}

struct Running {
    handle: SchedulerHandle,
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<Scheduler>,
    fetcher: Arc<RecordingFetcher>,
    screen: Arc<Screen>,
}

fn start(config: SchedulerConfig, fetcher: RecordingFetcher) -> Running {
    let fetcher = Arc::new(fetcher);
    let screen = Arc::new(Screen::default());
    let locator = TemplateLocator::new(
        "https://cdn.chat.test/media",
        SharedCredential::with_token("session"),
    );

    let scheduler = Scheduler::new(config, Arc::new(locator), fetcher.clone(), screen.clone())
        .expect("valid config");
    let (daemon, handle) = SchedulerDaemon::new(scheduler);
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(daemon.run(shutdown.clone()));

    Running {
        handle,
        shutdown,
        task,
        fetcher,
        screen,
    }
}

// ============================================================================
// Integration Tests
// ============================================================================

/// A chat feed where only the first message is on screen: its thumbnail
/// loads before any off-screen image.
#[tokio::test(start_paused = true)]
async fn test_visible_thumbnail_loads_first() {
    let running = start(
        SchedulerConfig::default().with_max_concurrent(1),
        RecordingFetcher::default(),
    );
    let mut tracker = ViewportTracker::new(0);

    for (i, name) in ["m3", "m2", "m1"].iter().enumerate() {
        let bounds = PlaceholderBounds::new(2000.0 - i as f64 * 1000.0, 300.0);
        running
            .handle
            .register(LogicalImage::new(*name, "photo"), PlaceholderRef(i as u64))
            .await
            .unwrap();
        tracker.observe(LogicalImageId::new(*name), bounds);
    }
    for event in tracker.set_viewport(Viewport::new(0.0, 600.0)) {
        running.handle.visibility(event).await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(1_000)).await;

    let painted = running.screen.painted.lock().clone();
    assert_eq!(
        painted.first(),
        Some(&("m1".to_string(), FidelityTier::Small, DisplayMode::Provisional))
    );

    running.shutdown.cancel();
    let scheduler = running.task.await.unwrap();
    assert_eq!(scheduler.stats().loaded_thumbnails, 3);
}

/// Off-screen images get their full tier only after the promotion delay.
#[tokio::test(start_paused = true)]
async fn test_full_tier_prefetched_after_delay() {
    let running = start(SchedulerConfig::default(), RecordingFetcher::default());

    running
        .handle
        .register(LogicalImage::new("w", ""), PlaceholderRef(1))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert!(running.fetcher.requests_for("/w/full").is_empty());
    let state = running.handle.state("w").await.unwrap().unwrap();
    assert!(state.thumbnail_loaded);

    tokio::time::sleep(Duration::from_millis(5_000)).await;
    assert_eq!(running.fetcher.requests_for("/w/full").len(), 1);

    let stats = running.handle.stats().await.unwrap();
    assert_eq!(stats.loaded_full_images, 1);
    assert!(stats.is_idle());

    running.shutdown.cancel();
    running.task.await.unwrap();
}

/// A click on an image fetches its full tier even when already loaded.
#[tokio::test(start_paused = true)]
async fn test_user_request_refetches_full() {
    let running = start(SchedulerConfig::default(), RecordingFetcher::default());

    running
        .handle
        .register(LogicalImage::new("img1", ""), PlaceholderRef(1))
        .await
        .unwrap();
    running.handle.request_full("img1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(running.fetcher.requests_for("/img1/full").len(), 1);

    running.handle.request_full("img1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(running.fetcher.requests_for("/img1/full").len(), 2);

    running.shutdown.cancel();
    running.task.await.unwrap();
}

/// A broken Medium tier leaves the Small preview on screen and is not retried.
#[tokio::test(start_paused = true)]
async fn test_medium_failure_reported_once() {
    let running = start(
        SchedulerConfig::default(),
        RecordingFetcher::broken_on("/z/medium"),
    );

    running
        .handle
        .register(LogicalImage::new("z", ""), PlaceholderRef(1))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(8)).await;

    assert_eq!(
        running.screen.failed.lock().clone(),
        vec![("z".to_string(), FidelityTier::Medium)]
    );
    assert_eq!(running.fetcher.requests_for("/z/medium").len(), 1);

    let stats = running.handle.stats().await.unwrap();
    assert_eq!(stats.loaded_thumbnails, 1);

    running.shutdown.cancel();
    running.task.await.unwrap();
}

/// Destroying an image cancels its pending work and promotion.
#[tokio::test(start_paused = true)]
async fn test_destroyed_image_never_promotes() {
    let running = start(SchedulerConfig::default(), RecordingFetcher::default());

    running
        .handle
        .register(LogicalImage::new("gone", ""), PlaceholderRef(1))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    running.handle.destroy("gone").await.unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(running.fetcher.requests_for("/gone/full").is_empty());
    assert!(running.handle.state("gone").await.unwrap().is_none());

    running.shutdown.cancel();
    running.task.await.unwrap();
}

/// Handles report shutdown once the daemon has stopped.
#[tokio::test(start_paused = true)]
async fn test_handle_after_shutdown() {
    let running = start(SchedulerConfig::default(), RecordingFetcher::default());
    running.shutdown.cancel();
    running.task.await.unwrap();

    let result = running
        .handle
        .register(LogicalImage::new("late", ""), PlaceholderRef(1))
        .await;
    assert_eq!(result, Err(SchedulerError::ShutDown));
}

//! Presentation adapter interface.
//!
//! The scheduler never renders anything. It tells the presentation layer which
//! tier of which image became available (and how it should be shown) or
//! failed. The adapter owns all painting.

use bytes::Bytes;
use tracing::{info, warn};

use crate::error::LoadError;
use crate::media::{FidelityTier, LogicalImageId, PlaceholderRef};

/// How a newly available tier should be shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayMode {
    /// First light: show immediately, marked as a blurred preview.
    Provisional,
    /// Replace whatever is shown and clear the provisional marker.
    Settled,
    /// Prefetched only; do not change what is displayed.
    Background,
}

/// A tier that finished loading.
#[derive(Clone, Debug)]
pub struct TierAvailable {
    pub image: LogicalImageId,
    pub placeholder: PlaceholderRef,
    pub tier: FidelityTier,
    pub display: DisplayMode,
    pub data: Bytes,
}

/// Receives the scheduler's load notifications.
///
/// Notifications for a thumbnail's `Small` tier are delivered as soon as it
/// arrives, before the `Medium` fetch starts.
pub trait PresentationAdapter: Send + Sync + 'static {
    /// A tier is available for painting.
    fn on_tier_available(&self, event: &TierAvailable);

    /// A tier failed to load. Not retried unless the user asks.
    fn on_load_failed(&self, image: &LogicalImageId, tier: FidelityTier, error: &LoadError);

    /// Whether the placeholder is still part of the rendering tree.
    ///
    /// Consulted by the periodic cleanup pass; images whose placeholder is
    /// detached are destroyed.
    fn is_attached(&self, _placeholder: PlaceholderRef) -> bool {
        true
    }
}

/// Adapter that only logs notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPresenter;

impl PresentationAdapter for TracingPresenter {
    fn on_tier_available(&self, event: &TierAvailable) {
        info!(
            image = %event.image,
            tier = %event.tier,
            display = ?event.display,
            bytes = event.data.len(),
            "Tier available"
        );
    }

    fn on_load_failed(&self, image: &LogicalImageId, tier: FidelityTier, error: &LoadError) {
        warn!(image = %image, tier = %tier, error = %error, "Tier failed");
    }
}

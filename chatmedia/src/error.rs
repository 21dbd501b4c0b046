//! Error types for image loading and the scheduler service.
//!
//! None of these errors is fatal to the scheduler. A [`LoadError`] affects a
//! single image and tier; it is reported to the presentation layer and never
//! retried automatically.

use thiserror::Error;

use crate::media::{FidelityTier, LogicalImageId};

/// Result type for scheduler service operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Failure of one image at one fidelity tier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// The resource locator could not produce a URL (no credential).
    #[error("No URL available for {image} at tier {tier}")]
    LocatorUnavailable {
        image: LogicalImageId,
        tier: FidelityTier,
    },

    /// The byte fetcher failed (network, status or decoding).
    #[error("Fetch failed for {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    /// The image no longer exists when a deferred action fired.
    #[error("Image {0} was destroyed")]
    ImageDestroyed(LogicalImageId),
}

impl LoadError {
    /// Wraps a fetch error for the given URL.
    pub fn fetch(url: impl Into<String>, err: FetchError) -> Self {
        LoadError::FetchFailed {
            url: url.into(),
            reason: err.to_string(),
        }
    }
}

/// Errors produced by a [`ByteFetcher`](crate::provider::ByteFetcher).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The request could not be sent or the connection failed.
    #[error("Request failed: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("HTTP {0}")]
    Status(u16),

    /// The response body could not be read.
    #[error("Failed to read response: {0}")]
    Body(String),

    /// The body is not a recognizable image.
    #[error("Undecodable image data: {0}")]
    Decode(String),
}

/// Errors returned by a [`SchedulerHandle`](crate::scheduler::SchedulerHandle).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// The scheduler daemon has stopped and no longer accepts commands.
    #[error("Scheduler is shut down")]
    ShutDown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_display() {
        let err = LoadError::LocatorUnavailable {
            image: LogicalImageId::new("img1"),
            tier: FidelityTier::Medium,
        };
        assert_eq!(err.to_string(), "No URL available for img1 at tier medium");
    }

    #[test]
    fn test_fetch_error_wraps_into_load_error() {
        let err = LoadError::fetch("https://media/img1/full", FetchError::Status(404));
        match err {
            LoadError::FetchFailed { url, reason } => {
                assert_eq!(url, "https://media/img1/full");
                assert_eq!(reason, "HTTP 404");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

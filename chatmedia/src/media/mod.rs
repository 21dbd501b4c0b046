//! Core media types: logical images, fidelity tiers and placeholder handles.
//!
//! A [`LogicalImage`] identifies one chat attachment independently of the
//! resolution it is fetched at. Each attachment is available at three
//! [`FidelityTier`]s of increasing size.

use serde::Serialize;
use std::fmt;

/// Stable identifier of one attachment, independent of fidelity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LogicalImageId(String);

impl LogicalImageId {
    /// Creates a new image identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LogicalImageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for LogicalImageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One image attachment as the scheduler sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogicalImage {
    /// Stable identifier.
    pub id: LogicalImageId,

    /// Alternative text shown while nothing has loaded (or on failure).
    pub alt_text: String,
}

impl LogicalImage {
    /// Creates a logical image with the given id and alt text.
    pub fn new(id: impl Into<LogicalImageId>, alt_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            alt_text: alt_text.into(),
        }
    }
}

/// Resolution tier of an image, ordered `Small < Medium < Full`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FidelityTier {
    /// Tiny, heavily compressed preview.
    Small,
    /// Thumbnail-quality rendition.
    Medium,
    /// Original attachment.
    Full,
}

impl FidelityTier {
    /// All tiers in ascending order.
    pub const ALL: [FidelityTier; 3] = [FidelityTier::Small, FidelityTier::Medium, FidelityTier::Full];

    /// Path segment used when building tier URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            FidelityTier::Small => "small",
            FidelityTier::Medium => "medium",
            FidelityTier::Full => "full",
        }
    }

    /// Returns true for the tiers fetched by a thumbnail task.
    pub fn is_thumbnail(&self) -> bool {
        matches!(self, FidelityTier::Small | FidelityTier::Medium)
    }
}

impl fmt::Display for FidelityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opaque handle to the presentation layer's placeholder for an image.
///
/// The scheduler never dereferences it; it only hands it back to the
/// presentation adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct PlaceholderRef(pub u64);

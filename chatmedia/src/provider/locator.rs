//! Resource locator: logical image + tier to URL.
//!
//! URLs for chat attachments are authenticated. A locator therefore needs a
//! credential; without one it returns an empty string, which the dispatcher
//! treats as an immediate `LocatorUnavailable` failure.

use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::Url;

use crate::media::{FidelityTier, LogicalImageId};

/// Maps a logical image and tier to a fetchable URL.
///
/// Implementations must be pure and deterministic for a given credential.
pub trait ResourceLocator: Send + Sync {
    /// Builds the URL for `image` at `tier`.
    ///
    /// Returns an empty string when no URL can be produced (for example when
    /// no credential is available).
    fn build_url(&self, image: &LogicalImageId, tier: FidelityTier) -> String;
}

/// Session credential shared between the auth layer and the locator.
///
/// Cloning shares the same slot, so a token refresh or logout is seen by
/// every locator holding a clone.
#[derive(Clone, Debug, Default)]
pub struct SharedCredential {
    token: Arc<RwLock<Option<String>>>,
}

impl SharedCredential {
    /// Creates an empty credential slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a slot holding `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        let credential = Self::new();
        credential.set(token);
        credential
    }

    /// Stores a token, replacing any previous one.
    pub fn set(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    /// Clears the token.
    pub fn clear(&self) {
        *self.token.write() = None;
    }

    /// Returns the current token, if any.
    pub fn get(&self) -> Option<String> {
        self.token.read().clone()
    }
}

/// Locator building `{base_url}/{image}/{tier}?token={credential}`.
///
/// Path segments are percent-encoded; the tier segment is `small`, `medium`
/// or `full`.
#[derive(Clone, Debug)]
pub struct TemplateLocator {
    base_url: String,
    credential: SharedCredential,
}

impl TemplateLocator {
    /// Creates a locator for attachments under `base_url`.
    pub fn new(base_url: impl Into<String>, credential: SharedCredential) -> Self {
        Self {
            base_url: base_url.into(),
            credential,
        }
    }

    /// Base URL the locator builds on.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ResourceLocator for TemplateLocator {
    fn build_url(&self, image: &LogicalImageId, tier: FidelityTier) -> String {
        let token = match self.credential.get() {
            Some(token) if !token.is_empty() => token,
            _ => return String::new(),
        };

        let mut url = match Url::parse(&self.base_url) {
            Ok(url) => url,
            Err(_) => return String::new(),
        };

        match url.path_segments_mut() {
            Ok(mut segments) => {
                segments.pop_if_empty().push(image.as_str()).push(tier.as_str());
            }
            Err(()) => return String::new(),
        }
        url.query_pairs_mut().append_pair("token", &token);
        url.into()
    }
}

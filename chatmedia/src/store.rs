//! Per-image load state.
//!
//! The [`ResourceStore`] records, for every registered [`LogicalImage`], which
//! fidelity tiers have loaded. It performs no I/O. The scheduler mutates it when
//! loads complete; visibility handling and the promotion timer only read it.

use std::collections::HashMap;

use crate::media::{FidelityTier, LogicalImage, LogicalImageId, PlaceholderRef};

/// Load state of one logical image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceState {
    /// The image this state describes.
    pub image: LogicalImage,

    /// Presentation handle for the image's placeholder.
    pub placeholder: PlaceholderRef,

    /// A thumbnail tier (at least `Small`) has been displayed.
    pub thumbnail_loaded: bool,

    /// The full tier has been fetched.
    pub full_loaded: bool,

    /// The `Small` tier failed; the image is out of automatic scheduling.
    pub failed: bool,

    /// Best tier currently painted, if any.
    pub displayed: Option<FidelityTier>,
}

impl ResourceState {
    fn new(image: LogicalImage, placeholder: PlaceholderRef) -> Self {
        Self {
            image,
            placeholder,
            thumbnail_loaded: false,
            full_loaded: false,
            failed: false,
            displayed: None,
        }
    }

    /// Returns true if a thumbnail task is still worth scheduling.
    pub fn needs_thumbnail(&self) -> bool {
        !self.thumbnail_loaded && !self.failed
    }

    /// Returns true if the full tier is due for a background prefetch.
    pub fn wants_promotion(&self) -> bool {
        self.thumbnail_loaded && !self.full_loaded
    }
}

/// Registry of image load states keyed by logical image id.
#[derive(Debug, Default)]
pub struct ResourceStore {
    states: HashMap<LogicalImageId, ResourceState>,
}

impl ResourceStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an image, or refreshes the placeholder of a known one.
    ///
    /// Returns true if the image was not known before.
    pub fn register(&mut self, image: LogicalImage, placeholder: PlaceholderRef) -> bool {
        match self.states.get_mut(&image.id) {
            Some(state) => {
                state.placeholder = placeholder;
                false
            }
            None => {
                self.states
                    .insert(image.id.clone(), ResourceState::new(image, placeholder));
                true
            }
        }
    }

    /// Returns the state of an image.
    pub fn get(&self, id: &LogicalImageId) -> Option<&ResourceState> {
        self.states.get(id)
    }

    /// Returns true if the image is registered.
    pub fn contains(&self, id: &LogicalImageId) -> bool {
        self.states.contains_key(id)
    }

    /// Removes an image. Returns its last state, if it was registered.
    pub fn remove(&mut self, id: &LogicalImageId) -> Option<ResourceState> {
        self.states.remove(id)
    }

    /// Records a settled thumbnail task.
    ///
    /// `best` is the highest thumbnail tier that was displayed.
    pub fn mark_thumbnail_loaded(&mut self, id: &LogicalImageId, best: FidelityTier) {
        if let Some(state) = self.states.get_mut(id) {
            state.thumbnail_loaded = true;
            state.failed = false;
            if state.displayed.map_or(true, |shown| shown < best) {
                state.displayed = Some(best);
            }
        }
    }

    /// Records a failed `Small` tier.
    pub fn mark_failed(&mut self, id: &LogicalImageId) {
        if let Some(state) = self.states.get_mut(id) {
            state.failed = true;
        }
    }

    /// Records a fetched full tier.
    pub fn mark_full_loaded(&mut self, id: &LogicalImageId) {
        if let Some(state) = self.states.get_mut(id) {
            state.full_loaded = true;
        }
    }

    /// Makes a failed image eligible for scheduling again.
    pub fn clear_failed(&mut self, id: &LogicalImageId) {
        if let Some(state) = self.states.get_mut(id) {
            state.failed = false;
        }
    }

    /// Removes every image whose placeholder is no longer attached.
    ///
    /// Returns the ids that were removed.
    pub fn cleanup<F>(&mut self, mut is_attached: F) -> Vec<LogicalImageId>
    where
        F: FnMut(PlaceholderRef) -> bool,
    {
        let detached: Vec<LogicalImageId> = self
            .states
            .values()
            .filter(|state| !is_attached(state.placeholder))
            .map(|state| state.image.id.clone())
            .collect();

        for id in &detached {
            self.states.remove(id);
        }
        detached
    }

    /// Number of registered images.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns true if no image is registered.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Number of images with a loaded thumbnail.
    pub fn loaded_thumbnails(&self) -> usize {
        self.states.values().filter(|s| s.thumbnail_loaded).count()
    }

    /// Number of images with a loaded full tier.
    pub fn loaded_full_images(&self) -> usize {
        self.states.values().filter(|s| s.full_loaded).count()
    }

    /// Number of images out of automatic scheduling after a failure.
    pub fn failed_images(&self) -> usize {
        self.states.values().filter(|s| s.failed).count()
    }
}

//! Viewport tracking for image placeholders.
//!
//! The [`ViewportTracker`] keeps the vertical extent of every observed
//! placeholder and, when the viewport scrolls or a placeholder moves, reports
//! which images entered or left view. An image counts as visible when it
//! intersects the viewport grown by `margin_px` on both edges, so loading
//! starts a little before an image scrolls into view.
//!
//! Only transitions are reported; an update that changes nothing yields no
//! events. The scheduler consumes the events through
//! [`Scheduler::apply_visibility`](crate::scheduler::Scheduler::apply_visibility).

use std::collections::HashMap;

use crate::config::SchedulerConfig;
use crate::media::LogicalImageId;

/// Direction of a visibility transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisibilityChange {
    Enter,
    Leave,
}

/// A visibility transition for one image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisibilityEvent {
    pub image: LogicalImageId,
    pub change: VisibilityChange,
}

impl VisibilityEvent {
    pub fn enter(image: impl Into<LogicalImageId>) -> Self {
        Self {
            image: image.into(),
            change: VisibilityChange::Enter,
        }
    }

    pub fn leave(image: impl Into<LogicalImageId>) -> Self {
        Self {
            image: image.into(),
            change: VisibilityChange::Leave,
        }
    }
}

/// The visible scroll window, in document pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub scroll_top: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(scroll_top: f64, height: f64) -> Self {
        Self { scroll_top, height }
    }
}

/// Vertical extent of a placeholder, in document pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaceholderBounds {
    pub top: f64,
    pub height: f64,
}

impl PlaceholderBounds {
    pub fn new(top: f64, height: f64) -> Self {
        Self { top, height }
    }

    fn bottom(&self) -> f64 {
        self.top + self.height.max(0.0)
    }
}

#[derive(Debug)]
struct Tracked {
    bounds: PlaceholderBounds,
    visible: bool,
}

/// Reports enter/leave transitions for observed placeholders.
#[derive(Debug)]
pub struct ViewportTracker {
    margin_px: f64,
    viewport: Option<Viewport>,
    placeholders: HashMap<LogicalImageId, Tracked>,
}

impl ViewportTracker {
    /// Creates a tracker with the given margin around the viewport.
    pub fn new(margin_px: u32) -> Self {
        Self {
            margin_px: f64::from(margin_px),
            viewport: None,
            placeholders: HashMap::new(),
        }
    }

    /// Creates a tracker using `viewport_margin_px` from the config.
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.viewport_margin_px)
    }

    /// Starts observing a placeholder.
    ///
    /// Returns an `Enter` event if it is already within the margin of the
    /// current viewport.
    pub fn observe(
        &mut self,
        image: LogicalImageId,
        bounds: PlaceholderBounds,
    ) -> Option<VisibilityEvent> {
        self.placeholders.insert(
            image.clone(),
            Tracked {
                bounds,
                visible: false,
            },
        );
        self.refresh(&image)
    }

    /// Stops observing a placeholder. No `Leave` event is produced.
    pub fn unobserve(&mut self, image: &LogicalImageId) -> bool {
        self.placeholders.remove(image).is_some()
    }

    /// Updates a placeholder's extent after a layout change.
    pub fn update_bounds(
        &mut self,
        image: &LogicalImageId,
        bounds: PlaceholderBounds,
    ) -> Option<VisibilityEvent> {
        self.placeholders.get_mut(image)?.bounds = bounds;
        self.refresh(image)
    }

    /// Moves the viewport and returns every resulting transition, in
    /// document order.
    pub fn set_viewport(&mut self, viewport: Viewport) -> Vec<VisibilityEvent> {
        self.viewport = Some(viewport);

        let mut changed: Vec<(f64, LogicalImageId)> = Vec::new();
        for (image, tracked) in &self.placeholders {
            if self.intersects(&tracked.bounds) != tracked.visible {
                changed.push((tracked.bounds.top, image.clone()));
            }
        }
        changed.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        changed
            .into_iter()
            .filter_map(|(_, image)| self.refresh(&image))
            .collect()
    }

    /// Returns true if the placeholder is currently considered visible.
    pub fn is_visible(&self, image: &LogicalImageId) -> bool {
        self.placeholders
            .get(image)
            .map_or(false, |tracked| tracked.visible)
    }

    /// Number of observed placeholders.
    pub fn len(&self) -> usize {
        self.placeholders.len()
    }

    /// Returns true if nothing is observed.
    pub fn is_empty(&self) -> bool {
        self.placeholders.is_empty()
    }

    fn intersects(&self, bounds: &PlaceholderBounds) -> bool {
        match self.viewport {
            Some(viewport) => {
                let low = viewport.scroll_top - self.margin_px;
                let high = viewport.scroll_top + viewport.height + self.margin_px;
                bounds.top <= high && bounds.bottom() >= low
            }
            None => false,
        }
    }

    fn refresh(&mut self, image: &LogicalImageId) -> Option<VisibilityEvent> {
        let visible = {
            let tracked = self.placeholders.get(image)?;
            self.intersects(&tracked.bounds)
        };
        let tracked = self.placeholders.get_mut(image)?;
        if tracked.visible == visible {
            return None;
        }
        tracked.visible = visible;
        Some(VisibilityEvent {
            image: image.clone(),
            change: if visible {
                VisibilityChange::Enter
            } else {
                VisibilityChange::Leave
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> LogicalImageId {
        LogicalImageId::new(name)
    }

    /// Three 100px images stacked at 0, 1000 and 2000.
    fn feed(margin: u32) -> ViewportTracker {
        let mut tracker = ViewportTracker::new(margin);
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            tracker.observe(id(name), PlaceholderBounds::new(i as f64 * 1000.0, 100.0));
        }
        tracker
    }

    #[test]
    fn test_nothing_visible_without_viewport() {
        let tracker = feed(200);
        assert!(!tracker.is_visible(&id("a")));
        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn test_initial_viewport_enters_visible_images() {
        let mut tracker = feed(0);
        let events = tracker.set_viewport(Viewport::new(0.0, 800.0));
        assert_eq!(events, vec![VisibilityEvent::enter("a")]);
    }

    #[test]
    fn test_margin_enters_early() {
        let mut tracker = feed(200);
        // "b" starts at 1000; viewport bottom 800 + margin 200 reaches it
        let events = tracker.set_viewport(Viewport::new(0.0, 800.0));
        assert_eq!(
            events,
            vec![VisibilityEvent::enter("a"), VisibilityEvent::enter("b")]
        );

        let mut strict = feed(0);
        assert_eq!(strict.set_viewport(Viewport::new(0.0, 800.0)).len(), 1);
    }

    #[test]
    fn test_scroll_emits_only_transitions() {
        let mut tracker = feed(0);
        tracker.set_viewport(Viewport::new(0.0, 800.0));

        // Same position again: no events
        assert!(tracker.set_viewport(Viewport::new(0.0, 800.0)).is_empty());

        let events = tracker.set_viewport(Viewport::new(900.0, 800.0));
        assert_eq!(
            events,
            vec![VisibilityEvent::leave("a"), VisibilityEvent::enter("b")]
        );
        assert!(tracker.is_visible(&id("b")));
        assert!(!tracker.is_visible(&id("a")));
    }

    #[test]
    fn test_observe_inside_viewport_enters_immediately() {
        let mut tracker = ViewportTracker::new(0);
        tracker.set_viewport(Viewport::new(0.0, 500.0));
        let event = tracker.observe(id("new"), PlaceholderBounds::new(100.0, 50.0));
        assert_eq!(event, Some(VisibilityEvent::enter("new")));
    }

    #[test]
    fn test_update_bounds_moves_out_of_view() {
        let mut tracker = ViewportTracker::new(0);
        tracker.set_viewport(Viewport::new(0.0, 500.0));
        tracker.observe(id("x"), PlaceholderBounds::new(100.0, 50.0));

        let event = tracker.update_bounds(&id("x"), PlaceholderBounds::new(5000.0, 50.0));
        assert_eq!(event, Some(VisibilityEvent::leave("x")));
        assert_eq!(
            tracker.update_bounds(&id("missing"), PlaceholderBounds::new(0.0, 1.0)),
            None
        );
    }

    #[test]
    fn test_unobserve_is_silent() {
        let mut tracker = feed(0);
        tracker.set_viewport(Viewport::new(0.0, 800.0));
        assert!(tracker.unobserve(&id("a")));
        assert!(tracker.set_viewport(Viewport::new(5000.0, 800.0)).is_empty());
        assert!(!tracker.unobserve(&id("a")));
    }

    #[test]
    fn test_from_config_uses_margin() {
        let config = SchedulerConfig::default().with_viewport_margin_px(0);
        let mut tracker = ViewportTracker::from_config(&config);
        tracker.observe(id("b"), PlaceholderBounds::new(1000.0, 100.0));
        assert!(tracker.set_viewport(Viewport::new(0.0, 800.0)).is_empty());
    }
}

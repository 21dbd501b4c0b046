//! Chatmedia - progressive media loading for chat clients
//!
//! This library schedules the loading of images attached to chat messages.
//! Each image is available at three fidelity tiers. Thumbnails for images in
//! view are loaded first, a blurred `Small` preview appears as soon as it
//! arrives, and the `Full` tier is prefetched in the background once the
//! thumbnail has settled.
//!
//! # Modules
//!
//! - [`scheduler`] - queues, dispatch loop and service daemon
//! - [`provider`] - URL construction and HTTP loading
//! - [`viewport`] - placeholder visibility tracking
//! - [`presentation`] - notifications to the rendering layer
//! - [`config`] - tunables and INI file support

pub mod config;
pub mod error;
pub mod logging;
pub mod media;
pub mod presentation;
pub mod provider;
pub mod queue;
pub mod scheduler;
pub mod store;
pub mod telemetry;
pub mod timer;
pub mod viewport;

pub use config::SchedulerConfig;
pub use error::{FetchError, LoadError, SchedulerError};
pub use media::{FidelityTier, LogicalImage, LogicalImageId, PlaceholderRef};
pub use scheduler::{Scheduler, SchedulerDaemon, SchedulerHandle};

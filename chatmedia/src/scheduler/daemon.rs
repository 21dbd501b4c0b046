//! Scheduler service loop.
//!
//! The [`SchedulerDaemon`] owns a [`Scheduler`] and drives it on one tokio
//! task. Everything else talks to it through a cloneable [`SchedulerHandle`].
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      SchedulerDaemon                         │
//! │                                                              │
//! │  select! (biased)                                            │
//! │    1. shutdown.cancelled()      ──► stop                     │
//! │    2. in-flight completion      ──► Scheduler::complete      │
//! │    3. SchedulerCommand          ──► register / visibility /  │
//! │                                     request_full / destroy   │
//! │    4. dispatch interval         ──► Scheduler::tick          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Completions are polled before the interval so a finished load frees its
//! slot before the next tick admits a replacement. Commands also win over the
//! interval, so a command that arrives after a missed tick runs that tick
//! itself; a steady stream of commands cannot hold dispatch back.
//!
//! # Example
//!
//! ```ignore
//! use chatmedia::scheduler::{Scheduler, SchedulerDaemon};
//!
//! let scheduler = Scheduler::new(config, locator, fetcher, presenter)?;
//! let (daemon, handle) = SchedulerDaemon::new(scheduler);
//!
//! let shutdown = CancellationToken::new();
//! tokio::spawn(daemon.run(shutdown.clone()));
//!
//! handle.register(LogicalImage::new("img1", "A cat"), PlaceholderRef(1)).await?;
//! handle.visibility(VisibilityEvent::enter("img1")).await?;
//! ```

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{SchedulerError, SchedulerResult};
use crate::media::{FidelityTier, LogicalImage, LogicalImageId, PlaceholderRef};
use crate::store::ResourceState;
use crate::telemetry::SchedulerStats;
use crate::viewport::VisibilityEvent;

use super::Scheduler;

/// Default capacity of the command channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// A request sent to the daemon.
#[derive(Debug)]
pub enum SchedulerCommand {
    Register {
        image: LogicalImage,
        placeholder: PlaceholderRef,
    },
    Visibility(VisibilityEvent),
    RequestFull(LogicalImageId),
    ManualLoad {
        image: LogicalImageId,
        tier: FidelityTier,
    },
    Destroy(LogicalImageId),
    Cleanup,
    Stats(oneshot::Sender<SchedulerStats>),
    State {
        image: LogicalImageId,
        reply: oneshot::Sender<Option<ResourceState>>,
    },
}

/// Cloneable handle to a running [`SchedulerDaemon`].
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    async fn send(&self, command: SchedulerCommand) -> SchedulerResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SchedulerError::ShutDown)
    }

    /// Registers an image placeholder.
    pub async fn register(
        &self,
        image: LogicalImage,
        placeholder: PlaceholderRef,
    ) -> SchedulerResult<()> {
        self.send(SchedulerCommand::Register { image, placeholder })
            .await
    }

    /// Forwards a viewport transition.
    pub async fn visibility(&self, event: VisibilityEvent) -> SchedulerResult<()> {
        self.send(SchedulerCommand::Visibility(event)).await
    }

    /// Asks for the full tier at the highest priority.
    pub async fn request_full(&self, image: impl Into<LogicalImageId>) -> SchedulerResult<()> {
        self.send(SchedulerCommand::RequestFull(image.into())).await
    }

    /// Forces a load of one tier.
    pub async fn manual_load(
        &self,
        image: impl Into<LogicalImageId>,
        tier: FidelityTier,
    ) -> SchedulerResult<()> {
        self.send(SchedulerCommand::ManualLoad {
            image: image.into(),
            tier,
        })
        .await
    }

    /// Destroys an image.
    pub async fn destroy(&self, image: impl Into<LogicalImageId>) -> SchedulerResult<()> {
        self.send(SchedulerCommand::Destroy(image.into())).await
    }

    /// Runs the cleanup pass now.
    pub async fn cleanup(&self) -> SchedulerResult<()> {
        self.send(SchedulerCommand::Cleanup).await
    }

    /// Fetches a statistics snapshot.
    pub async fn stats(&self) -> SchedulerResult<SchedulerStats> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerCommand::Stats(reply)).await?;
        rx.await.map_err(|_| SchedulerError::ShutDown)
    }

    /// Fetches the load state of one image.
    pub async fn state(
        &self,
        image: impl Into<LogicalImageId>,
    ) -> SchedulerResult<Option<ResourceState>> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerCommand::State {
            image: image.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| SchedulerError::ShutDown)
    }
}

/// Runs a [`Scheduler`] until shutdown.
pub struct SchedulerDaemon {
    scheduler: Scheduler,
    commands: mpsc::Receiver<SchedulerCommand>,
}

impl SchedulerDaemon {
    /// Creates a daemon and its handle.
    pub fn new(scheduler: Scheduler) -> (Self, SchedulerHandle) {
        Self::with_capacity(scheduler, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a daemon with a custom command channel capacity.
    pub fn with_capacity(scheduler: Scheduler, capacity: usize) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let daemon = Self {
            scheduler,
            commands: rx,
        };
        (daemon, SchedulerHandle { commands: tx })
    }

    /// Runs the service loop until `shutdown` is cancelled.
    ///
    /// Returns the scheduler so callers can inspect its final state. In-flight
    /// loads still pending at shutdown are dropped.
    pub async fn run(self, shutdown: CancellationToken) -> Scheduler {
        let Self {
            mut scheduler,
            mut commands,
        } = self;

        let mut ticker = tokio::time::interval(scheduler.config().dispatch_tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = Instant::now();
        let mut accepting = true;

        info!(
            max_concurrent = scheduler.config().max_concurrent,
            tick_ms = scheduler.config().dispatch_tick_ms,
            "Scheduler daemon starting"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Scheduler daemon shutting down");
                    break;
                }

                Some(outcome) = scheduler.next_completion(), if scheduler.has_in_flight() => {
                    scheduler.complete(outcome);
                }

                command = commands.recv(), if accepting => {
                    match command {
                        Some(command) => {
                            Self::handle_command(&mut scheduler, command);
                            Self::tick_if_overdue(&mut scheduler, &mut last_tick);
                        }
                        None => {
                            debug!("All scheduler handles dropped");
                            accepting = false;
                        }
                    }
                }

                _ = ticker.tick() => {
                    scheduler.tick();
                    last_tick = Instant::now();
                }
            }
        }

        info!(stats = %scheduler.stats(), "Scheduler daemon stopped");
        scheduler
    }

    /// Runs a tick if a full dispatch interval passed since the last one.
    fn tick_if_overdue(scheduler: &mut Scheduler, last_tick: &mut Instant) -> bool {
        let now = Instant::now();
        if now.duration_since(*last_tick) < scheduler.config().dispatch_tick() {
            return false;
        }
        scheduler.tick();
        *last_tick = now;
        true
    }

    fn handle_command(scheduler: &mut Scheduler, command: SchedulerCommand) {
        match command {
            SchedulerCommand::Register { image, placeholder } => {
                scheduler.register(image, placeholder);
            }
            SchedulerCommand::Visibility(event) => scheduler.apply_visibility(event),
            SchedulerCommand::RequestFull(image) => {
                scheduler.request_full(&image);
            }
            SchedulerCommand::ManualLoad { image, tier } => {
                scheduler.manual_load(&image, tier);
            }
            SchedulerCommand::Destroy(image) => {
                scheduler.destroy(&image);
            }
            SchedulerCommand::Cleanup => {
                scheduler.cleanup();
            }
            SchedulerCommand::Stats(reply) => {
                let _ = reply.send(scheduler.stats());
            }
            SchedulerCommand::State { image, reply } => {
                let _ = reply.send(scheduler.state(&image).cloned());
            }
        }
    }
}

//! The `fetch` command: runs the scheduler against a media server.
//!
//! Every id given on the command line is registered as an off-screen image.
//! Ids passed with `--visible` are reported as entering the viewport and ids
//! passed with `--full` are requested at full fidelity. The command waits until
//! the scheduler is idle (or the wait limit or Ctrl-C is hit) and prints the
//! final statistics as JSON.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chatmedia::presentation::TracingPresenter;
use chatmedia::provider::{ReqwestFetcher, SharedCredential, TemplateLocator};
use chatmedia::telemetry::SchedulerStats;
use chatmedia::viewport::VisibilityEvent;
use chatmedia::{
    LogicalImage, PlaceholderRef, Scheduler, SchedulerConfig, SchedulerDaemon, SchedulerHandle,
};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::CliError;

/// How often the command checks whether the scheduler went idle.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Arguments for `chatmedia fetch`.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Base URL of the media server (e.g., https://media.example.com/attachments)
    #[arg(long)]
    pub base_url: String,

    /// Access token appended to every request
    #[arg(long)]
    pub token: Option<String>,

    /// Logical image ids to register
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Ids that start inside the viewport (repeatable)
    #[arg(long = "visible", value_name = "ID")]
    pub visible: Vec<String>,

    /// Ids requested at full fidelity right away (repeatable)
    #[arg(long = "full", value_name = "ID")]
    pub full: Vec<String>,

    /// Override scheduler.max_concurrent
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Override scheduler.promotion_delay_ms
    #[arg(long)]
    pub promotion_delay_ms: Option<u64>,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Give up waiting for the scheduler after this many seconds
    #[arg(long, default_value_t = 120)]
    pub wait_secs: u64,
}

impl FetchArgs {
    /// Applies command line overrides on top of the file configuration.
    fn scheduler_config(&self, base: SchedulerConfig) -> SchedulerConfig {
        let mut config = base;
        if let Some(max) = self.max_concurrent {
            config = config.with_max_concurrent(max);
        }
        if let Some(delay) = self.promotion_delay_ms {
            config = config.with_promotion_delay_ms(delay);
        }
        config
    }
}

/// Run the fetch command.
pub fn run(args: FetchArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let config = args.scheduler_config(SchedulerConfig::load_or_default(config_path)?);

    let credential = SharedCredential::new();
    if let Some(token) = &args.token {
        credential.set(token.clone());
    } else {
        warn!("No token given; every load will fail with LocatorUnavailable");
    }
    let locator = TemplateLocator::new(&args.base_url, credential);
    let fetcher = ReqwestFetcher::with_timeout(args.timeout_secs)?;
    let scheduler = Scheduler::new(
        config,
        Arc::new(locator),
        Arc::new(fetcher),
        Arc::new(TracingPresenter),
    )?;

    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    ctrlc::set_handler(move || ctrlc_token.cancel())
        .map_err(|e| CliError::Runtime(format!("Failed to install Ctrl-C handler: {}", e)))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(format!("Failed to start async runtime: {}", e)))?;

    let stats = runtime.block_on(drive(scheduler, &args, shutdown))?;
    println!("{}", stats.to_json());
    Ok(())
}

async fn drive(
    scheduler: Scheduler,
    args: &FetchArgs,
    shutdown: CancellationToken,
) -> Result<SchedulerStats, CliError> {
    let (daemon, handle) = SchedulerDaemon::new(scheduler);
    let task = tokio::spawn(daemon.run(shutdown.clone()));

    submit(&handle, args).await?;
    info!(images = args.ids.len(), "Images submitted");

    wait_until_idle(&handle, &shutdown, Duration::from_secs(args.wait_secs)).await?;

    shutdown.cancel();
    let scheduler = task
        .await
        .map_err(|e| CliError::Runtime(format!("Scheduler task failed: {}", e)))?;
    Ok(scheduler.stats())
}

async fn submit(handle: &SchedulerHandle, args: &FetchArgs) -> Result<(), CliError> {
    for (index, id) in args.ids.iter().enumerate() {
        handle
            .register(LogicalImage::new(id.as_str(), ""), PlaceholderRef(index as u64))
            .await?;
    }
    for id in &args.visible {
        handle.visibility(VisibilityEvent::enter(id.as_str())).await?;
    }
    for id in &args.full {
        handle.request_full(id.as_str()).await?;
    }
    Ok(())
}

async fn wait_until_idle(
    handle: &SchedulerHandle,
    shutdown: &CancellationToken,
    limit: Duration,
) -> Result<(), CliError> {
    let deadline = tokio::time::Instant::now() + limit;
    let mut poll = tokio::time::interval(IDLE_POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Interrupted");
                return Ok(());
            }
            _ = poll.tick() => {
                let stats = handle.stats().await?;
                if stats.is_idle() {
                    info!(%stats, "Scheduler idle");
                    return Ok(());
                }
                if tokio::time::Instant::now() >= deadline {
                    warn!(%stats, "Wait limit reached");
                    return Ok(());
                }
            }
        }
    }
}

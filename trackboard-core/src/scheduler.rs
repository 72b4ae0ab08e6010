//! Proactive refresh trigger.
//!
//! Reads never depend on this running; it only moves the refresh cost off
//! the first request after a cutover.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::freshness::CacheStatus;
use crate::orchestrator::RefreshOrchestrator;

/// Default tick interval
pub const DEFAULT_SCHEDULER_INTERVAL: Duration = Duration::from_secs(3600);
/// Shortest interval the scheduler will tick at
pub const MIN_SCHEDULER_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between evaluations
    pub interval: Duration,
    /// Also refresh once an entry is this old, even if the policy would serve it
    pub stale_after: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SCHEDULER_INTERVAL,
            stale_after: None,
        }
    }
}

/// What one evaluation did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Skipped,
    Refreshed(DateTime<Utc>),
    Failed(FetchError),
}

/// Periodically refreshes one key through an orchestrator
pub struct RefreshScheduler<F: Fetcher> {
    orchestrator: RefreshOrchestrator<F>,
    key: String,
    config: SchedulerConfig,
}

impl<F: Fetcher> RefreshScheduler<F> {
    pub fn new(
        orchestrator: RefreshOrchestrator<F>,
        key: impl Into<String>,
        mut config: SchedulerConfig,
    ) -> Self {
        if config.interval < MIN_SCHEDULER_INTERVAL {
            warn!(
                "Scheduler interval {:?} is below {:?}, using the minimum",
                config.interval, MIN_SCHEDULER_INTERVAL
            );
            config.interval = MIN_SCHEDULER_INTERVAL;
        }
        Self {
            orchestrator,
            key: key.into(),
            config,
        }
    }

    /// Evaluate the current entry once and refresh it if needed
    pub async fn tick(&self) -> TickOutcome {
        let status = self.orchestrator.status(&self.key).await;

        let Some(reason) = self.refresh_reason(&status) else {
            debug!("Scheduler: key={} is current, next cutover {}", self.key, status.next_cutover);
            return TickOutcome::Skipped;
        };

        info!("Scheduler: refreshing key={} ({})", self.key, reason);
        match self.orchestrator.refresh(&self.key).await {
            Ok(entry) => TickOutcome::Refreshed(entry.cached_at),
            Err(e) => {
                warn!("Scheduled refresh of key={} failed: {}", self.key, e);
                TickOutcome::Failed(e)
            }
        }
    }

    fn refresh_reason(&self, status: &CacheStatus) -> Option<&'static str> {
        let Some(age_in_hours) = status.age_in_hours else {
            return Some("empty");
        };
        if status.is_due {
            return Some("due");
        }
        if !status.is_valid {
            return Some("invalid");
        }
        match self.config.stale_after {
            Some(stale_after) if age_in_hours * 3600.0 >= stale_after.as_secs_f64() => {
                Some("stale")
            }
            _ => None,
        }
    }

    /// Run ticks on the configured interval until the handle is shut down.
    ///
    /// The first tick fires immediately.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        info!(
            "Starting refresh scheduler for key={} (interval={:?})",
            self.key, self.config.interval
        );

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.tick().await;
                    }
                    _ = shutdown_rx.changed() => {
                        info!("Stopping refresh scheduler for key={}", self.key);
                        break;
                    }
                }
            }
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            handle,
        }
    }
}

/// Stops a spawned scheduler
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop to stop and wait for it.
    ///
    /// A refresh already started keeps running in its own task.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!("Refresh scheduler ended abnormally: {}", e);
        }
    }
}

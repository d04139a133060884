use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use watchlist_core::PassReport;
use watchlist_logging::{harvest_error, harvest_info};

use crate::runner::{HarvestRunner, PassError};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Anything the loop can trigger once per tick.
#[async_trait::async_trait]
pub trait HarvestPass: Send + Sync {
    async fn run_pass(&self) -> Result<PassReport, PassError>;
}

#[async_trait::async_trait]
impl HarvestPass for HarvestRunner {
    async fn run_pass(&self) -> Result<PassReport, PassError> {
        self.run().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub interval: Duration,
    /// Run the first pass immediately instead of one interval after start.
    pub run_on_start: bool,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            run_on_start: false,
        }
    }
}

/// Triggers passes on a fixed interval until stopped.
///
/// Passes run inline on the loop task, so they never overlap, and a stop
/// request is only observed between passes.
pub struct ScheduleLoop {
    pass: Arc<dyn HarvestPass>,
    settings: ScheduleSettings,
    stop: CancellationToken,
}

impl ScheduleLoop {
    pub fn new(pass: Arc<dyn HarvestPass>, settings: ScheduleSettings) -> Self {
        Self {
            pass,
            settings,
            stop: CancellationToken::new(),
        }
    }

    /// Runs until the stop token fires. Returns the number of passes started.
    pub async fn run(self) -> usize {
        let period = self.settings.interval.max(Duration::from_millis(1));
        let first = if self.settings.run_on_start {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut ticker = tokio::time::interval_at(first, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        harvest_info!("Schedule loop started (interval {:?})", period);
        let mut passes = 0;
        loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                _ = ticker.tick() => {
                    passes += 1;
                    harvest_info!("Starting harvest pass {}", passes);
                    if let Err(err) = self.pass.run_pass().await {
                        harvest_error!(
                            "Harvest pass {} failed, waiting for next tick: {}",
                            passes,
                            err
                        );
                    }
                }
            }
        }
        harvest_info!("Schedule loop stopped after {} passes", passes);
        passes
    }

    pub fn spawn(self) -> ScheduleHandle {
        let stop = self.stop.clone();
        let task = tokio::spawn(self.run());
        ScheduleHandle { stop, task }
    }
}

pub struct ScheduleHandle {
    stop: CancellationToken,
    task: JoinHandle<usize>,
}

impl ScheduleHandle {
    /// Requests a stop. An in-flight pass still runs to completion.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the loop task; returns the number of passes started.
    pub async fn join(self) -> Result<usize, JoinError> {
        self.task.await
    }

    pub async fn shutdown(self) -> Result<usize, JoinError> {
        self.stop();
        self.join().await
    }
}

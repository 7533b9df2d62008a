//! Periodic sync trigger.
//!
//! # Responsibility
//! - Run `SyncEngine::run_cycle` every period on a tokio runtime.
//! - Offer explicit start/stop instead of ambient interval state.
//!
//! # Invariants
//! - The first tick fires one full period after `start`.
//! - Cycles run on the blocking pool; a tick that lands while a manual cycle
//!   is in flight is skipped by the engine guard.
//! - Dropping the scheduler stops it.

use crate::repo::kv_repo::KeyValueRepository;
use crate::sync::engine::{CycleOutcome, SyncEngine};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    ZeroPeriod,
}

impl Display for SchedulerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroPeriod => write!(f, "sync period must be greater than zero"),
        }
    }
}

impl Error for SchedulerError {}

/// Handle to a running periodic sync task.
pub struct SyncScheduler {
    period: Duration,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SyncScheduler {
    /// Spawns the periodic task on `runtime`.
    ///
    /// `notify` receives every cycle outcome, including skipped ones.
    pub fn start<R, F>(
        engine: SyncEngine<R>,
        period: Duration,
        runtime: &Handle,
        notify: F,
    ) -> Result<Self, SchedulerError>
    where
        R: KeyValueRepository + Send + 'static,
        F: Fn(CycleOutcome) + Send + 'static,
    {
        if period.is_zero() {
            return Err(SchedulerError::ZeroPeriod);
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        info!(
            "event=sync_scheduler module=sync status=start period_ms={} endpoint={}",
            period.as_millis(),
            engine.endpoint_id()
        );

        let task = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let cycle_engine = engine.clone();
                        match tokio::task::spawn_blocking(move || cycle_engine.run_cycle()).await {
                            Ok(outcome) => {
                                if let CycleOutcome::Completed(report) = &outcome {
                                    if !report.is_success() {
                                        warn!(
                                            "event=sync_scheduler module=sync status=cycle_failed cycle_id={}",
                                            report.cycle_id
                                        );
                                    }
                                }
                                notify(outcome);
                            }
                            Err(err) => error!(
                                "event=sync_scheduler module=sync status=error error={err}"
                            ),
                        }
                    }
                }
            }

            info!("event=sync_scheduler module=sync status=stopped");
        });

        Ok(Self {
            period,
            cancel,
            task: Some(task),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Requests a stop. An in-flight cycle completes; no new tick starts.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .task
                .as_ref()
                .is_some_and(|task| !task.is_finished())
    }

    /// Stops the scheduler and waits for its task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                error!("event=sync_scheduler module=sync status=error error={err}");
            }
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

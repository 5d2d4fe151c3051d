//! Fires scheduled runs against the job engine

use crate::config::RunConfig;
use crate::job::{JobEngine, RunRejected};
use crate::schedule::Schedule;
use chrono::{DateTime, Local, Utc};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Longest sleep between schedule checks
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// What a schedule check did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The schedule is off or has no entries
    Disabled,
    NotDue,
    /// A run was started
    Triggered,
    /// A trigger came due while a job was active and was discarded
    Dropped,
}

/// Turns schedule triggers into run requests
pub struct ScheduleRunner {
    engine: JobEngine,
    schedule: Schedule,
    run_config: RunConfig,
    next_trigger: Option<DateTime<Utc>>,
}

impl ScheduleRunner {
    pub fn new(engine: JobEngine, schedule: Schedule, run_config: RunConfig) -> Self {
        let mut runner = Self {
            engine,
            schedule,
            run_config,
            next_trigger: None,
        };
        runner.recompute(Utc::now());
        runner
    }

    pub fn next_trigger(&self) -> Option<DateTime<Utc>> {
        self.next_trigger
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Status name for display, with an idle engine shown as scheduled
    pub fn status_display(&self) -> &'static str {
        self.engine
            .status()
            .display_name(self.next_trigger.is_some())
    }

    /// Replaces the schedule and recomputes the next trigger
    ///
    /// A job already in flight is unaffected.
    pub fn update_schedule(&mut self, schedule: Schedule) {
        self.schedule = schedule;
        self.recompute(Utc::now());
        match self.next_trigger {
            Some(next) => info!("Schedule updated, next run at {}", next.with_timezone(&Local)),
            None => info!("Schedule updated, no upcoming runs"),
        }
    }

    /// Replaces the configuration used by future scheduled runs
    pub fn update_run_config(&mut self, run_config: RunConfig) {
        self.run_config = run_config;
    }

    fn recompute(&mut self, now: DateTime<Utc>) {
        self.next_trigger = self
            .schedule
            .next_trigger_after(&now.with_timezone(&Local))
            .map(|t| t.with_timezone(&Utc));
    }

    /// Checks the schedule at `now`, starting a run if a trigger is due
    ///
    /// Triggers that come due while a job is active are dropped, not queued.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let Some(next) = self.next_trigger else {
            return if self.schedule.is_active() {
                self.recompute(now);
                TickOutcome::NotDue
            } else {
                TickOutcome::Disabled
            };
        };

        if now < next {
            return TickOutcome::NotDue;
        }

        let outcome = match self.engine.request_run(self.run_config.clone()) {
            Ok(()) => {
                info!("Scheduled run started (trigger {})", next.with_timezone(&Local));
                TickOutcome::Triggered
            }
            Err(RunRejected::AlreadyRunning { status }) => {
                warn!(
                    "Skipping scheduled run at {}: job is {}",
                    next.with_timezone(&Local),
                    status
                );
                TickOutcome::Dropped
            }
        };

        self.recompute(now);
        outcome
    }

    /// Time until the next check is needed
    fn poll_interval(&self, now: DateTime<Utc>) -> Duration {
        self.next_trigger
            .and_then(|next| (next - now).to_std().ok())
            .map_or(MAX_POLL_INTERVAL, |d| d.min(MAX_POLL_INTERVAL))
    }

    /// Checks the schedule until a shutdown signal arrives
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) {
        match self.next_trigger {
            Some(next) => info!("Scheduler started, next run at {}", next.with_timezone(&Local)),
            None => info!("Scheduler started with no upcoming runs"),
        }

        loop {
            let outcome = self.tick(Utc::now());
            debug!("Schedule check: {:?}", outcome);

            let wait = self.poll_interval(Utc::now());
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Scheduler received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}

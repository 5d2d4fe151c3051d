//! The job engine: one background worker behind a small trigger interface
//!
//! Callers request run, pause, resume and cancel. The worker owns the crawl,
//! the freshness store and the statistics; callers only ever see snapshots.

use crate::catalog::CatalogSource;
use crate::config::RunConfig;
use crate::crawler::{Checkpoint, CrawlPipeline, ProgressSnapshot, RunControl};
use crate::job::control::ControlSignals;
use crate::job::status::JobStatus;
use crate::output::{RunSummary, RunTiming, StopReason};
use crate::storage::{open_storage, Storage};
use crate::PrefetchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Why a run request was turned down
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunRejected {
    #[error("a job is already {status}")]
    AlreadyRunning { status: JobStatus },
}

/// Result of a pause, resume or cancel request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Accepted,
    /// The request does not apply in the current state and changed nothing
    NoOp,
}

/// Lifecycle notifications
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    StatusChanged { from: JobStatus, to: JobStatus },
    Finished {
        status: JobStatus,
        stop_reason: StopReason,
    },
}

/// Snapshot of the engine for observers
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobState {
    pub status: JobStatus,
    pub progress: ProgressSnapshot,
    /// Frozen when the last run reached a terminal state
    pub summary: Option<RunSummary>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct JobRecord {
    status: JobStatus,
    summary: Option<RunSummary>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    error: Option<String>,
}

struct EngineInner {
    record: Mutex<JobRecord>,
    signals: ControlSignals,
    progress: watch::Sender<ProgressSnapshot>,
    status: watch::Sender<JobStatus>,
    events: broadcast::Sender<JobEvent>,
    source: Arc<dyn CatalogSource>,
    database_path: PathBuf,
}

impl EngineInner {
    fn record(&self) -> MutexGuard<'_, JobRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the record to `to`, publishing the change
    fn transition(&self, record: &mut JobRecord, to: JobStatus) -> Result<(), PrefetchError> {
        let from = record.status;
        if !from.can_transition_to(to) {
            return Err(PrefetchError::InvalidTransition { from, to });
        }
        record.status = to;
        self.status.send_replace(to);
        let _ = self.events.send(JobEvent::StatusChanged { from, to });
        Ok(())
    }

    /// Records the terminal state of a run
    fn finish(&self, status: JobStatus, summary: Option<RunSummary>, error: Option<String>) {
        let stop_reason = summary
            .as_ref()
            .map(|s| s.stop_reason)
            .unwrap_or(StopReason::Failed);

        let mut record = self.record();
        if let Err(e) = self.transition(&mut record, status) {
            warn!("Forcing terminal state: {}", e);
            record.status = status;
            self.status.send_replace(status);
        }
        record.end_time = Some(Utc::now());
        record.summary = summary;
        record.error = error;
        drop(record);

        let _ = self.events.send(JobEvent::Finished {
            status,
            stop_reason,
        });
    }
}

/// Control surface handed to the pipeline
struct WorkerControl<'a> {
    inner: &'a EngineInner,
}

#[async_trait]
impl<'a> RunControl for WorkerControl<'a> {
    fn checkpoint(&self) -> Checkpoint {
        self.inner.signals.pending()
    }

    async fn park(&self) -> Checkpoint {
        {
            let mut record = self.inner.record();
            if record.status == JobStatus::Pausing {
                let _ = self.inner.transition(&mut record, JobStatus::Paused);
            }
        }

        let decision = self.inner.signals.wait_while_paused().await;

        if decision == Checkpoint::Continue {
            let mut record = self.inner.record();
            if record.status == JobStatus::Resuming {
                let _ = self.inner.transition(&mut record, JobStatus::Running);
            }
        }
        decision
    }
}

/// Owns the single prefetch worker
///
/// Cloning is cheap and every clone drives the same worker.
#[derive(Clone)]
pub struct JobEngine {
    inner: Arc<EngineInner>,
}

impl JobEngine {
    /// Creates an idle engine
    ///
    /// The freshness store at `database_path` is opened by each run, so a
    /// broken store fails that run rather than the engine.
    pub fn new(source: Arc<dyn CatalogSource>, database_path: impl Into<PathBuf>) -> Self {
        let (progress, _) = watch::channel(ProgressSnapshot::default());
        let (status, _) = watch::channel(JobStatus::Idle);
        let (events, _) = broadcast::channel(64);

        Self {
            inner: Arc::new(EngineInner {
                record: Mutex::new(JobRecord::default()),
                signals: ControlSignals::new(),
                progress,
                status,
                events,
                source,
                database_path: database_path.into(),
            }),
        }
    }

    /// Starts a run with the given configuration snapshot
    ///
    /// Rejected while another job is active; the request is not queued.
    /// Must be called from within a tokio runtime.
    pub fn request_run(&self, config: RunConfig) -> Result<(), RunRejected> {
        {
            let mut record = self.inner.record();
            if !record.status.accepts_run() {
                return Err(RunRejected::AlreadyRunning {
                    status: record.status,
                });
            }

            self.inner.signals.reset();
            self.inner.progress.send_replace(ProgressSnapshot::default());
            record.summary = None;
            record.error = None;
            record.end_time = None;
            record.start_time = Some(Utc::now());
            if let Err(e) = self.inner.transition(&mut record, JobStatus::Running) {
                // accepts_run guarantees a legal transition
                warn!("{}", e);
            }
        }

        info!(
            "Starting prefetch run over {} catalogs",
            config.enabled_catalogs().count()
        );
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            run_worker(inner, config).await;
        });
        Ok(())
    }

    /// Asks the worker to pause at its next checkpoint
    pub fn request_pause(&self) -> SignalOutcome {
        let mut record = self.inner.record();
        match record.status {
            JobStatus::Running | JobStatus::Resuming => {
                self.inner.signals.request_pause();
                let _ = self.inner.transition(&mut record, JobStatus::Pausing);
                info!("Pause requested");
                SignalOutcome::Accepted
            }
            _ => SignalOutcome::NoOp,
        }
    }

    /// Resumes a paused run, or retracts a pause not yet honored
    pub fn request_resume(&self) -> SignalOutcome {
        let mut record = self.inner.record();
        let next = match record.status {
            JobStatus::Paused => JobStatus::Resuming,
            JobStatus::Pausing => JobStatus::Running,
            _ => return SignalOutcome::NoOp,
        };
        self.inner.signals.clear_pause();
        let _ = self.inner.transition(&mut record, next);
        info!("Resume requested");
        SignalOutcome::Accepted
    }

    /// Asks the worker to stop
    ///
    /// A paused worker wakes and finishes as cancelled without running again.
    pub fn request_cancel(&self) -> SignalOutcome {
        let mut record = self.inner.record();
        match record.status {
            JobStatus::Running | JobStatus::Pausing | JobStatus::Resuming => {
                self.inner.signals.request_cancel();
                let _ = self.inner.transition(&mut record, JobStatus::Cancelling);
                info!("Cancel requested");
                SignalOutcome::Accepted
            }
            JobStatus::Paused => {
                self.inner.signals.request_cancel();
                info!("Cancel requested while paused");
                SignalOutcome::Accepted
            }
            _ => SignalOutcome::NoOp,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.inner.record().status
    }

    /// Snapshot of status, progress and the last summary
    pub fn state(&self) -> JobState {
        let record = self.inner.record();
        JobState {
            status: record.status,
            progress: self.inner.progress.borrow().clone(),
            summary: record.summary.clone(),
            start_time: record.start_time,
            end_time: record.end_time,
            error: record.error.clone(),
        }
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.inner.progress.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<JobStatus> {
        self.inner.status.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    /// Waits until the current job reaches a terminal state
    ///
    /// Returns immediately when no job is active.
    pub async fn wait_until_finished(&self) -> JobState {
        let mut status = self.subscribe_status();
        while status.borrow_and_update().is_active() {
            if status.changed().await.is_err() {
                break;
            }
        }
        self.state()
    }
}

/// Runs one job to its terminal state
async fn run_worker(inner: Arc<EngineInner>, config: RunConfig) {
    let started = Instant::now();
    let start_time = inner.record().start_time.unwrap_or_else(Utc::now);

    let mut storage = match open_storage(&inner.database_path) {
        Ok(storage) => storage,
        Err(e) => {
            error!("Freshness store unavailable: {}", e);
            inner.finish(JobStatus::Failed, None, Some(e.to_string()));
            return;
        }
    };

    let run_id = match storage.create_run(config.config_hash.as_deref()) {
        Ok(id) => id,
        Err(e) => {
            error!("Failed to record run: {}", e);
            inner.finish(JobStatus::Failed, None, Some(e.to_string()));
            return;
        }
    };

    let control = WorkerControl { inner: &*inner };
    let mut pipeline = CrawlPipeline::new(
        inner.source.as_ref(),
        &mut storage,
        &config,
        &control,
        &inner.progress,
    );
    let result = pipeline.run().await;
    let outcome = pipeline.into_outcome();

    let (status, stop_reason, error) = match result {
        Ok(StopReason::Completed) => (JobStatus::Completed, StopReason::Completed, None),
        Ok(reason) => (JobStatus::Cancelled, reason, None),
        Err(e) => {
            error!("Run failed: {}", e);
            (JobStatus::Failed, StopReason::Failed, Some(e.to_string()))
        }
    };

    let summary = RunSummary {
        timing: RunTiming {
            start_time,
            end_time: Some(Utc::now()),
            discovery_duration_secs: outcome.discovery_duration.as_secs_f64(),
            processing_duration_secs: outcome.processing_duration.as_secs_f64(),
            total_duration_secs: started.elapsed().as_secs_f64(),
        },
        stop_reason,
        statistics: outcome.statistics,
        processed_catalogs: outcome.processed_catalogs,
        error: error.clone(),
    };

    if let Some(run_status) = status.to_run_status() {
        if let Err(e) = storage.finish_run(run_id, run_status, error.as_deref(), Some(&summary)) {
            warn!("Failed to persist run {}: {}", run_id, e);
        }
    }

    info!(
        "Run {} finished as {} ({}) in {:.1}s",
        run_id, status, stop_reason, summary.timing.total_duration_secs
    );
    inner.finish(status, Some(summary), error);
}

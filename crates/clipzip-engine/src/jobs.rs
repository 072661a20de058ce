//! Extraction job tracker.
//!
//! `submit` turns one extraction request into a [`JobRecord`]: `Polling` if
//! the service queued it, `Dismissed` (under a local id) if it refused.
//! `poll_until_terminal` then walks one polling job to `Succeeded` or
//! `Failed`:
//!
//! ```text
//! loop {
//!     status = job_status(id)          transport error -> Failed, stop
//!     successful -> job_result(id) once -> Succeeded, stop
//!     failed / dismissed               -> Failed, stop
//!     accepted / running               -> progress, sleep(interval)
//! }
//! ```
//!
//! There is no overall timeout. Each job runs its own loop; nothing is
//! shared between jobs except the record list.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use clipzip_client::{CatalogService, ExtractionInputs, JobStatusKind};
use clipzip_types::{JobId, JobRecord, JobState};
use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::EngineError;
use crate::events::{EngineEvent, ErrorScope, EventBus};

/// Waits between polls. Injected so tests do not sleep for real.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Delay`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Live view of one job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    job_id: JobId,
    updates: watch::Receiver<JobRecord>,
}

impl JobHandle {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Latest known record.
    pub fn record(&self) -> JobRecord {
        self.updates.borrow().clone()
    }

    pub fn state(&self) -> JobState {
        self.updates.borrow().state
    }

    /// Wait until the job is terminal.
    pub async fn wait(&mut self) -> JobRecord {
        if self.updates.wait_for(|r| r.state.is_terminal()).await.is_err() {
            debug!(job_id = %self.job_id, "tracker dropped before the job finished");
        }
        self.updates.borrow().clone()
    }
}

pub struct JobTracker {
    service: Arc<dyn CatalogService>,
    delay: Arc<dyn Delay>,
    poll_interval: Duration,
    bus: Option<EventBus>,
    jobs: Mutex<IndexMap<JobId, watch::Sender<JobRecord>>>,
}

impl JobTracker {
    pub fn new(service: Arc<dyn CatalogService>, poll_interval: Duration) -> Self {
        Self {
            service,
            delay: Arc::new(TokioDelay),
            poll_interval,
            bus: None,
            jobs: Mutex::new(IndexMap::new()),
        }
    }

    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    /// Announce job lifecycle on `bus`.
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// Every job, in submission order.
    pub fn jobs(&self) -> Vec<JobRecord> {
        self.jobs.lock().values().map(|tx| tx.borrow().clone()).collect()
    }

    pub fn job(&self, job_id: &JobId) -> Option<JobHandle> {
        let jobs = self.jobs.lock();
        let tx = jobs.get(job_id)?;
        Some(JobHandle {
            job_id: job_id.clone(),
            updates: tx.subscribe(),
        })
    }

    /// Start tracking a job queued elsewhere (e.g. by an earlier session).
    pub fn adopt(&self, job_id: JobId) -> JobHandle {
        if let Some(handle) = self.job(&job_id) {
            return handle;
        }
        self.track(JobRecord::accepted(job_id, Utc::now()))
    }

    fn track(&self, record: JobRecord) -> JobHandle {
        let job_id = record.job_id.clone();
        let (tx, rx) = watch::channel(record);
        self.jobs.lock().insert(job_id.clone(), tx);
        JobHandle { job_id, updates: rx }
    }

    /// Apply `change` to a record and notify watchers.
    fn update(&self, job_id: &JobId, change: impl FnOnce(&mut JobRecord)) {
        if let Some(tx) = self.jobs.lock().get(job_id) {
            tx.send_modify(change);
        }
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(bus) = &self.bus {
            bus.emit(event);
        }
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Ask the service to queue an extraction.
    #[instrument(skip(self, inputs), fields(collections = inputs.collections.len()))]
    pub async fn submit(&self, inputs: ExtractionInputs) -> JobHandle {
        match self.service.submit_extraction(inputs).await {
            Ok(job_id) => {
                info!(%job_id, "extraction queued");
                let handle = self.track(JobRecord::accepted(job_id.clone(), Utc::now()));
                self.emit(EngineEvent::ExtractStarted { job_id });
                handle
            }
            Err(err) => self.dismiss(EngineError::from(err)),
        }
    }

    /// Record a request that never reached the queue.
    pub fn dismiss(&self, error: EngineError) -> JobHandle {
        let record = JobRecord::dismissed(Utc::now(), error.user_message());
        warn!(job_id = %record.job_id, %error, "extraction dismissed");
        let job_id = record.job_id.clone();
        let reason = record.failure.clone().unwrap_or_default();
        let handle = self.track(record);
        self.emit(EngineEvent::Error {
            scope: ErrorScope::Extract,
            error,
        });
        self.emit(EngineEvent::JobDismissed { job_id, reason });
        handle
    }

    /// Submit, then poll in the background if the job was queued.
    pub async fn start(self: &Arc<Self>, inputs: ExtractionInputs) -> JobHandle {
        let handle = self.submit(inputs).await;
        if handle.state() == JobState::Polling {
            self.spawn_polling(handle.job_id().clone());
        }
        handle
    }

    pub fn spawn_polling(self: &Arc<Self>, job_id: JobId) -> JoinHandle<Option<JobRecord>> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move { tracker.poll_until_terminal(&job_id).await })
    }

    // ========================================================================
    // Polling
    // ========================================================================

    /// Poll one job until it is terminal and return its final record.
    /// `None` for a job this tracker does not know.
    #[instrument(skip(self))]
    pub async fn poll_until_terminal(&self, job_id: &JobId) -> Option<JobRecord> {
        let handle = self.job(job_id)?;
        loop {
            if !handle.state().is_terminal() {
                self.poll_once(job_id).await;
            }
            if handle.state().is_terminal() {
                return Some(handle.record());
            }
            self.delay.sleep(self.poll_interval).await;
        }
    }

    /// One status query, applied to the record.
    async fn poll_once(&self, job_id: &JobId) {
        let status = match self.service.job_status(job_id).await {
            Ok(status) => status,
            Err(err) => return self.poll_failed(job_id, EngineError::from(err)),
        };

        match status.status {
            JobStatusKind::Successful => match self.service.job_result(job_id).await {
                Ok(result) => self.finish_succeeded(job_id, result.extract_url),
                Err(err) => self.poll_failed(job_id, EngineError::from(err)),
            },
            JobStatusKind::Failed | JobStatusKind::Dismissed => {
                let reason = status.message.unwrap_or_else(|| format!("job {}", status.status));
                self.finish_failed(job_id, reason);
            }
            JobStatusKind::Accepted | JobStatusKind::Running | JobStatusKind::Unknown => {
                let progress = status.percent();
                debug!(progress, status = %status.status, "job in progress");
                self.update(job_id, |r| r.update_progress(progress));
                self.emit(EngineEvent::JobProgress {
                    job_id: job_id.clone(),
                    progress,
                });
            }
        }
    }

    fn poll_failed(&self, job_id: &JobId, error: EngineError) {
        self.finish_failed(job_id, error.to_string());
        self.emit(EngineEvent::Error {
            scope: ErrorScope::Poll,
            error,
        });
    }

    fn finish_succeeded(&self, job_id: &JobId, url: String) {
        let mut applied = false;
        self.update(job_id, |r| applied = r.succeed(url.clone()).is_ok());
        if applied {
            info!(%job_id, %url, "extraction ready");
            self.emit(EngineEvent::JobSucceeded {
                job_id: job_id.clone(),
                result_url: url,
            });
        }
    }

    fn finish_failed(&self, job_id: &JobId, reason: String) {
        let mut applied = false;
        self.update(job_id, |r| applied = r.fail(reason.clone()).is_ok());
        if applied {
            warn!(%job_id, %reason, "extraction failed");
            self.emit(EngineEvent::JobFailed {
                job_id: job_id.clone(),
                reason,
            });
        }
    }
}

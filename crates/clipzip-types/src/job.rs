//! Extraction job records.
//!
//! # State Machine
//!
//! ```text
//!   submit ──accepted──▶ Polling ──successful──▶ Succeeded
//!     │                     │
//!     │                     └──failed / poll error──▶ Failed
//!     │
//!     └──rejected──▶ Dismissed
//! ```
//!
//! States only move forward. A record is created on submission and lives as
//! long as the tracker that holds it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::ids::JobId;

/// Lifecycle state of one extraction job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    /// Accepted by the server, status being polled.
    Polling,
    /// Finished; the result URL is recorded.
    Succeeded,
    /// The server reported failure, or polling was interrupted.
    Failed,
    /// Never queued server-side.
    Dismissed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobState::Polling)
    }

    fn can_advance_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Polling, JobState::Succeeded) | (JobState::Polling, JobState::Failed)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job {job_id} cannot move from {from} to {to}")]
pub struct JobTransitionError {
    pub job_id: JobId,
    pub from: JobState,
    pub to: JobState,
}

/// Everything known about one extraction request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub submitted_at: DateTime<Utc>,
    /// Percent complete as last reported by the server (0–100).
    pub progress: u8,
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    /// Why the job failed or was dismissed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl JobRecord {
    /// A job the server accepted; polling starts from here.
    pub fn accepted(job_id: JobId, submitted_at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            submitted_at,
            progress: 0,
            state: JobState::Polling,
            result_url: None,
            failure: None,
        }
    }

    /// A job the server refused, under a locally generated id.
    pub fn dismissed(submitted_at: DateTime<Utc>, reason: impl Into<String>) -> Self {
        Self {
            job_id: JobId::local(),
            submitted_at,
            progress: 0,
            state: JobState::Dismissed,
            result_url: None,
            failure: Some(reason.into()),
        }
    }

    /// Record progress. Ignored once terminal; never decreases.
    pub fn update_progress(&mut self, progress: u8) {
        if self.state == JobState::Polling {
            self.progress = self.progress.max(progress.min(100));
        }
    }

    pub fn succeed(&mut self, result_url: impl Into<String>) -> Result<(), JobTransitionError> {
        self.advance(JobState::Succeeded)?;
        self.progress = 100;
        self.result_url = Some(result_url.into());
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), JobTransitionError> {
        self.advance(JobState::Failed)?;
        self.failure = Some(reason.into());
        Ok(())
    }

    fn advance(&mut self, next: JobState) -> Result<(), JobTransitionError> {
        if !self.state.can_advance_to(next) {
            return Err(JobTransitionError {
                job_id: self.job_id.clone(),
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

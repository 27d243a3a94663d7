//! Job domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use super::error::ErrorRecord;

/// Identifies one job within a run
pub type JobId = Uuid;

/// Job lifecycle state
///
/// Jobs only move forward: `Pending → Connecting → Executing → Writing →
/// Completed`, with `Failed` reachable from the three middle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Connecting,
    Executing,
    Writing,
    Completed,
    Failed,
}

impl JobState {
    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Pending, Connecting)
                | (Connecting, Executing)
                | (Executing, Writing)
                | (Writing, Completed)
                | (Connecting | Executing | Writing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Pending => "pending",
            JobState::Connecting => "connecting",
            JobState::Executing => "executing",
            JobState::Writing => "writing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Terminal result of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobResult {
    Completed {
        artifact: PathBuf,
        rows_written: u64,
        statements_executed: usize,
    },
    Failed {
        /// 1-based index of the failing statement; `None` when the job never
        /// reached a statement (connection or file errors)
        statement_index: Option<usize>,
        error: ErrorRecord,
    },
}

/// The one outcome every job produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub source: PathBuf,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub result: JobResult,
}

impl JobOutcome {
    pub fn new(job_id: JobId, source: PathBuf, result: JobResult) -> Self {
        Self {
            job_id,
            source,
            finished_at: chrono::Utc::now(),
            result,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.result, JobResult::Completed { .. })
    }

    pub fn error(&self) -> Option<&ErrorRecord> {
        match &self.result {
            JobResult::Failed { error, .. } => Some(error),
            JobResult::Completed { .. } => None,
        }
    }
}

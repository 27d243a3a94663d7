//! Job context
//!
//! The per-job handle carried by a session for its whole lifetime. It tags
//! every error with the job that produced it, which is what makes errors from
//! concurrent jobs attributable without any global callback state.

use oradump_core::domain::error::ErrorRecord;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

use crate::error::{DbError, JobError};
use crate::service::ErrorReporter;

/// Identity and error channel of one job
pub struct JobContext {
    job_id: Uuid,
    source: PathBuf,
    reporter: Arc<ErrorReporter>,
    /// The one record this job emitted, if any
    record: OnceLock<ErrorRecord>,
}

impl JobContext {
    pub fn new(job_id: Uuid, source: PathBuf, reporter: Arc<ErrorReporter>) -> Arc<Self> {
        Arc::new(Self {
            job_id,
            source,
            reporter,
            record: OnceLock::new(),
        })
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Reports a database error raised while running `sql`
    ///
    /// Called by the session as soon as the driver fails, before the error
    /// travels back up to the job.
    pub fn report_db_error(&self, index: usize, sql: &str, err: &DbError) {
        let job_error = JobError::Statement {
            index,
            sql: sql.to_string(),
            source: err.clone(),
        };
        self.report(job_error.to_record(self.job_id, self.source.clone()));
    }

    /// Reports the error that failed this job
    ///
    /// Returns the record the reporter received, which is the earlier one if
    /// the session already reported the same failure.
    pub fn report_failure(&self, err: &JobError) -> ErrorRecord {
        let record = err.to_record(self.job_id, self.source.clone());
        self.report(record.clone());
        self.record.get().cloned().unwrap_or(record)
    }

    /// Hands `record` to the reporter unless this job already reported one
    ///
    /// A failed job emits exactly one record however many layers saw the
    /// error. Returns whether the record was emitted.
    pub fn report(&self, record: ErrorRecord) -> bool {
        if self.record.set(record).is_err() {
            return false;
        }
        if let Some(record) = self.record.get() {
            self.reporter.report(record);
        }
        true
    }
}

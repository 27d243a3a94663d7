//! Error types for the runner
//!
//! `InitializationError` is the only error that stops a batch. Everything a
//! single job can run into is a `JobError`, which the job converts into an
//! `ErrorRecord` and a failed outcome at its boundary.

use oradump_core::domain::error::{ErrorKind, ErrorRecord};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// An error reported by the database driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbError {
    /// Oracle error number, e.g. 942 for ORA-00942
    pub code: Option<i32>,
    pub message: String,
}

impl DbError {
    pub fn new(code: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            // Driver messages usually carry the ORA- prefix already
            Some(code) if !self.message.starts_with("ORA-") => {
                write!(f, "ORA-{:05}: {}", code, self.message)
            }
            _ => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for DbError {}

/// The database client layer could not be set up
#[derive(Debug, Error)]
#[error("Failed to initialize database client: {0}")]
pub struct InitializationError(pub String);

/// Errors that fail a single job
#[derive(Debug, Error)]
pub enum JobError {
    /// Session could not be opened
    #[error("Connection failed: {0}")]
    Connection(#[source] DbError),

    /// A statement failed while executing or fetching rows
    #[error("Statement {index} failed: {source}")]
    Statement {
        /// 1-based position of the statement in its script
        index: usize,
        sql: String,
        #[source]
        source: DbError,
    },

    /// Script or artifact file could not be read, written or flushed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl JobError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::Connection(_) => ErrorKind::Connection,
            JobError::Statement { .. } => ErrorKind::Statement,
            JobError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Index of the failing statement, if the error is tied to one
    pub fn statement_index(&self) -> Option<usize> {
        match self {
            JobError::Statement { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Builds the error record for the job that hit this error
    pub fn to_record(&self, job_id: Uuid, source: PathBuf) -> ErrorRecord {
        match self {
            JobError::Connection(err) => {
                ErrorRecord::new(job_id, source, self.kind(), err.to_string()).with_code(err.code)
            }
            JobError::Statement { sql, source: err, .. } => {
                ErrorRecord::new(job_id, source, self.kind(), err.to_string())
                    .with_code(err.code)
                    .with_statement(sql.clone())
            }
            JobError::Io { .. } => ErrorRecord::new(job_id, source, self.kind(), self.to_string()),
        }
    }
}

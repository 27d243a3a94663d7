//! Error record domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::job::JobId;

/// Which stage of a job produced the failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Connection,
    Statement,
    Io,
    /// The job aborted unexpectedly (a panic inside the job)
    Internal,
}

/// A structured failure entry handed to the error reporter
///
/// Records are created once and appended; nothing mutates them afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub job_id: JobId,
    pub source: PathBuf,
    pub kind: ErrorKind,
    /// Database error code (the NNNNN of ORA-NNNNN), when the driver gave one
    pub code: Option<i32>,
    pub message: String,
    /// Text of the offending statement, when the failure is tied to one
    pub statement: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorRecord {
    pub fn new(
        job_id: JobId,
        source: PathBuf,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            job_id,
            source,
            kind,
            code: None,
            message: message.into(),
            statement: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_code(mut self, code: Option<i32>) -> Self {
        self.code = code;
        self
    }

    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = Some(statement.into());
        self
    }

    /// Error code in Oracle notation, e.g. `ORA-00942`
    pub fn code_label(&self) -> String {
        match self.code {
            Some(code) => format!("ORA-{:05}", code),
            None => "-".to_string(),
        }
    }

    /// Serializes the record as a single JSON line (no trailing newline)
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "code: {} msg: {} sql: {}",
            self.code_label(),
            self.message,
            self.statement.as_deref().unwrap_or("")
        )
    }
}

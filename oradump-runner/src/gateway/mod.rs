//! Session gateway
//!
//! Opens and tears down the one database connection each job owns. Drivers
//! plug in behind `SessionGateway`; the job only ever sees a `Session`,
//! which ties the raw connection to the job's error channel.

pub mod oracle;

#[cfg(test)]
pub(crate) mod memory;

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ConnectTarget;
use crate::context::JobContext;
use crate::error::{DbError, JobError};

/// A single column value as handed to the output writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    /// Numbers, dates and text, as rendered by the driver
    Text(String),
    /// Binary or large-object column, not serialized
    Opaque(&'static str),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(text) => f.write_str(text),
            Value::Opaque(placeholder) => f.write_str(placeholder),
        }
    }
}

pub type Row = Vec<Value>;

/// Result column metadata, resolved once per statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    /// 1-based position in the select list
    pub ordinal: usize,
}

/// Rows of one query, fetched lazily in server order
pub trait Cursor: Iterator<Item = Result<Row, DbError>> {
    fn columns(&self) -> &[Column];
}

/// What executing one statement produced
pub enum Execution<'a> {
    /// The statement is a query
    Rows(Box<dyn Cursor + 'a>),
    /// DML, DDL or PL/SQL; the number of rows affected
    Affected(u64),
}

/// A raw driver connection
pub trait Connection: Send {
    /// Executes one statement; the database decides whether it yields rows
    fn execute(&mut self, sql: &str) -> Result<Execution<'_>, DbError>;

    fn commit(&mut self) -> Result<(), DbError>;

    fn close(self: Box<Self>) -> Result<(), DbError>;
}

/// Driver entry point
pub trait SessionGateway: Send + Sync {
    /// Opens a new connection; must not retry
    fn connect(&self, target: &ConnectTarget) -> Result<Box<dyn Connection>, DbError>;
}

/// A job's database session
///
/// Every database error raised through the session is reported on the job's
/// context the moment it happens. The connection is closed on `close` or,
/// failing that, on drop.
pub struct Session {
    conn: Option<Box<dyn Connection>>,
    ctx: Arc<JobContext>,
}

impl Session {
    /// Opens a session for the job behind `ctx`
    pub fn open(
        gateway: &dyn SessionGateway,
        target: &ConnectTarget,
        ctx: Arc<JobContext>,
    ) -> Result<Self, JobError> {
        debug!(job = %ctx.job_id(), service = %target.service, "Opening session");

        let conn = gateway.connect(target).map_err(JobError::Connection)?;

        Ok(Self {
            conn: Some(conn),
            ctx,
        })
    }

    /// Executes the statement at 1-based position `index`
    pub fn execute(&mut self, index: usize, sql: &str) -> Result<Execution<'_>, DbError> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(DbError::new(None, "session is closed"));
        };

        match conn.execute(sql) {
            Ok(execution) => Ok(execution),
            Err(err) => {
                self.ctx.report_db_error(index, sql, &err);
                Err(err)
            }
        }
    }

    pub fn commit(&mut self) -> Result<(), DbError> {
        match self.conn.as_mut() {
            Some(conn) => conn.commit(),
            None => Err(DbError::new(None, "session is closed")),
        }
    }

    /// Closes the connection
    ///
    /// Idempotent. A failure to close is logged and otherwise ignored.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            debug!(job = %self.ctx.job_id(), "Closing session");
            if let Err(e) = conn.close() {
                warn!(job = %self.ctx.job_id(), "Failed to close session: {}", e);
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

//! In-memory gateway for tests
//!
//! Answers statements from a table of canned responses keyed by SQL text and
//! keeps counters on sessions, so batch behaviour can be checked without a
//! database.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{Column, Connection, Cursor, Execution, Row, SessionGateway, Value};
use crate::config::ConnectTarget;
use crate::error::DbError;

#[derive(Clone)]
enum Response {
    Rows {
        columns: Vec<String>,
        rows: Vec<Result<Row, DbError>>,
    },
    Affected(u64),
    Error(DbError),
    Panic(&'static str),
}

/// Session counters shared by the gateway and its connections
#[derive(Default)]
pub(crate) struct MemoryStats {
    opened: AtomicUsize,
    closed: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    commits: AtomicUsize,
    executed: Mutex<Vec<String>>,
}

impl MemoryStats {
    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub(crate) fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Every statement text executed, in execution order
    pub(crate) fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

pub(crate) struct MemoryGateway {
    responses: Arc<HashMap<String, Response>>,
    rejected_users: HashSet<String>,
    connect_failures: AtomicUsize,
    latency: Duration,
    stats: Arc<MemoryStats>,
}

impl MemoryGateway {
    pub(crate) fn new() -> Self {
        Self {
            responses: Arc::new(HashMap::new()),
            rejected_users: HashSet::new(),
            connect_failures: AtomicUsize::new(0),
            latency: Duration::ZERO,
            stats: Arc::new(MemoryStats::default()),
        }
    }

    fn respond(mut self, sql: &str, response: Response) -> Self {
        Arc::make_mut(&mut self.responses).insert(sql.trim().to_string(), response);
        self
    }

    /// Answers `sql` with a result set
    pub(crate) fn query(self, sql: &str, columns: &[&str], rows: &[&[&str]]) -> Self {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        let rows = rows
            .iter()
            .map(|row| {
                Ok(row
                    .iter()
                    .map(|v| {
                        if v.is_empty() {
                            Value::Null
                        } else {
                            Value::Text(v.to_string())
                        }
                    })
                    .collect())
            })
            .collect();
        self.respond(sql, Response::Rows { columns, rows })
    }

    /// Answers `sql` with rows that end in a fetch error
    pub(crate) fn query_failing_after(
        self,
        sql: &str,
        columns: &[&str],
        rows: &[&[&str]],
        err: DbError,
    ) -> Self {
        let gateway = self.query(sql, columns, rows);
        let mut responses = (*gateway.responses).clone();
        if let Some(Response::Rows { rows, .. }) = responses.get_mut(sql.trim()) {
            rows.push(Err(err));
        }
        Self {
            responses: Arc::new(responses),
            ..gateway
        }
    }

    /// Answers `sql` with an affected-row count
    pub(crate) fn dml(self, sql: &str, affected: u64) -> Self {
        self.respond(sql, Response::Affected(affected))
    }

    /// Fails `sql` with `ORA-<code>`
    pub(crate) fn error(self, sql: &str, code: i32, message: &str) -> Self {
        self.respond(sql, Response::Error(DbError::new(Some(code), message)))
    }

    /// Panics inside the driver when `sql` runs
    pub(crate) fn panic_on(self, sql: &str, message: &'static str) -> Self {
        self.respond(sql, Response::Panic(message))
    }

    /// Refuses to connect as `user`
    pub(crate) fn reject_user(mut self, user: &str) -> Self {
        self.rejected_users.insert(user.to_string());
        self
    }

    /// Fails the next `count` connection attempts, whoever makes them
    pub(crate) fn fail_connects(self, count: usize) -> Self {
        self.connect_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Delay applied to every connect and execute
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn stats(&self) -> Arc<MemoryStats> {
        Arc::clone(&self.stats)
    }
}

impl SessionGateway for MemoryGateway {
    fn connect(&self, target: &ConnectTarget) -> Result<Box<dyn Connection>, DbError> {
        std::thread::sleep(self.latency);

        let fail = self
            .connect_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(DbError::new(Some(12541), "ORA-12541: TNS:no listener"));
        }

        if self.rejected_users.contains(&target.user) {
            return Err(DbError::new(
                Some(1017),
                "ORA-01017: invalid username/password; logon denied",
            ));
        }

        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        let active = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_active.fetch_max(active, Ordering::SeqCst);

        Ok(Box::new(MemoryConnection {
            responses: Arc::clone(&self.responses),
            latency: self.latency,
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct MemoryConnection {
    responses: Arc<HashMap<String, Response>>,
    latency: Duration,
    stats: Arc<MemoryStats>,
}

impl Connection for MemoryConnection {
    fn execute(&mut self, sql: &str) -> Result<Execution<'_>, DbError> {
        std::thread::sleep(self.latency);
        self.stats.executed.lock().unwrap().push(sql.to_string());

        match self.responses.get(sql.trim()) {
            Some(Response::Rows { columns, rows }) => Ok(Execution::Rows(Box::new(MemoryCursor {
                columns: columns
                    .iter()
                    .enumerate()
                    .map(|(i, name)| Column {
                        name: name.clone(),
                        ordinal: i + 1,
                    })
                    .collect(),
                rows: rows.clone().into_iter(),
            }))),
            Some(Response::Affected(n)) => Ok(Execution::Affected(*n)),
            Some(Response::Error(err)) => Err(err.clone()),
            Some(Response::Panic(message)) => panic!("{}", message),
            None => Err(DbError::new(Some(900), "ORA-00900: invalid SQL statement")),
        }
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.stats.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), DbError> {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        self.stats.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MemoryCursor {
    columns: Vec<Column>,
    rows: std::vec::IntoIter<Result<Row, DbError>>,
}

impl Iterator for MemoryCursor {
    type Item = Result<Row, DbError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

impl Cursor for MemoryCursor {
    fn columns(&self) -> &[Column] {
        &self.columns
    }
}

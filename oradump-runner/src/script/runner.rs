//! Script runner
//!
//! Executes the statements of one script on one session, strictly in source
//! order, handing each result to the caller before running the next one.

use tracing::debug;

use super::splitter::{Statement, split_script};
use crate::error::JobError;
use crate::gateway::{Execution, Session};

/// Result of one executed statement
pub struct Step<'a> {
    /// 1-based position of the statement in the script
    pub index: usize,
    pub sql: &'a str,
    pub result: Execution<'a>,
}

/// Lazy, fail-fast execution of a script
///
/// Each call to `next_step` runs exactly one statement. Rows of a query are
/// fetched while the caller drains the returned cursor, which has to happen
/// before the next statement runs. After the first failure the runner yields
/// that error once and then nothing.
pub struct ScriptRunner<'s> {
    session: &'s mut Session,
    statements: Vec<Statement>,
    next: usize,
    finished: bool,
}

impl<'s> ScriptRunner<'s> {
    pub fn new(session: &'s mut Session, script: &str) -> Self {
        let statements = split_script(script);
        debug!("Script split into {} statement(s)", statements.len());

        Self {
            session,
            statements,
            next: 0,
            finished: false,
        }
    }

    /// Number of statements started so far, the failing one included
    pub fn executed(&self) -> usize {
        self.next
    }

    /// Executes the next statement
    pub fn next_step(&mut self) -> Option<Result<Step<'_>, JobError>> {
        if self.finished {
            return None;
        }

        let Some(statement) = self.statements.get(self.next) else {
            self.finished = true;
            return None;
        };
        self.next += 1;

        debug!(
            index = statement.index,
            line = statement.line,
            "Executing statement"
        );

        match self.session.execute(statement.index, &statement.sql) {
            Ok(result) => Some(Ok(Step {
                index: statement.index,
                sql: &statement.sql,
                result,
            })),
            Err(source) => {
                self.finished = true;
                Some(Err(JobError::Statement {
                    index: statement.index,
                    sql: statement.sql.clone(),
                    source,
                }))
            }
        }
    }
}

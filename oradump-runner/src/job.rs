//! Job
//!
//! One script file run end to end: read the script, open a session, execute
//! the statements while writing the artifact, commit, publish the artifact.
//! Every job ends in exactly one `JobOutcome`, whatever goes wrong.

use oradump_core::domain::error::{ErrorKind, ErrorRecord};
use oradump_core::domain::job::{JobOutcome, JobResult, JobState};
use oradump_core::domain::script::ScriptSource;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ConnectTarget, RunConfig};
use crate::context::JobContext;
use crate::error::JobError;
use crate::gateway::{Session, SessionGateway};
use crate::script::ScriptRunner;
use crate::service::ErrorReporter;
use crate::writer::{Artifact, OutputWriter, WriteSummary, artifact_path, truncate_artifact};

/// Everything jobs of one batch share, read-only
pub struct JobEnv {
    pub gateway: Arc<dyn SessionGateway>,
    pub target: ConnectTarget,
    pub reporter: Arc<ErrorReporter>,
    pub writer: OutputWriter,
    pub out_dir: PathBuf,
    pub extension: String,
}

impl JobEnv {
    pub fn from_config(
        config: &RunConfig,
        gateway: Arc<dyn SessionGateway>,
        reporter: Arc<ErrorReporter>,
    ) -> Self {
        Self {
            gateway,
            target: config.target.clone(),
            reporter,
            writer: OutputWriter::from_config(config),
            out_dir: config.out_dir.clone(),
            extension: config.extension.clone(),
        }
    }

    pub fn artifact_path(&self, source: &ScriptSource) -> PathBuf {
        artifact_path(&self.out_dir, source, &self.extension)
    }
}

/// A single script's unit of work
pub struct Job {
    id: Uuid,
    source: ScriptSource,
    state: JobState,
    env: Arc<JobEnv>,
    ctx: Arc<JobContext>,
}

impl Job {
    pub fn new(source: ScriptSource, env: Arc<JobEnv>) -> Self {
        let id = Uuid::new_v4();
        let ctx = JobContext::new(id, source.path.clone(), Arc::clone(&env.reporter));

        Self {
            id,
            source,
            state: JobState::Pending,
            env,
            ctx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Runs the job to its terminal state
    pub fn run(mut self) -> JobOutcome {
        let artifact = self.env.artifact_path(&self.source);
        info!(job = %self.id, file = %self.source.display_name(), "Starting job");

        match self.execute(&artifact) {
            Ok(summary) => {
                self.transition(JobState::Completed);
                info!(
                    job = %self.id,
                    file = %self.source.display_name(),
                    rows = summary.rows_written,
                    statements = summary.statements_executed,
                    "Job completed, output written to {}",
                    artifact.display()
                );
                JobOutcome::new(
                    self.id,
                    self.source.path.clone(),
                    JobResult::Completed {
                        artifact,
                        rows_written: summary.rows_written,
                        statements_executed: summary.statements_executed,
                    },
                )
            }
            Err(err) => self.fail(err, &artifact),
        }
    }

    /// Runs the job, turning a panic into a failed outcome
    ///
    /// Keeps the one-outcome-per-job guarantee even when something below the
    /// job misbehaves.
    pub fn run_isolated(self) -> JobOutcome {
        let id = self.id;
        let path = self.source.path.clone();
        let artifact = self.env.artifact_path(&self.source);
        let ctx = Arc::clone(&self.ctx);

        match std::panic::catch_unwind(AssertUnwindSafe(move || self.run())) {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "job panicked".to_string());

                error!(job = %id, file = %path.display(), "Job panicked: {}", message);
                discard_artifact(&artifact);

                let record = ErrorRecord::new(id, path.clone(), ErrorKind::Internal, message);
                ctx.report(record.clone());

                JobOutcome::new(
                    id,
                    path,
                    JobResult::Failed {
                        statement_index: None,
                        error: record,
                    },
                )
            }
        }
    }

    fn execute(&mut self, artifact_path: &Path) -> Result<WriteSummary, JobError> {
        self.transition(JobState::Connecting);

        let script = self
            .source
            .read_text()
            .map_err(|e| JobError::io(&self.source.path, e))?;

        let mut session = Session::open(
            self.env.gateway.as_ref(),
            &self.env.target,
            Arc::clone(&self.ctx),
        )?;

        self.transition(JobState::Executing);

        let mut artifact = Artifact::stage(artifact_path)?;
        let summary = {
            let mut runner = ScriptRunner::new(&mut session, &script);
            self.env
                .writer
                .write_results(artifact.writer(), artifact_path, &mut runner)?
        };

        session
            .commit()
            .map_err(|source| JobError::Statement {
                index: summary.statements_executed + 1,
                sql: "COMMIT".to_string(),
                source,
            })?;
        session.close();

        self.transition(JobState::Writing);
        artifact.commit()?;

        Ok(summary)
    }

    fn fail(mut self, err: JobError, artifact: &Path) -> JobOutcome {
        let failed_in = self.state;
        self.transition(JobState::Failed);

        error!(
            job = %self.id,
            file = %self.source.display_name(),
            state = %failed_in,
            "Job failed: {}",
            err
        );

        discard_artifact(artifact);
        let record = self.ctx.report_failure(&err);

        JobOutcome::new(
            self.id,
            self.source.path.clone(),
            JobResult::Failed {
                statement_index: err.statement_index(),
                error: record,
            },
        )
    }

    fn transition(&mut self, next: JobState) {
        if !self.state.can_transition_to(next) {
            warn!(job = %self.id, "Ignoring invalid transition {} -> {}", self.state, next);
            return;
        }
        debug!(job = %self.id, "Job state {} -> {}", self.state, next);
        self.state = next;
    }
}

fn discard_artifact(artifact: &Path) {
    if let Err(e) = truncate_artifact(artifact) {
        warn!("Failed to truncate {}: {}", artifact.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::gateway::memory::MemoryGateway;
    use crate::service::InMemoryErrorSink;
    use tempfile::TempDir;

    struct Fixture {
        scripts: TempDir,
        out: TempDir,
        sink: InMemoryErrorSink,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                scripts: tempfile::tempdir().unwrap(),
                out: tempfile::tempdir().unwrap(),
                sink: InMemoryErrorSink::new(),
            }
        }

        fn script(&self, name: &str, text: &str) -> ScriptSource {
            let path = self.scripts.path().join(name);
            std::fs::write(&path, text).unwrap();
            ScriptSource::new(path)
        }

        fn env(&self, gateway: MemoryGateway, user: &str) -> Arc<JobEnv> {
            Arc::new(JobEnv {
                gateway: Arc::new(gateway),
                target: ConnectTarget::new("ORCL", user, "tiger"),
                reporter: Arc::new(ErrorReporter::new().with_sink(self.sink.clone())),
                writer: OutputWriter::new(true, ','),
                out_dir: self.out.path().to_path_buf(),
                extension: "out".to_string(),
            })
        }
    }

    fn gateway() -> MemoryGateway {
        MemoryGateway::new()
            .query(
                "select id, name from emp",
                &["ID", "NAME"],
                &[&["1", "king"], &["2", "blake"], &["3", "clark"]],
            )
            .dml("update emp set sal = sal * 2", 3)
    }

    #[test]
    fn test_completed_job() {
        let fx = Fixture::new();
        let gateway = gateway();
        let stats = gateway.stats();
        let source = fx.script("a.sql", "select id, name from emp;\n");

        let outcome = Job::new(source, fx.env(gateway, "scott")).run();

        let artifact = fx.out.path().join("a.out");
        assert_eq!(
            outcome.result,
            JobResult::Completed {
                artifact: artifact.clone(),
                rows_written: 3,
                statements_executed: 1,
            }
        );
        assert_eq!(
            std::fs::read_to_string(&artifact).unwrap(),
            "ID,NAME\n1,king\n2,blake\n3,clark\n"
        );
        assert_eq!(stats.commits(), 1);
        assert_eq!(stats.closed(), 1);
        assert!(fx.sink.records().is_empty());
    }

    #[test]
    fn test_statement_failure() {
        let fx = Fixture::new();
        let gateway = gateway();
        let stats = gateway.stats();
        let source = fx.script(
            "b.sql",
            "select id, name from emp;\nselect * from nowhere;\nupdate emp set sal = sal * 2;\n",
        );
        std::fs::write(fx.out.path().join("b.out"), "old output\n").unwrap();

        let outcome = Job::new(source.clone(), fx.env(gateway, "scott")).run();

        match &outcome.result {
            JobResult::Failed {
                statement_index,
                error,
            } => {
                assert_eq!(*statement_index, Some(2));
                assert_eq!(error.kind, ErrorKind::Statement);
                assert_eq!(error.statement.as_deref(), Some("select * from nowhere"));
            }
            other => panic!("unexpected result: {:?}", other),
        }

        assert_eq!(std::fs::read_to_string(fx.out.path().join("b.out")).unwrap(), "");
        assert_eq!(std::fs::read_dir(fx.out.path()).unwrap().count(), 1);

        let records = fx.sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, source.path);

        assert_eq!(stats.executed().len(), 2);
        assert_eq!(stats.commits(), 0);
        assert_eq!(stats.closed(), 1);
    }

    #[test]
    fn test_connection_failure() {
        let fx = Fixture::new();
        let gateway = gateway().reject_user("intruder");
        let stats = gateway.stats();
        let source = fx.script("a.sql", "select id, name from emp;\n");

        let outcome = Job::new(source, fx.env(gateway, "intruder")).run();

        match &outcome.result {
            JobResult::Failed {
                statement_index,
                error,
            } => {
                assert_eq!(*statement_index, None);
                assert_eq!(error.kind, ErrorKind::Connection);
                assert_eq!(error.code, Some(1017));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(stats.opened(), 0);
        assert_eq!(fx.sink.records().len(), 1);
        assert_eq!(std::fs::read_to_string(fx.out.path().join("a.out")).unwrap(), "");
    }

    #[test]
    fn test_missing_script_is_io_failure() {
        let fx = Fixture::new();
        let gateway = gateway();
        let stats = gateway.stats();
        let source = ScriptSource::new(fx.scripts.path().join("gone.sql"));

        let outcome = Job::new(source, fx.env(gateway, "scott")).run();

        assert_eq!(outcome.error().map(|e| e.kind), Some(ErrorKind::Io));
        assert_eq!(stats.opened(), 0);
        assert_eq!(fx.sink.records().len(), 1);
    }

    #[test]
    fn test_database_error_carries_code_and_statement() {
        let fx = Fixture::new();
        let gateway = gateway().error(
            "select * from audit_log",
            942,
            "ORA-00942: table or view does not exist",
        );
        let source = fx.script(
            "c.sql",
            "update emp set sal = sal * 2;\nselect * from audit_log;\n",
        );

        let outcome = Job::new(source, fx.env(gateway, "scott")).run();

        match &outcome.result {
            JobResult::Failed {
                statement_index,
                error,
            } => {
                assert_eq!(*statement_index, Some(2));
                assert_eq!(error.code, Some(942));
                assert_eq!(error.code_label(), "ORA-00942");
                assert_eq!(error.statement.as_deref(), Some("select * from audit_log"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(fx.sink.records().len(), 1);
    }

    #[test]
    fn test_fetch_error_leaves_empty_artifact() {
        let fx = Fixture::new();
        let gateway = MemoryGateway::new().query_failing_after(
            "select id from big",
            &["ID"],
            &[&["1"], &["2"]],
            DbError::new(Some(1555), "ORA-01555: snapshot too old"),
        );
        let stats = gateway.stats();
        let source = fx.script("big.sql", "select id from big;\n");

        let outcome = Job::new(source, fx.env(gateway, "scott")).run();

        match &outcome.result {
            JobResult::Failed {
                statement_index,
                error,
            } => {
                assert_eq!(*statement_index, Some(1));
                assert_eq!(error.kind, ErrorKind::Statement);
                assert_eq!(error.code, Some(1555));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(std::fs::read_to_string(fx.out.path().join("big.out")).unwrap(), "");
        assert_eq!(std::fs::read_dir(fx.out.path()).unwrap().count(), 1);
        assert_eq!(fx.sink.records().len(), 1);
        assert_eq!(stats.commits(), 0);
        assert_eq!(stats.closed(), 1);
    }

    #[test]
    fn test_panicking_job_becomes_internal_failure() {
        let fx = Fixture::new();
        let gateway = gateway().panic_on("select * from cursed", "driver blew up");
        let stats = gateway.stats();
        let source = fx.script("d.sql", "select id, name from emp;\nselect * from cursed;\n");

        let outcome = Job::new(source.clone(), fx.env(gateway, "scott")).run_isolated();

        match &outcome.result {
            JobResult::Failed {
                statement_index,
                error,
            } => {
                assert_eq!(*statement_index, None);
                assert_eq!(error.kind, ErrorKind::Internal);
                assert_eq!(error.message, "driver blew up");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(outcome.source, source.path);
        assert_eq!(std::fs::read_to_string(fx.out.path().join("d.out")).unwrap(), "");
        assert_eq!(std::fs::read_dir(fx.out.path()).unwrap().count(), 1);
        assert_eq!(fx.sink.records().len(), 1);
        // Unwinding still closed the session
        assert_eq!(stats.closed(), 1);
    }
}

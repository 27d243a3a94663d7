//! Batch orchestrator
//!
//! Runs the jobs of a batch with at most `max_parallel_jobs` of them (and so
//! at most that many database sessions) active at any time. Jobs are
//! independent: a failing job never stops, blocks or delays another one, and
//! the batch only finishes once every job has produced its outcome.

use anyhow::{Context as AnyhowContext, Result};
use oradump_core::domain::error::{ErrorKind, ErrorRecord};
use oradump_core::domain::job::{JobOutcome, JobResult};
use oradump_core::domain::script::ScriptSource;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{BatchInput, RunConfig};
use crate::gateway::SessionGateway;
use crate::job::{Job, JobEnv};
use crate::service::ErrorReporter;

/// Lists the scripts of a batch
///
/// A file yields itself, whether or not it exists yet; a missing file fails
/// its own job. A directory yields every regular file directly inside it.
/// Directory order is not meaningful and callers must not rely on it.
pub fn discover(input: &BatchInput) -> Result<Vec<ScriptSource>> {
    match input {
        BatchInput::Nothing => Ok(Vec::new()),
        BatchInput::File(path) => Ok(vec![ScriptSource::new(path)]),
        BatchInput::Directory(dir) => discover_dir(dir),
    }
}

fn discover_dir(dir: &Path) -> Result<Vec<ScriptSource>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read script directory {}", dir.display()))?;

    let mut sources = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        let path = entry.path();
        if path.is_file() {
            sources.push(ScriptSource::new(path));
        } else {
            debug!("Skipping {}: not a regular file", path.display());
        }
    }

    info!("Discovered {} script(s) in {}", sources.len(), dir.display());
    Ok(sources)
}

/// Runs jobs on a bounded pool of blocking workers
pub struct BatchOrchestrator {
    env: Arc<JobEnv>,
    max_parallel_jobs: usize,
    semaphore: Arc<Semaphore>,
}

impl BatchOrchestrator {
    /// Creates an orchestrator running at most `max_parallel_jobs` jobs at once
    pub fn new(env: JobEnv, max_parallel_jobs: usize) -> Self {
        let max_parallel_jobs = max_parallel_jobs.max(1);
        Self {
            env: Arc::new(env),
            max_parallel_jobs,
            semaphore: Arc::new(Semaphore::new(max_parallel_jobs)),
        }
    }

    pub fn from_config(
        config: &RunConfig,
        gateway: Arc<dyn SessionGateway>,
        reporter: Arc<ErrorReporter>,
    ) -> Self {
        Self::new(
            JobEnv::from_config(config, gateway, reporter),
            config.max_parallel_jobs,
        )
    }

    /// Runs one job per source and returns every outcome
    ///
    /// Outcomes arrive in completion order, not discovery order. Sources
    /// whose artifact path is taken by another source fail without running.
    pub async fn run(&self, sources: Vec<ScriptSource>) -> Vec<JobOutcome> {
        let (mut sources, mut outcomes) = self.claim_artifacts(sources);

        if sources.len() > 1 {
            info!(
                "Running {} job(s), up to {} at a time",
                sources.len(),
                self.max_parallel_jobs
            );
            outcomes.extend(self.run_pooled(sources).await);
            return outcomes;
        }

        match sources.pop() {
            Some(source) => outcomes.push(self.run_single(source).await),
            None if outcomes.is_empty() => info!("No scripts to run"),
            None => {}
        }
        outcomes
    }

    /// Gives every artifact path to exactly one source
    ///
    /// Sources are taken in path order, so `a.sql` keeps `a.out` over
    /// `a.txt`. A source whose artifact is already claimed gets a failed
    /// outcome and its job never starts, leaving the shared artifact alone.
    fn claim_artifacts(
        &self,
        mut sources: Vec<ScriptSource>,
    ) -> (Vec<ScriptSource>, Vec<JobOutcome>) {
        sources.sort_by(|a, b| a.path.cmp(&b.path));

        let mut owners: HashMap<PathBuf, PathBuf> = HashMap::new();
        let mut runnable = Vec::with_capacity(sources.len());
        let mut rejected = Vec::new();

        for source in sources {
            let artifact = self.env.artifact_path(&source);
            match owners.get(&artifact) {
                Some(owner) => {
                    let message = format!(
                        "output {} is already written by {}",
                        artifact.display(),
                        owner.display()
                    );
                    warn!(file = %source.display_name(), "Not running: {}", message);
                    rejected.push(self.failed_outcome(
                        Uuid::new_v4(),
                        source.path,
                        ErrorKind::Io,
                        message,
                    ));
                }
                None => {
                    owners.insert(artifact, source.path.clone());
                    runnable.push(source);
                }
            }
        }

        (runnable, rejected)
    }

    /// A lone job skips the pool
    async fn run_single(&self, source: ScriptSource) -> JobOutcome {
        let path = source.path.clone();
        let job = Job::new(source, Arc::clone(&self.env));
        let id = job.id();

        match tokio::task::spawn_blocking(move || job.run_isolated()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(job = %id, "Job task failed: {}", e);
                self.failed_outcome(id, path, ErrorKind::Internal, e.to_string())
            }
        }
    }

    async fn run_pooled(&self, sources: Vec<ScriptSource>) -> Vec<JobOutcome> {
        let total = sources.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut tasks = JoinSet::new();

        for source in sources {
            // Waiting here is the job queue: a job starts only when a worker is free
            let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(file = %source.display_name(), "Worker pool closed: {}", e);
                    outcomes.push(self.failed_outcome(
                        Uuid::new_v4(),
                        source.path,
                        ErrorKind::Internal,
                        format!("worker pool closed: {}", e),
                    ));
                    continue;
                }
            };

            let path = source.path.clone();
            let job = Job::new(source, Arc::clone(&self.env));
            let id = job.id();
            debug!(job = %id, "Dispatching job");

            let worker = tokio::task::spawn_blocking(move || {
                let outcome = job.run_isolated();
                drop(permit);
                outcome
            });
            tasks.spawn(async move { (id, path, worker.await) });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, _, Ok(outcome))) => outcomes.push(outcome),
                Ok((id, path, Err(e))) => {
                    error!(job = %id, "Job task failed: {}", e);
                    let outcome =
                        self.failed_outcome(id, path, ErrorKind::Internal, e.to_string());
                    outcomes.push(outcome);
                }
                Err(e) => error!("Job watcher failed: {}", e),
            }
        }

        outcomes
    }

    /// Outcome for a job that never got to report its own
    fn failed_outcome(
        &self,
        id: Uuid,
        path: PathBuf,
        kind: ErrorKind,
        message: String,
    ) -> JobOutcome {
        let record = ErrorRecord::new(id, path.clone(), kind, message);
        self.env.reporter.report(&record);
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

/// Counts over a batch's outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub rows_written: u64,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[JobOutcome]) -> Self {
        outcomes
            .iter()
            .fold(Self::default(), |mut summary, outcome| {
                summary.total += 1;
                match &outcome.result {
                    JobResult::Completed { rows_written, .. } => {
                        summary.completed += 1;
                        summary.rows_written += rows_written;
                    }
                    JobResult::Failed { .. } => summary.failed += 1,
                }
                summary
            })
    }
}

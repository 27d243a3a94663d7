//! Run configuration
//!
//! Defines the settings of one batch run: what to execute, where to connect,
//! where artifacts go and how many jobs may run at once.

use std::fmt;
use std::path::PathBuf;

/// Database target and credentials
///
/// Supplied once at process start and shared read-only by every job.
#[derive(Clone)]
pub struct ConnectTarget {
    /// Oracle service name, TNS alias or EZConnect string
    pub service: String,
    pub user: String,
    pub password: String,
}

impl ConnectTarget {
    pub fn new(
        service: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectTarget")
            .field("service", &self.service)
            .field("user", &self.user)
            .field("password", &"********")
            .finish()
    }
}

/// What a batch was asked to process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchInput {
    File(PathBuf),
    Directory(PathBuf),
    /// Neither a file nor a directory was given; the batch is empty
    Nothing,
}

/// Batch run configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Single script to execute
    pub file: Option<PathBuf>,

    /// Directory whose regular files are all executed
    pub directory: Option<PathBuf>,

    pub target: ConnectTarget,

    /// Write the column names of the first query as the first line
    pub header: bool,

    /// Directory receiving one artifact per script
    pub out_dir: PathBuf,

    /// Extension given to every artifact (without the dot)
    pub extension: String,

    /// Field separator in artifact rows
    pub delimiter: char,

    /// Upper bound on concurrently running jobs, and so on open sessions
    pub max_parallel_jobs: usize,

    /// Optional JSON-lines file that receives every error record
    pub error_log: Option<PathBuf>,
}

impl RunConfig {
    /// Creates a configuration with defaults for everything but the target
    pub fn new(target: ConnectTarget) -> Self {
        Self {
            file: None,
            directory: None,
            target,
            header: false,
            out_dir: PathBuf::from("out"),
            extension: "out".to_string(),
            delimiter: ',',
            max_parallel_jobs: 4,
            error_log: None,
        }
    }

    /// Resolves the input; a file wins over a directory
    pub fn input(&self) -> BatchInput {
        match (&self.file, &self.directory) {
            (Some(file), _) => BatchInput::File(file.clone()),
            (None, Some(dir)) => BatchInput::Directory(dir.clone()),
            (None, None) => BatchInput::Nothing,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.target.service.is_empty() {
            anyhow::bail!("service name (sid) cannot be empty");
        }

        if self.target.user.is_empty() {
            anyhow::bail!("user cannot be empty");
        }

        if self.max_parallel_jobs == 0 {
            anyhow::bail!("max_parallel_jobs must be greater than 0");
        }

        if self.extension.is_empty() {
            anyhow::bail!("output extension cannot be empty");
        }

        if self.extension.contains(['/', '\\']) {
            anyhow::bail!("output extension cannot contain a path separator");
        }

        if matches!(self.delimiter, '"' | '\n' | '\r') {
            anyhow::bail!("delimiter cannot be a quote or line break");
        }

        Ok(())
    }
}

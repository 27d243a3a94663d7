//! Oradump CLI
//!
//! Executes Oracle SQL scripts and dumps each script's results to a file.
//!
//! Either a single script (`--file`) or every file of a directory (`--dir`)
//! is run. Each script becomes an independent job with its own session;
//! failing scripts are reported and never stop the rest of the batch.

mod logging;
mod summary;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use oradump_runner::gateway::oracle::OracleGateway;
use oradump_runner::scheduler::discover;
use oradump_runner::service::{ErrorReporter, JsonLinesErrorSink, TracingErrorSink};
use oradump_runner::{BatchInput, BatchOrchestrator, ConnectTarget, RunConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "oradump")]
#[command(about = "Run Oracle SQL scripts and dump their results to files", long_about = None)]
struct Cli {
    /// File that contains Oracle scripts
    #[arg(long, env = "ORADUMP_FILE")]
    file: Option<PathBuf>,

    /// Directory where one or more files contain Oracle scripts
    #[arg(long = "dir", env = "ORADUMP_DIR")]
    directory: Option<PathBuf>,

    /// Oracle service name or server instance
    #[arg(long, env = "ORADUMP_SID", default_value = "")]
    sid: String,

    /// Oracle username
    #[arg(long, env = "ORADUMP_USER", default_value = "")]
    user: String,

    /// Oracle password
    #[arg(long, env = "ORADUMP_PASS", default_value = "", hide_env_values = true)]
    pass: String,

    /// Include header in output
    #[arg(
        long,
        env = "ORADUMP_HEADER",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true"
    )]
    header: bool,

    /// Directory receiving one output file per script
    #[arg(long, env = "ORADUMP_OUT_DIR", default_value = "out")]
    out_dir: PathBuf,

    /// Maximum number of scripts running at the same time
    #[arg(long, env = "ORADUMP_WORKERS", default_value_t = 4)]
    workers: usize,

    /// Field separator in output files
    #[arg(long, env = "ORADUMP_DELIMITER", default_value_t = ',')]
    delimiter: char,

    /// Directory for the daily log file
    #[arg(long, env = "ORADUMP_LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    /// File receiving every error record as a JSON line [default: <log-dir>/errors.jsonl]
    #[arg(long, env = "ORADUMP_ERROR_LOG")]
    error_log: Option<PathBuf>,
}

const ERROR_LOG_NAME: &str = "errors.jsonl";

impl Cli {
    fn into_config(self) -> RunConfig {
        let mut config = RunConfig::new(ConnectTarget::new(self.sid, self.user, self.pass));
        config.file = self.file;
        config.directory = self.directory;
        config.header = self.header;
        config.out_dir = self.out_dir;
        config.delimiter = self.delimiter;
        config.max_parallel_jobs = self.workers;
        config.error_log = Some(
            self.error_log
                .unwrap_or_else(|| self.log_dir.join(ERROR_LOG_NAME)),
        );
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Held until exit; dropping it flushes the log file
    let _log_guard = logging::init(&cli.log_dir)?;

    info!("Starting oradump");
    for (name, value) in echo_parameters(&cli) {
        info!("Parameter: {} = {}", name, value);
    }

    let config = cli.into_config();
    config.validate()?;

    let input = config.input();
    if let (Some(_), Some(dir)) = (&config.file, &config.directory) {
        warn!("Both --file and --dir given; ignoring directory {}", dir.display());
    }

    std::fs::create_dir_all(&config.out_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.out_dir.display()
        )
    })?;

    let gateway = match OracleGateway::initialize() {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    let reporter = Arc::new(build_reporter(&config)?);

    let sources = discover(&input)?;
    if matches!(input, BatchInput::Nothing) {
        warn!("Neither --file nor --dir given; nothing to do");
    }

    let orchestrator = BatchOrchestrator::from_config(&config, gateway, Arc::clone(&reporter));
    let outcomes = orchestrator.run(sources).await;

    reporter.flush();
    summary::print(&outcomes, reporter.reported());

    Ok(())
}

fn build_reporter(config: &RunConfig) -> Result<ErrorReporter> {
    let mut reporter = ErrorReporter::new().with_sink(TracingErrorSink);

    if let Some(path) = &config.error_log {
        let sink = JsonLinesErrorSink::open(path)
            .with_context(|| format!("Failed to open error log {}", path.display()))?;
        info!("Appending error records to {}", sink.path().display());
        reporter = reporter.with_sink(sink);
    }

    Ok(reporter)
}

const PASSWORD_MASK: &str = "********";

/// The received parameters, password masked
fn echo_parameters(cli: &Cli) -> Vec<(&'static str, String)> {
    let path = |p: &Option<PathBuf>| {
        p.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    };

    vec![
        ("file", path(&cli.file)),
        ("dir", path(&cli.directory)),
        ("sid", cli.sid.clone()),
        ("user", cli.user.clone()),
        ("pass", PASSWORD_MASK.to_string()),
        ("header", cli.header.to_string()),
        ("out-dir", cli.out_dir.display().to_string()),
        ("workers", cli.workers.to_string()),
    ]
}

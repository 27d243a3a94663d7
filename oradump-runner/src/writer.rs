//! Output writer
//!
//! Serializes statement results into an artifact file. Artifacts are staged
//! in a temporary file next to their destination and only renamed into
//! place once complete, so a reader never sees a half-written artifact.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use oradump_core::domain::script::ScriptSource;

use crate::config::RunConfig;
use crate::error::JobError;
use crate::gateway::{Execution, Value};
use crate::script::ScriptRunner;

/// Starts every summary line, never an unquoted data line
const SUMMARY_PREFIX: &str = "--";

/// Counters for one written artifact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub rows_written: u64,
    pub statements_executed: usize,
}

/// Destination of a script's output: `<out_dir>/<base name>.<extension>`
///
/// Deterministic, so running the same script again overwrites its artifact.
pub fn artifact_path(out_dir: &Path, source: &ScriptSource, extension: &str) -> PathBuf {
    out_dir.join(format!("{}.{}", source.base_name(), extension))
}

/// Serializes statement results as delimited text
#[derive(Debug, Clone)]
pub struct OutputWriter {
    header: bool,
    delimiter: char,
}

impl OutputWriter {
    pub fn new(header: bool, delimiter: char) -> Self {
        Self { header, delimiter }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.header, config.delimiter)
    }

    /// Drains `runner` into `out`
    ///
    /// Query rows are written in cursor order. With a header, the column
    /// names of the first query come first, even when statements without
    /// rows ran before it. Statements without rows add a summary line.
    /// Stops at the first failing statement; `path` only labels I/O errors.
    pub fn write_results<W: Write>(
        &self,
        out: &mut W,
        path: &Path,
        runner: &mut ScriptRunner<'_>,
    ) -> Result<WriteSummary, JobError> {
        let io_error = |e: std::io::Error| JobError::io(path, e);
        let mut summary = WriteSummary::default();
        let mut header_pending = self.header;

        while let Some(step) = runner.next_step() {
            let step = step?;
            summary.statements_executed += 1;

            match step.result {
                Execution::Rows(cursor) => {
                    if header_pending {
                        let names = cursor.columns().iter().map(|c| c.name.as_str());
                        self.write_line(out, names).map_err(io_error)?;
                        header_pending = false;
                    }

                    let mut rows = 0u64;
                    for row in cursor {
                        let row = row.map_err(|source| JobError::Statement {
                            index: step.index,
                            sql: step.sql.to_string(),
                            source,
                        })?;
                        let fields: Vec<String> = row.iter().map(Value::to_string).collect();
                        self.write_line(out, fields.iter().map(String::as_str))
                            .map_err(io_error)?;
                        rows += 1;
                    }

                    debug!(index = step.index, rows, "Statement returned rows");
                    summary.rows_written += rows;
                }
                Execution::Affected(count) => {
                    writeln!(
                        out,
                        "{} statement {}: {} row(s) affected",
                        SUMMARY_PREFIX, step.index, count
                    )
                    .map_err(io_error)?;
                }
            }
        }

        Ok(summary)
    }

    fn write_line<'a, W: Write>(
        &self,
        out: &mut W,
        fields: impl Iterator<Item = &'a str>,
    ) -> std::io::Result<()> {
        let mut line = String::new();
        for (i, field) in fields.enumerate() {
            if i > 0 {
                line.push(self.delimiter);
            }
            self.push_field(&mut line, field);
        }
        line.push('\n');
        out.write_all(line.as_bytes())
    }

    /// Quotes a field only when it would otherwise be ambiguous
    ///
    /// A leading `--` is quoted too: unquoted, that prefix is reserved for
    /// summary lines.
    fn push_field(&self, line: &mut String, field: &str) {
        let needs_quotes = field.starts_with(SUMMARY_PREFIX)
            || field
                .chars()
                .any(|c| c == self.delimiter || matches!(c, '"' | '\n' | '\r'));

        if needs_quotes {
            line.push('"');
            line.push_str(&field.replace('"', "\"\""));
            line.push('"');
        } else {
            line.push_str(field);
        }
    }
}

/// An artifact being written
///
/// Dropping an uncommitted artifact deletes the staged file and leaves the
/// destination untouched.
pub struct Artifact {
    path: PathBuf,
    file: BufWriter<NamedTempFile>,
}

impl Artifact {
    /// Starts a new artifact for `path` in the same directory
    pub fn stage(path: &Path) -> Result<Self, JobError> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let file = tempfile::Builder::new()
            .prefix(&format!(".{}.", name))
            .suffix(".partial")
            .tempfile_in(dir)
            .map_err(|e| JobError::io(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: BufWriter::new(file),
        })
    }

    pub fn writer(&mut self) -> &mut impl Write {
        &mut self.file
    }

    /// Flushes the artifact to disk and moves it over the destination
    pub fn commit(self) -> Result<PathBuf, JobError> {
        let path = self.path;
        let file = self
            .file
            .into_inner()
            .map_err(|e| JobError::io(&path, e.into_error()))?;

        file.as_file()
            .sync_all()
            .map_err(|e| JobError::io(&path, e))?;
        file.persist(&path).map_err(|e| JobError::io(&path, e.error))?;

        Ok(path)
    }
}

/// Leaves an empty file at `path`
///
/// Used for failed jobs so a stale artifact from an earlier run cannot pass
/// for this run's output.
pub fn truncate_artifact(path: &Path) -> std::io::Result<()> {
    File::create(path).map(|_| ())
}

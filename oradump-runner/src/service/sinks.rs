//! Error sinks
//!
//! Destinations for error records. Every sink must accept records from many
//! jobs at once and append each one as a unit.

use oradump_core::domain::error::ErrorRecord;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, warn};

/// A destination for error records
pub trait ErrorSink: Send + Sync {
    /// Appends one record
    fn error(&self, record: &ErrorRecord);

    /// Makes everything appended so far durable
    fn flush(&self);
}

/// Sink that emits each record as a `tracing` error event
///
/// Whatever subscriber the process installed (console, daily file) decides
/// where the line ends up. One record is one event.
#[derive(Debug, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn error(&self, record: &ErrorRecord) {
        error!(
            job = %record.job_id,
            file = %record.source.display(),
            kind = ?record.kind,
            "{}",
            record
        );
    }

    /// The subscriber's writer owns durability; the CLI installs a
    /// blocking-when-full file writer flushed on exit.
    fn flush(&self) {}
}

/// Sink appending one JSON document per line to a file
pub struct JsonLinesErrorSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesErrorSink {
    /// Opens `path` for appending, creating it if needed
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ErrorSink for JsonLinesErrorSink {
    fn error(&self, record: &ErrorRecord) {
        let line = match record.to_json_line() {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to serialize error record: {}", e);
                return;
            }
        };

        // The whole line is written under one lock acquisition
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(writer, "{}", line) {
            warn!("Failed to append to {}: {}", self.path.display(), e);
        }
    }

    fn flush(&self) {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writer.flush().and_then(|_| writer.get_ref().sync_data()) {
            warn!("Failed to flush {}: {}", self.path.display(), e);
        }
    }
}

/// In-memory sink
///
/// Clones share the same buffer, so a clone can be handed to the reporter
/// while the test keeps one for inspection.
#[derive(Clone, Default)]
pub struct InMemoryErrorSink {
    records: Arc<Mutex<Vec<ErrorRecord>>>,
}

impl InMemoryErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record received so far
    pub fn records(&self) -> Vec<ErrorRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ErrorSink for InMemoryErrorSink {
    fn error(&self, record: &ErrorRecord) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use oradump_core::domain::error::ErrorKind;
    use std::thread;
    use uuid::Uuid;

    fn record(n: usize) -> ErrorRecord {
        ErrorRecord::new(
            Uuid::new_v4(),
            PathBuf::from(format!("/scripts/{}.sql", n)),
            ErrorKind::Statement,
            format!("ORA-00900: invalid SQL statement ({})", n),
        )
        .with_code(Some(900))
        .with_statement(format!("selec {}\nfrom dual", "x".repeat(512 * n)))
    }

    #[test]
    fn test_json_lines_concurrent_appends_are_not_torn() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.jsonl");
        let sink = Arc::new(JsonLinesErrorSink::open(&path).unwrap());

        let handles: Vec<_> = (0..16)
            .map(|n| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    sink.error(&record(n));
                    sink.flush();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 16);

        let mut sources: Vec<PathBuf> = lines
            .iter()
            .map(|line| serde_json::from_str::<ErrorRecord>(line).unwrap().source)
            .collect();
        sources.sort();
        sources.dedup();
        assert_eq!(sources.len(), 16);
    }

    #[test]
    fn test_json_lines_appends_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.jsonl");

        for n in 0..2 {
            let sink = JsonLinesErrorSink::open(&path).unwrap();
            sink.error(&record(n));
            sink.flush();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_in_memory_clones_share_buffer() {
        let sink = InMemoryErrorSink::new();
        let clone = sink.clone();
        clone.error(&record(1));
        assert_eq!(sink.records().len(), 1);
    }
}

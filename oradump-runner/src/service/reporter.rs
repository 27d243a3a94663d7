//! Error reporter
//!
//! The process-wide destination for error records. Jobs never talk to sinks
//! directly; they hand records to the reporter through their job context.

use oradump_core::domain::error::ErrorRecord;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::sinks::ErrorSink;

/// Fans error records out to every registered sink
///
/// Reporting never fails and never changes a job's outcome. Each record is
/// flushed right away so a long batch leaves a usable trail even if the
/// process is killed.
pub struct ErrorReporter {
    sinks: Vec<Box<dyn ErrorSink>>,
    reported: AtomicUsize,
}

impl ErrorReporter {
    /// Creates a reporter without sinks
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            reported: AtomicUsize::new(0),
        }
    }

    /// Adds a sink
    pub fn with_sink(mut self, sink: impl ErrorSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Appends `record` to every sink and flushes them
    pub fn report(&self, record: &ErrorRecord) {
        for sink in &self.sinks {
            sink.error(record);
            sink.flush();
        }
        self.reported.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of records reported so far
    pub fn reported(&self) -> usize {
        self.reported.load(Ordering::Relaxed)
    }

    pub fn flush(&self) {
        for sink in &self.sinks {
            sink.flush();
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

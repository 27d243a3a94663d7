//! Service layer
//!
//! Process-wide services shared by every job. Currently this is the error
//! reporter, which fans each error record out to a set of sinks.
//!
//! Sinks are trait-based so the CLI can pick durable destinations and tests
//! can collect records in memory.

mod reporter;
mod sinks;

pub use reporter::ErrorReporter;
pub use sinks::ErrorSink;

pub use sinks::{InMemoryErrorSink, JsonLinesErrorSink, TracingErrorSink};

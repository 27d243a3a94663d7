//! Scheduler layer
//!
//! Discovers the scripts of a batch and runs one job per script on a
//! bounded pool of workers, collecting every outcome.

pub mod batch;

pub use batch::{BatchOrchestrator, BatchSummary, discover};

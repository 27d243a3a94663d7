//! Oradump Runner
//!
//! The batch script-execution engine: runs Oracle SQL scripts and dumps
//! their results to files, one job per script.
//!
//! Architecture:
//! - Configuration: resolved run settings and the batch input
//! - Gateway: opens and closes one database session per job
//! - Script: splits script text into statements and runs them in order
//! - Writer: serializes statement results into an artifact file
//! - Job: the per-file state machine tying the above together
//! - Services: the process-wide error reporter and its sinks
//! - Scheduler: discovery and the bounded worker pool

pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod job;
pub mod scheduler;
pub mod script;
pub mod service;
pub mod writer;

pub use config::{BatchInput, ConnectTarget, RunConfig};
pub use error::{DbError, InitializationError, JobError};
pub use scheduler::BatchOrchestrator;

//! Core domain types
//!
//! These types describe one batch run: the scripts that were discovered,
//! the lifecycle of the job executing each of them, and the structured
//! failure records produced along the way.

pub mod error;
pub mod job;
pub mod script;

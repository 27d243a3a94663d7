//! Script layer
//!
//! Turns script text into statements and runs them, in order, on a session.

pub mod runner;
pub mod splitter;

pub use runner::{ScriptRunner, Step};
pub use splitter::{Statement, split_script};

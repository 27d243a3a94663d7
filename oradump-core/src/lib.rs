//! Oradump Core
//!
//! Core types shared by the oradump engine and command-line front end.
//!
//! This crate contains:
//! - Domain types: script sources, job states and outcomes, error records

pub mod domain;

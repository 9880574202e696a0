//! idxlint CLI - Command-line interface for the idxlint analyzer.
//!
//! This crate provides the `idxlint` binary, which scans a project's modules
//! for queried columns without a usable index, optionally against a baseline
//! of accepted findings.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;

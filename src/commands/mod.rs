//! CLI command implementations for herakles-process-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Configuration and procfs validation
//! - `config`: Configuration file generation
//! - `test`: One-shot scrape with record output

pub mod check;
pub mod config;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use test::command_test;

//! Command-line interface for marketpulse.
//!
//! Provides commands for listing data modules and running collection
//! pipelines.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};

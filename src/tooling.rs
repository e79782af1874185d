//! Tooling
//!
//! Command-line entry points over the dashboard and the fix-retry orchestrator.

pub mod cli;

pub use cli::{Cli, CliContext, Commands, LayoutCommands};

//! CLI module for the cf-deploy tool.
//!
//! This module provides the command-line interface for managing
//! Cloud Foundry deployments.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;

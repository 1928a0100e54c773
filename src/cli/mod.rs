//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for the exporter using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Sechub Export - security findings export workflow
#[derive(Parser, Debug)]
#[command(name = "sechub-export")]
#[command(version, about, long_about = None)]
#[command(author = "Sechub Export Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "sechub-export.toml",
        env = "SECHUB_EXPORT_CONFIG"
    )]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "SECHUB_EXPORT_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one export execution to completion
    Export(commands::export::ExportArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Show the progress counter and execution lease
    Status(commands::status::StatusArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),

    /// Overwrite the progress counter
    ResetCounter(commands::reset_counter::ResetCounterArgs),

    /// Clear the execution lease of an execution that died
    ReleaseLease(commands::release_lease::ReleaseLeaseArgs),
}

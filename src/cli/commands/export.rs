//! Export command implementation
//!
//! This module implements the `export` command, which runs one export
//! execution from the configured findings source into storage.

use crate::config::load_config;
use crate::core::export::{ExecutionDriver, ExportSummary, TerminalOutcome};
use crate::domain::{Cursor, ExportError};
use clap::Args;
use tokio::sync::watch;

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Resume pagination from this cursor instead of the first page
    #[arg(long)]
    pub cursor: Option<String>,
}

impl ExportArgs {
    /// Execute the export command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting export command");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Configuration load failed");
                eprintln!("Configuration error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        let starting_cursor = Cursor::from_token(self.cursor.clone());

        // Confirmation prompt (unless --yes)
        if !self.yes {
            println!("Export Configuration:");
            println!("  Source: {} ({})", config.source.endpoint, config.source.region);
            println!("  Storage: {}", config.storage.path);
            println!("  Counter: {}", config.state.counter_parameter);
            println!(
                "  Starting cursor: {}",
                starting_cursor
                    .as_ref()
                    .map(|c| c.as_str())
                    .unwrap_or("(first page)")
            );
            println!(
                "  Retries: {} attempts, {}ms initial, x{} backoff",
                config.workflow.max_attempts,
                config.workflow.initial_interval_ms,
                config.workflow.backoff_rate
            );
            println!();
            print!("Proceed with export? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Export cancelled.");
                return Ok(0);
            }
        }

        tracing::info!("Creating execution driver");
        let driver = match ExecutionDriver::from_config(&config) {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create execution driver");
                eprintln!("Failed to initialize export: {e}");
                return Ok(4); // Connection error exit code
            }
        };

        println!("🚀 Starting export...");
        println!();

        let summary = match driver.run(starting_cursor, shutdown_signal).await {
            Ok(s) => s,
            Err(ExportError::LeaseHeld { lease, holder }) => {
                eprintln!("Another export is already running (lease '{lease}' held by {holder})");
                eprintln!("If that execution is gone: sechub-export release-lease --force");
                return Ok(4);
            }
            Err(e) => {
                tracing::error!(error = %e, "Export failed");
                eprintln!("Export failed: {e}");
                return Ok(5); // Fatal error exit code
            }
        };

        summary.log_summary();
        print_summary(&summary);

        Ok(exit_code(summary.outcome))
    }
}

/// Process exit code for a terminal outcome
pub fn exit_code(outcome: TerminalOutcome) -> i32 {
    match outcome {
        TerminalOutcome::Succeeded => 0,
        TerminalOutcome::Failed => 1,
        TerminalOutcome::TimedOut => 124,
        TerminalOutcome::Aborted => 130, // SIGINT exit code (standard Unix convention)
    }
}

fn print_summary(summary: &ExportSummary) {
    println!();
    println!("📊 Export Summary:");
    println!("  Execution: {}", summary.execution_id);
    println!("  Status: {}", summary.outcome);
    println!("  Items Exported: {}", summary.items_exported);
    println!("  Pages Fetched: {}", summary.pages_fetched);
    match summary.counter_value {
        Some(value) => println!("  Counter: {value}"),
        None => println!("  Counter: (unavailable)"),
    }
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!("  Throughput: {:.1} items/s", summary.items_per_second());
    println!();

    match summary.outcome {
        TerminalOutcome::Succeeded => println!("✅ Export completed successfully!"),
        TerminalOutcome::Aborted => {
            println!("⚠️  Export interrupted. Items already exported stay counted.");
            println!("   Run the command again to start a new execution.");
        }
        TerminalOutcome::TimedOut => println!("⚠️  Export exceeded its execution timeout"),
        TerminalOutcome::Failed => {
            println!(
                "❌ {}",
                summary.cause.as_deref().unwrap_or("Export failed")
            );
            if let Some(ref error) = summary.error {
                println!("   Error: {error}");
            }
        }
    }
}

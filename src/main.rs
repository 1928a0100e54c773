// Sechub Export - Security findings export workflow
// Copyright (c) 2025 Sechub Export Contributors
// Licensed under the MIT License

use clap::Parser;
use sechub_export::cli::{Cli, Commands};
use sechub_export::config::{load_config, LoggingConfig};
use sechub_export::logging::init_logging;
use std::process;
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Export runs also write JSON log files when the config enables them;
    // every other command logs to the console only
    let logging_config = match &cli.command {
        Commands::Export(_) => load_config(&cli.config)
            .map(|c| c.logging)
            .unwrap_or_else(|_| LoggingConfig::console_only()),
        _ => LoggingConfig::console_only(),
    };
    let log_level = cli.log_level.as_deref().unwrap_or("info");
    let guard = match init_logging(log_level, &logging_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(5);
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Sechub Export - security findings export workflow"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create SIGTERM handler");
                    return;
                }
            };

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received SIGINT (Ctrl+C), aborting execution...");
                }
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, aborting execution...");
                }
            }
            let _ = shutdown_tx.send(true);
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            } else {
                tracing::info!("Received SIGINT (Ctrl+C), aborting execution...");
                let _ = shutdown_tx.send(true);
            }
        }
    });

    let exit_code = match execute_command(&cli, shutdown_rx).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command execution failed");
            eprintln!("Error: {e}");
            5 // Fatal error exit code
        }
    };

    // process::exit skips destructors
    drop(guard);
    process::exit(exit_code);
}

/// Execute the CLI command
async fn execute_command(cli: &Cli, shutdown_signal: watch::Receiver<bool>) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Export(args) => args.execute(&cli.config, shutdown_signal).await,
        Commands::ValidateConfig(args) => args.execute(&cli.config).await,
        Commands::Status(args) => args.execute(&cli.config).await,
        Commands::Init(args) => args.execute().await,
        Commands::ResetCounter(args) => args.execute(&cli.config).await,
        Commands::ReleaseLease(args) => args.execute(&cli.config).await,
    }
}

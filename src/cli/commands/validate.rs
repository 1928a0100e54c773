//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the exporter configuration file.

use crate::adapters::securityhub::{FindingFilter, SecurityHubClient};
use crate::config::load_config;
use chrono::Utc;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Also issue a one-item findings request against the source
    #[arg(long)]
    pub check_source: bool,
}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates as part of loading
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration is valid");
                c
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        let filter = FindingFilter::from_config(&config.source, Utc::now());

        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Source Endpoint: {}", config.source.endpoint);
        println!("  Region: {}", config.source.region);
        println!(
            "  Authentication: {}",
            if config.source.api_token.is_some() {
                "bearer token"
            } else {
                "none"
            }
        );
        println!(
            "  Page Size: {} findings, {} pages per call",
            config.source.max_results, config.source.pages_per_call
        );
        println!(
            "  Filters: {}",
            if filter.is_empty() {
                "none".to_string()
            } else {
                serde_json::to_string(&filter)?
            }
        );
        println!(
            "  Storage: {} (prefix '{}')",
            config.storage.path, config.storage.object_prefix
        );
        println!("  State Directory: {}", config.state.path);
        println!("  Counter Parameter: {}", config.state.counter_parameter);
        println!("  Lease: {}", config.state.lease_name);
        println!(
            "  Retry: {} attempts, {}ms initial, x{} backoff, retry on {:?}",
            config.workflow.max_attempts,
            config.workflow.initial_interval_ms,
            config.workflow.backoff_rate,
            config.workflow.retry_on
        );
        match config.workflow.execution_timeout_secs {
            Some(secs) => println!("  Execution Timeout: {secs}s"),
            None => println!("  Execution Timeout: none"),
        }
        println!("  Status Topic: {}", config.notification.topic);
        println!(
            "  Webhook: {}",
            config.notification.webhook_url.as_deref().unwrap_or("none")
        );
        println!();

        if self.check_source {
            let client = match SecurityHubClient::new(&config.source) {
                Ok(c) => c,
                Err(e) => {
                    println!("❌ Failed to create findings client: {e}");
                    return Ok(4);
                }
            };
            match client.test_connection().await {
                Ok(()) => println!("✅ Findings source reachable"),
                Err(e) => {
                    println!("❌ Findings source check failed");
                    println!("   Error: {e}");
                    return Ok(4); // Connection error exit code
                }
            }
            println!();
        }

        Ok(0)
    }
}

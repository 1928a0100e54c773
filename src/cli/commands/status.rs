//! Status command implementation
//!
//! This module implements the `status` command for displaying the progress
//! counter and whether an execution currently holds the lease.

use crate::adapters::factory::create_state_stores;
use crate::config::load_config;
use chrono::Utc;
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print the status as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking export status");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {}", e);
                return Ok(2); // Configuration error exit code
            }
        };

        let (counter_store, lease_store) = create_state_stores(&config);

        let counter = match counter_store.load().await {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to read counter '{}'", counter_store.name());
                println!("   Error: {}", e);
                return Ok(5); // Fatal error exit code
            }
        };

        let lease = match lease_store.current(&config.state.lease_name).await {
            Ok(l) => l,
            Err(e) => {
                println!("❌ Failed to read lease '{}'", config.state.lease_name);
                println!("   Error: {}", e);
                return Ok(5);
            }
        };

        if self.json {
            let status = serde_json::json!({
                "counter": counter,
                "lease": lease,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
            return Ok(0);
        }

        println!("📊 Export Status");
        println!();
        println!("Counter: {}", counter.name);
        println!("  Value: {}", counter.value);
        println!("  Version: {}", counter.version);
        println!(
            "  Last Update: {}",
            counter
                .updated_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "Never".to_string())
        );
        println!();

        match lease {
            Some(lease) if !lease.is_expired_at(Utc::now()) => {
                println!("🔄 Execution running: {}", lease.holder);
                println!(
                    "   Since: {}",
                    lease.acquired_at.format("%Y-%m-%d %H:%M:%S")
                );
                if let Some(expires_at) = lease.expires_at {
                    println!("   Lease expires: {}", expires_at.format("%Y-%m-%d %H:%M:%S"));
                }
                println!("   If that execution is gone: sechub-export release-lease --force");
            }
            Some(lease) => {
                println!(
                    "⏸️  No execution running (expired lease from {})",
                    lease.holder
                );
            }
            None => println!("⏸️  No execution running"),
        }
        println!();

        Ok(0)
    }
}

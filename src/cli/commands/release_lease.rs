//! Release lease command implementation
//!
//! Clears the execution lease left behind by an execution that died
//! without giving it back. A live lease is only removed with `--force`.

use crate::adapters::factory::create_state_stores;
use crate::config::load_config;
use chrono::Utc;
use clap::Args;

/// Arguments for the release-lease command
#[derive(Args, Debug)]
pub struct ReleaseLeaseArgs {
    /// Remove the lease even if it has not expired
    #[arg(long)]
    pub force: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

impl ReleaseLeaseArgs {
    /// Execute the release-lease command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Configuration error: {e}");
                return Ok(2);
            }
        };

        let (_, lease_store) = create_state_stores(&config);
        let name = &config.state.lease_name;

        // An unreadable lease file is stale and always safe to clear
        match lease_store.current(name).await {
            Ok(None) => {
                println!("No lease '{name}' to release");
                return Ok(0);
            }
            Ok(Some(lease)) if !lease.is_expired_at(Utc::now()) && !self.force => {
                eprintln!(
                    "Lease '{}' is held by execution {} since {}; pass --force if that execution is gone",
                    name,
                    lease.holder,
                    lease.acquired_at.format("%Y-%m-%d %H:%M:%S")
                );
                return Ok(4);
            }
            Ok(Some(_)) | Err(_) => {}
        }

        if !self.yes {
            print!("Release lease '{name}'? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Release cancelled.");
                return Ok(0);
            }
        }

        let removed = lease_store.force_release(name).await?;
        tracing::warn!(
            lease = %name,
            previous_holder = ?removed.as_ref().map(|lease| lease.holder.to_string()),
            "Lease released by operator"
        );
        println!("✅ Lease '{name}' released");

        Ok(0)
    }
}

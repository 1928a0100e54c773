//! Reset counter command implementation
//!
//! Overwrites the durable progress counter, e.g. after a storage cleanup.
//! Refuses while an execution holds the lease.

use crate::adapters::factory::create_state_stores;
use crate::config::load_config;
use chrono::Utc;
use clap::Args;

/// Arguments for the reset-counter command
#[derive(Args, Debug)]
pub struct ResetCounterArgs {
    /// New counter value
    #[arg(long, default_value_t = 0)]
    pub value: u64,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

impl ResetCounterArgs {
    /// Execute the reset-counter command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Configuration error: {e}");
                return Ok(2);
            }
        };

        let (counter_store, lease_store) = create_state_stores(&config);

        if let Some(lease) = lease_store.current(&config.state.lease_name).await? {
            if !lease.is_expired_at(Utc::now()) {
                eprintln!(
                    "Execution {} is running; refusing to reset the counter",
                    lease.holder
                );
                return Ok(4);
            }
        }

        let current = counter_store.get().await?;

        if !self.yes {
            print!(
                "Set counter '{}' from {} to {}? [y/N]: ",
                counter_store.name(),
                current,
                self.value
            );
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Reset cancelled.");
                return Ok(0);
            }
        }

        counter_store.set(self.value).await?;
        tracing::warn!(
            counter = counter_store.name(),
            previous = current,
            value = self.value,
            "Counter reset"
        );
        println!("✅ Counter '{}' set to {}", counter_store.name(), self.value);

        Ok(0)
    }
}

//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "sechub-export.toml")]
    pub output: String,

    /// Include example values and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing exporter configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2); // Configuration error exit code
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Create a .env file and set SECHUB_EXPORT_API_TOKEN");
                println!("  3. Validate configuration: sechub-export validate-config --check-source");
                println!("  4. Run export: sechub-export export");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {}", e);
                Ok(5) // Fatal error exit code
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# Sechub Export Configuration File

[application]
log_level = "info"

[source]
endpoint = "https://securityhub.us-east-1.amazonaws.com"
region = "us-east-1"
api_token = "${SECHUB_EXPORT_API_TOKEN}"
max_results = 100
pages_per_call = 50

[storage]
path = "/var/lib/sechub-export/findings"
object_prefix = "security-hub-finding-export"

[state]
path = "/var/lib/sechub-export/state"
counter_parameter = "/sechubexport/count"
lease_name = "sec_hub_finding_export"

[workflow]
max_attempts = 5
initial_interval_ms = 10000
backoff_rate = 2.0

# Longest single wait between attempts
max_interval_ms = 3600000

[notification]
topic = "Security_Hub_Export_Status"

[logging]
local_enabled = true
local_path = "/var/log/sechub-export"
local_rotation = "daily"
"#
        .to_string()
    }

    /// Generate configuration with examples and comments
    fn generate_config_with_examples() -> String {
        r#"# Sechub Export Configuration File
#
# Every value can be overridden with an environment variable named
# SECHUB_EXPORT_<SECTION>_<KEY>, e.g. SECHUB_EXPORT_SOURCE_ENDPOINT.
# ${VAR} references are substituted from the environment at load time.

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# ============================================================================
# Findings Source
# ============================================================================
[source]
# Base URL of the findings API; requests go to <endpoint>/findings
endpoint = "https://securityhub.us-east-1.amazonaws.com"

# Region sent with every request
region = "us-east-1"

# Optional bearer token (use an environment variable)
api_token = "${SECHUB_EXPORT_API_TOKEN}"

# Findings per page (1-100)
max_results = 100

# Pages consolidated into one stored object per fetch call
pages_per_call = 50

# Request timeout in seconds
timeout_seconds = 60

# A throttled page is requested again after a pause, keeping the pages
# already read in the current call
throttle_retries = 3
throttle_delay_ms = 5000

# Optional filters. Leave unset to export every finding.
# lookback_days = 90
# record_state = "ACTIVE"
# workflow_status = ["NEW", "NOTIFIED"]

# ============================================================================
# Storage
# ============================================================================
[storage]
# Objects are written as <path>/YYYY/MM/DD/<object_prefix><uuid>.json
path = "/var/lib/sechub-export/findings"
object_prefix = "security-hub-finding-export"

# Writes attempted per batch when storage fails transiently
put_attempts = 3
put_retry_delay_ms = 5000

# ============================================================================
# Durable State
# ============================================================================
[state]
# Directory holding the counter parameter and the execution lease
path = "/var/lib/sechub-export/state"

# Running total of exported findings
counter_parameter = "/sechubexport/count"

# Only one execution may hold this lease at a time
lease_name = "sec_hub_finding_export"

# Lease lifetime in seconds. Defaults to execution_timeout_secs + 300, or
# 6 hours without a timeout. `sechub-export release-lease` frees it early.
# lease_ttl_secs = 7200

# ============================================================================
# Workflow
# ============================================================================
[workflow]
# Attempts per fetch call, including the first (1-10)
max_attempts = 5

# Wait before the first retry; multiplied by backoff_rate after each failure
initial_interval_ms = 10000
backoff_rate = 2.0

# Longest single wait between attempts
max_interval_ms = 3600000

# Which failures are retried: "all" or "transient"
retry_on = "all"

# Optional wall-clock limit for a whole execution
# execution_timeout_secs = 3600

# Cause reported on failed executions
failure_cause = "Security Hub Export Failed."

# ============================================================================
# Status Notification
# ============================================================================
[notification]
# Topic stamped on every terminal status event
topic = "Security_Hub_Export_Status"

# Optional webhook receiving each status event as JSON
# webhook_url = "https://hooks.example.com/sechub-export"
webhook_timeout_seconds = 10

# ============================================================================
# Logging
# ============================================================================
[logging]
# JSON log files next to console output
local_enabled = true
local_path = "/var/log/sechub-export"

# daily | hourly | size
local_rotation = "daily"
local_max_size_mb = 100
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_init_args_defaults() {
        let args = InitArgs {
            output: "sechub-export.toml".to_string(),
            with_examples: false,
            force: false,
        };

        assert_eq!(args.output, "sechub-export.toml");
        assert!(!args.with_examples);
        assert!(!args.force);
    }

    #[test]
    fn test_generate_minimal_config() {
        let config = InitArgs::generate_minimal_config();
        assert!(config.contains("[source]"));
        assert!(config.contains("[storage]"));
        assert!(config.contains("[workflow]"));
    }

    #[test]
    fn test_generate_config_with_examples() {
        let config = InitArgs::generate_config_with_examples();
        assert!(config.contains("# Sechub Export Configuration File"));
        assert!(config.contains("pages_per_call"));
        assert!(config.contains("retry_on"));
    }

    #[test]
    fn test_generated_configs_parse() {
        std::env::set_var("SECHUB_EXPORT_API_TOKEN", "token");
        for content in [
            InitArgs::generate_minimal_config(),
            InitArgs::generate_config_with_examples(),
        ] {
            let config = parse_config(&content).unwrap();
            assert_eq!(config.source.max_results, 100);
            assert_eq!(config.workflow.max_attempts, 5);
        }
    }

    #[tokio::test]
    async fn test_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("sechub-export.toml");
        fs::write(&output, "existing").unwrap();

        let args = InitArgs {
            output: output.to_string_lossy().into_owned(),
            with_examples: false,
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), 2);
        assert_eq!(fs::read_to_string(&output).unwrap(), "existing");
    }
}

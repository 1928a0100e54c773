//! Configuration management for the exporter.
//!
//! TOML-based configuration loading, parsing, and validation with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `SECHUB_EXPORT_*` environment overrides
//! - Default values matching the deployed workflow
//! - Per-section validation
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sechub_export::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("sechub-export.toml")?;
//! println!("Source: {}", config.source.endpoint);
//! println!("Max attempts: {}", config.workflow.max_attempts);
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! [source]
//! endpoint = "https://securityhub.us-east-1.amazonaws.com"
//! api_token = "${SECHUB_EXPORT_API_TOKEN}"
//!
//! [storage]
//! path = "/var/lib/sechub-export/findings"
//!
//! [workflow]
//! max_attempts = 5
//! initial_interval_ms = 10000
//! backoff_rate = 2.0
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, ExporterConfig, LoggingConfig, NotificationConfig, RetryOn, SourceConfig,
    StateConfig, StorageConfig, WorkflowConfig, DEFAULT_LEASE_TTL_SECS, LEASE_TTL_MARGIN_SECS,
};
pub use secret::{secret_string, SecretString, SecretValue};

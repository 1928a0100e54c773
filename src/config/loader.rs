//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{ExporterConfig, RetryOn};
use crate::config::secret_string;
use crate::domain::errors::ExportError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into ExporterConfig
/// 4. Applies environment variable overrides (SECHUB_EXPORT_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - Environment variable substitution fails
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use sechub_export::config::loader::load_config;
///
/// let config = load_config("sechub-export.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<ExporterConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ExportError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        ExportError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration from a TOML string
///
/// Applies the same substitution, overrides and validation as [`load_config`].
pub fn parse_config(contents: &str) -> Result<ExporterConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: ExporterConfig = toml::from_str(&contents)
        .map_err(|e| ExportError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        ExportError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| ExportError::Other(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        let trimmed = line.trim_start();

        // Comments keep their placeholders
        if trimmed.starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(ExportError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using SECHUB_EXPORT_* prefix
///
/// Environment variables follow the pattern: SECHUB_EXPORT_<SECTION>_<KEY>
/// For example: SECHUB_EXPORT_SOURCE_ENDPOINT, SECHUB_EXPORT_WORKFLOW_MAX_ATTEMPTS
fn apply_env_overrides(config: &mut ExporterConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("SECHUB_EXPORT_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Source overrides
    if let Ok(val) = std::env::var("SECHUB_EXPORT_SOURCE_ENDPOINT") {
        config.source.endpoint = val;
    }
    if let Ok(val) = std::env::var("SECHUB_EXPORT_SOURCE_REGION") {
        config.source.region = val;
    }
    if let Ok(val) = std::env::var("SECHUB_EXPORT_SOURCE_API_TOKEN") {
        config.source.api_token = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("SECHUB_EXPORT_SOURCE_MAX_RESULTS") {
        if let Ok(max) = val.parse() {
            config.source.max_results = max;
        }
    }
    if let Ok(val) = std::env::var("SECHUB_EXPORT_SOURCE_PAGES_PER_CALL") {
        if let Ok(pages) = val.parse() {
            config.source.pages_per_call = pages;
        }
    }

    // Storage overrides
    if let Ok(val) = std::env::var("SECHUB_EXPORT_STORAGE_PATH") {
        config.storage.path = val;
    }

    // State overrides
    if let Ok(val) = std::env::var("SECHUB_EXPORT_STATE_PATH") {
        config.state.path = val;
    }
    if let Ok(val) = std::env::var("SECHUB_EXPORT_STATE_COUNTER_PARAMETER") {
        config.state.counter_parameter = val;
    }

    // Workflow overrides
    if let Ok(val) = std::env::var("SECHUB_EXPORT_WORKFLOW_MAX_ATTEMPTS") {
        if let Ok(attempts) = val.parse() {
            config.workflow.max_attempts = attempts;
        }
    }
    if let Ok(val) = std::env::var("SECHUB_EXPORT_WORKFLOW_INITIAL_INTERVAL_MS") {
        if let Ok(interval) = val.parse() {
            config.workflow.initial_interval_ms = interval;
        }
    }
    if let Ok(val) = std::env::var("SECHUB_EXPORT_WORKFLOW_BACKOFF_RATE") {
        if let Ok(rate) = val.parse() {
            config.workflow.backoff_rate = rate;
        }
    }
    if let Ok(val) = std::env::var("SECHUB_EXPORT_WORKFLOW_MAX_INTERVAL_MS") {
        if let Ok(interval) = val.parse() {
            config.workflow.max_interval_ms = interval;
        }
    }
    if let Ok(val) = std::env::var("SECHUB_EXPORT_WORKFLOW_RETRY_ON") {
        config.workflow.retry_on = match val.to_lowercase().as_str() {
            "all" => RetryOn::All,
            "transient" => RetryOn::Transient,
            other => {
                return Err(ExportError::Configuration(format!(
                    "Invalid SECHUB_EXPORT_WORKFLOW_RETRY_ON '{other}'. Must be one of: all, transient"
                )))
            }
        };
    }
    if let Ok(val) = std::env::var("SECHUB_EXPORT_WORKFLOW_EXECUTION_TIMEOUT_SECS") {
        if let Ok(secs) = val.parse() {
            config.workflow.execution_timeout_secs = Some(secs);
        }
    }

    // Notification overrides
    if let Ok(val) = std::env::var("SECHUB_EXPORT_NOTIFICATION_WEBHOOK_URL") {
        config.notification.webhook_url = Some(val);
    }

    // Logging overrides
    if let Ok(val) = std::env::var("SECHUB_EXPORT_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("SECHUB_EXPORT_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}

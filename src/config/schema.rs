//! Configuration schema types
//!
//! This module defines the configuration structure for the exporter.

use crate::config::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

/// Main exporter configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Findings source settings
    pub source: SourceConfig,

    /// Findings storage settings
    pub storage: StorageConfig,

    /// Counter and lease state settings
    #[serde(default)]
    pub state: StateConfig,

    /// Pagination loop and retry settings
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Terminal status notification settings
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ExporterConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.source.validate()?;
        self.storage.validate()?;
        self.state.validate()?;
        self.workflow.validate()?;
        self.notification.validate()?;
        self.logging.validate()?;

        if let (Some(ttl), Some(timeout)) =
            (self.state.lease_ttl_secs, self.workflow.execution_timeout_secs)
        {
            if ttl < timeout {
                return Err(format!(
                    "state.lease_ttl_secs ({ttl}) must be >= workflow.execution_timeout_secs ({timeout})"
                ));
            }
        }
        Ok(())
    }

    /// Time-to-live of the execution lease
    ///
    /// An explicit `state.lease_ttl_secs` wins. Otherwise the lease outlives
    /// the execution timeout by [`LEASE_TTL_MARGIN_SECS`], or lasts
    /// [`DEFAULT_LEASE_TTL_SECS`] when no timeout is set. A holder that dies
    /// without releasing therefore blocks later runs only until the TTL passes.
    pub fn lease_ttl_secs(&self) -> u64 {
        match (self.state.lease_ttl_secs, self.workflow.execution_timeout_secs) {
            (Some(ttl), _) => ttl,
            (None, Some(timeout)) => timeout.saturating_add(LEASE_TTL_MARGIN_SECS),
            (None, None) => DEFAULT_LEASE_TTL_SECS,
        }
    }
}

/// Lease lifetime beyond the execution timeout
pub const LEASE_TTL_MARGIN_SECS: u64 = 300;

/// Lease lifetime when neither a TTL nor an execution timeout is configured
pub const DEFAULT_LEASE_TTL_SECS: u64 = 6 * 3600;

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// Findings source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the findings API
    pub endpoint: String,

    /// Region the findings are pulled from
    #[serde(default = "default_region")]
    pub region: String,

    /// Optional bearer token
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub api_token: Option<SecretString>,

    /// Findings requested per page (1-100)
    #[serde(default = "default_max_results")]
    pub max_results: u32,

    /// Pages pulled by a single fetch task call
    #[serde(default = "default_pages_per_call")]
    pub pages_per_call: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Only export findings updated within this many days
    #[serde(default)]
    pub lookback_days: Option<u32>,

    /// Optional RecordState equality filter (e.g. ACTIVE)
    #[serde(default)]
    pub record_state: Option<String>,

    /// Optional WorkflowStatus equality filters (e.g. NEW, NOTIFIED)
    #[serde(default)]
    pub workflow_status: Vec<String>,

    /// Times a throttled page is requested again within one fetch call
    #[serde(default = "default_throttle_retries")]
    pub throttle_retries: u32,

    /// Pause before requesting a throttled page again, in milliseconds
    #[serde(default = "default_throttle_delay_ms")]
    pub throttle_delay_ms: u64,
}

impl SourceConfig {
    fn validate(&self) -> Result<(), String> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| format!("source.endpoint '{}' is not a valid URL: {e}", self.endpoint))?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(format!(
                "source.endpoint must use http or https, got '{}'",
                url.scheme()
            ));
        }

        if self.region.is_empty() {
            return Err("source.region cannot be empty".to_string());
        }

        if self.max_results == 0 || self.max_results > 100 {
            return Err(format!(
                "source.max_results must be between 1 and 100, got {}",
                self.max_results
            ));
        }

        if self.pages_per_call == 0 {
            return Err("source.pages_per_call must be > 0".to_string());
        }

        if self.timeout_seconds == 0 {
            return Err("source.timeout_seconds must be > 0".to_string());
        }

        Ok(())
    }
}

/// Findings storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory objects are written under
    pub path: String,

    /// Object name prefix
    #[serde(default = "default_object_prefix")]
    pub object_prefix: String,

    /// Writes attempted per batch when storage fails transiently
    #[serde(default = "default_put_attempts")]
    pub put_attempts: u32,

    /// Pause between batch write attempts, in milliseconds
    #[serde(default = "default_put_retry_delay_ms")]
    pub put_retry_delay_ms: u64,
}

impl StorageConfig {
    fn validate(&self) -> Result<(), String> {
        if self.path.is_empty() {
            return Err("storage.path cannot be empty".to_string());
        }
        if self.object_prefix.is_empty() || self.object_prefix.contains('/') {
            return Err(format!(
                "storage.object_prefix must be a non-empty name without '/', got '{}'",
                self.object_prefix
            ));
        }
        if self.put_attempts == 0 {
            return Err("storage.put_attempts must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Counter and lease state configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Directory holding the parameter and lease files
    #[serde(default = "default_state_path")]
    pub path: String,

    /// Name of the durable counter parameter
    #[serde(default = "default_counter_parameter")]
    pub counter_parameter: String,

    /// Name of the execution lease (one per workflow)
    #[serde(default = "default_lease_name")]
    pub lease_name: String,

    /// Lease time-to-live in seconds; unset derives it from the execution
    /// timeout (see [`ExporterConfig::lease_ttl_secs`])
    #[serde(default)]
    pub lease_ttl_secs: Option<u64>,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
            counter_parameter: default_counter_parameter(),
            lease_name: default_lease_name(),
            lease_ttl_secs: None,
        }
    }
}

impl StateConfig {
    fn validate(&self) -> Result<(), String> {
        if self.path.is_empty() {
            return Err("state.path cannot be empty".to_string());
        }
        if self.counter_parameter.is_empty() {
            return Err("state.counter_parameter cannot be empty".to_string());
        }
        if self.lease_name.is_empty() {
            return Err("state.lease_name cannot be empty".to_string());
        }
        if self.lease_ttl_secs == Some(0) {
            return Err("state.lease_ttl_secs must be > 0 when set".to_string());
        }
        Ok(())
    }
}

/// Which fetch failures the retry policy retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetryOn {
    /// Every error is retried
    #[default]
    All,
    /// Only errors classified transient are retried
    Transient,
}

/// Pagination loop and retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Total attempts per fetch call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wait before the first retry, in milliseconds
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,

    /// Multiplier applied to the wait after each failed attempt
    #[serde(default = "default_backoff_rate")]
    pub backoff_rate: f64,

    /// Longest single wait between attempts, in milliseconds
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    /// Error classes that are retried
    #[serde(default)]
    pub retry_on: RetryOn,

    /// Wall-clock limit for a whole execution, in seconds
    #[serde(default)]
    pub execution_timeout_secs: Option<u64>,

    /// Cause reported on failed executions
    #[serde(default = "default_failure_cause")]
    pub failure_cause: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_interval_ms: default_initial_interval_ms(),
            backoff_rate: default_backoff_rate(),
            max_interval_ms: default_max_interval_ms(),
            retry_on: RetryOn::default(),
            execution_timeout_secs: None,
            failure_cause: default_failure_cause(),
        }
    }
}

impl WorkflowConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("workflow.max_attempts must be >= 1".to_string());
        }
        if self.max_attempts > 10 {
            return Err(format!(
                "workflow.max_attempts must be <= 10, got {}",
                self.max_attempts
            ));
        }
        if self.initial_interval_ms == 0 {
            return Err("workflow.initial_interval_ms must be > 0".to_string());
        }
        if !(self.backoff_rate > 1.0) || !self.backoff_rate.is_finite() {
            return Err(format!(
                "workflow.backoff_rate must be > 1, got {}",
                self.backoff_rate
            ));
        }
        if self.max_interval_ms < self.initial_interval_ms {
            return Err(format!(
                "workflow.max_interval_ms ({}) must be >= initial_interval_ms ({})",
                self.max_interval_ms, self.initial_interval_ms
            ));
        }
        if self.execution_timeout_secs == Some(0) {
            return Err("workflow.execution_timeout_secs must be > 0 when set".to_string());
        }
        if self.failure_cause.trim().is_empty() {
            return Err("workflow.failure_cause cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Terminal status notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Topic name stamped on every status event
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Optional webhook receiving the status event as JSON
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Webhook request timeout in seconds
    #[serde(default = "default_webhook_timeout_seconds")]
    pub webhook_timeout_seconds: u64,

    /// Capacity of the in-process broadcast channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            webhook_url: None,
            webhook_timeout_seconds: default_webhook_timeout_seconds(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl NotificationConfig {
    fn validate(&self) -> Result<(), String> {
        if self.topic.is_empty() {
            return Err("notification.topic cannot be empty".to_string());
        }
        if let Some(ref webhook) = self.webhook_url {
            Url::parse(webhook).map_err(|e| {
                format!("notification.webhook_url '{webhook}' is not a valid URL: {e}")
            })?;
        }
        if self.webhook_timeout_seconds == 0 {
            return Err("notification.webhook_timeout_seconds must be > 0".to_string());
        }
        if self.channel_capacity == 0 {
            return Err("notification.channel_capacity must be > 0".to_string());
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log file path
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,

    /// Maximum log file size in MB
    #[serde(default = "default_local_max_size_mb")]
    pub local_max_size_mb: usize,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "size"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_max_size_mb == 0 {
            return Err("logging.local_max_size_mb must be > 0".to_string());
        }

        Ok(())
    }

    /// Console-only logging, used before a configuration file is loaded
    pub fn console_only() -> Self {
        Self {
            local_enabled: false,
            local_path: String::new(),
            ..Self::default()
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
            local_max_size_mb: default_local_max_size_mb(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_max_results() -> u32 {
    100
}

fn default_pages_per_call() -> usize {
    50
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_throttle_retries() -> u32 {
    3
}

fn default_throttle_delay_ms() -> u64 {
    5_000
}

fn default_put_attempts() -> u32 {
    3
}

fn default_put_retry_delay_ms() -> u64 {
    5_000
}

fn default_object_prefix() -> String {
    "security-hub-finding-export".to_string()
}

fn default_state_path() -> String {
    "/var/lib/sechub-export/state".to_string()
}

fn default_counter_parameter() -> String {
    "/sechubexport/count".to_string()
}

fn default_lease_name() -> String {
    "sec_hub_finding_export".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_interval_ms() -> u64 {
    10_000
}

fn default_backoff_rate() -> f64 {
    2.0
}

fn default_max_interval_ms() -> u64 {
    3_600_000
}

fn default_failure_cause() -> String {
    "Security Hub Export Failed.".to_string()
}

fn default_topic() -> String {
    "Security_Hub_Export_Status".to_string()
}

fn default_webhook_timeout_seconds() -> u64 {
    10
}

fn default_channel_capacity() -> usize {
    16
}

fn default_local_path() -> String {
    "/var/log/sechub-export".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

fn default_local_max_size_mb() -> usize {
    100
}

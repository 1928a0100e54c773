//! Integration tests for configuration loading and validation
//!
//! Note: Tests that modify environment variables should be run with --test-threads=1
//! to avoid interference between tests.

use sechub_export::config::{
    load_config, RetryOn, DEFAULT_LEASE_TTL_SECS, LEASE_TTL_MARGIN_SECS,
};
use sechub_export::core::retry::RetryPolicy;
use secrecy::ExposeSecret;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::NamedTempFile;

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Helper function to clean up environment variables
fn cleanup_env_vars() {
    std::env::remove_var("SECHUB_EXPORT_APPLICATION_LOG_LEVEL");
    std::env::remove_var("SECHUB_EXPORT_SOURCE_ENDPOINT");
    std::env::remove_var("SECHUB_EXPORT_SOURCE_MAX_RESULTS");
    std::env::remove_var("SECHUB_EXPORT_WORKFLOW_MAX_ATTEMPTS");
    std::env::remove_var("SECHUB_EXPORT_WORKFLOW_RETRY_ON");
    std::env::remove_var("TEST_SECHUB_TOKEN");
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

const MINIMAL: &str = r#"
[source]
endpoint = "https://securityhub.us-east-1.amazonaws.com"

[storage]
path = "/data/findings"
"#;

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config(
        r#"
[application]
log_level = "debug"

[source]
endpoint = "https://securityhub.eu-west-1.amazonaws.com"
region = "eu-west-1"
api_token = "token-123"
max_results = 50
pages_per_call = 10
timeout_seconds = 20
lookback_days = 90
record_state = "ACTIVE"
workflow_status = ["NEW", "NOTIFIED"]

[storage]
path = "/data/findings"
object_prefix = "findings-"

[state]
path = "/data/state"
counter_parameter = "/custom/count"
lease_name = "custom_lease"
lease_ttl_secs = 3600

[workflow]
max_attempts = 3
initial_interval_ms = 500
backoff_rate = 1.5
retry_on = "transient"
execution_timeout_secs = 900
failure_cause = "Export broke."

[notification]
topic = "Custom_Topic"
webhook_url = "https://hooks.example.com/export"
webhook_timeout_seconds = 3
channel_capacity = 4

[logging]
local_enabled = false
local_path = "/tmp/logs"
local_rotation = "hourly"
local_max_size_mb = 10
"#,
    );

    let config = load_config(file.path()).unwrap();

    assert_eq!(config.application.log_level, "debug");
    assert_eq!(config.source.region, "eu-west-1");
    assert_eq!(
        config.source.api_token.as_ref().unwrap().expose_secret().as_ref(),
        "token-123"
    );
    assert_eq!(config.source.max_results, 50);
    assert_eq!(config.source.pages_per_call, 10);
    assert_eq!(config.source.lookback_days, Some(90));
    assert_eq!(config.source.workflow_status, vec!["NEW", "NOTIFIED"]);
    assert_eq!(config.storage.object_prefix, "findings-");
    assert_eq!(config.state.counter_parameter, "/custom/count");
    assert_eq!(config.state.lease_ttl_secs, Some(3600));
    assert_eq!(config.workflow.retry_on, RetryOn::Transient);
    assert_eq!(config.workflow.execution_timeout_secs, Some(900));
    assert_eq!(config.workflow.failure_cause, "Export broke.");
    assert_eq!(config.notification.topic, "Custom_Topic");
    assert_eq!(config.logging.local_rotation, "hourly");
}

#[test]
fn test_load_minimal_config_with_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config(MINIMAL);
    let config = load_config(file.path()).unwrap();

    assert_eq!(config.application.log_level, "info");
    assert_eq!(config.source.region, "us-east-1");
    assert!(config.source.api_token.is_none());
    assert_eq!(config.source.max_results, 100);
    assert_eq!(config.source.pages_per_call, 50);
    assert_eq!(config.storage.object_prefix, "security-hub-finding-export");
    assert_eq!(config.state.counter_parameter, "/sechubexport/count");
    assert_eq!(config.state.lease_name, "sec_hub_finding_export");
    assert_eq!(config.workflow.max_attempts, 5);
    assert_eq!(config.workflow.initial_interval_ms, 10_000);
    assert_eq!(config.workflow.backoff_rate, 2.0);
    assert_eq!(config.workflow.retry_on, RetryOn::All);
    assert_eq!(config.workflow.failure_cause, "Security Hub Export Failed.");
    assert_eq!(config.notification.topic, "Security_Hub_Export_Status");

    // Defaults reproduce the deployed retry policy
    let policy = RetryPolicy::from_config(&config.workflow).unwrap();
    assert_eq!(policy, RetryPolicy::deployed());
    assert_eq!(policy.total_backoff(), Duration::from_secs(150));

    // A lease never outlives a crashed holder indefinitely
    assert!(config.state.lease_ttl_secs.is_none());
    assert_eq!(config.lease_ttl_secs(), DEFAULT_LEASE_TTL_SECS);
}

#[test]
fn test_lease_ttl_follows_execution_timeout() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config(&format!(
        "{MINIMAL}\n[workflow]\nexecution_timeout_secs = 600\n"
    ));
    let config = load_config(file.path()).unwrap();
    assert_eq!(config.lease_ttl_secs(), 600 + LEASE_TTL_MARGIN_SECS);

    let file = write_config(&format!(
        "{MINIMAL}\n[state]\nlease_ttl_secs = 900\n\n[workflow]\nexecution_timeout_secs = 600\n"
    ));
    let config = load_config(file.path()).unwrap();
    assert_eq!(config.lease_ttl_secs(), 900);
}

#[test]
fn test_extreme_backoff_rate_loads_with_capped_waits() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config(&format!(
        "{MINIMAL}\n[workflow]\nmax_attempts = 3\nbackoff_rate = 1e20\nmax_interval_ms = 60000\n"
    ));
    let config = load_config(file.path()).unwrap();
    let policy = RetryPolicy::from_config(&config.workflow).unwrap();

    assert_eq!(policy.delay_for(2), Duration::from_secs(60));
    assert_eq!(policy.total_backoff(), Duration::from_secs(70));
}

#[test]
fn test_env_var_substitution() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("TEST_SECHUB_TOKEN", "substituted-token");

    let file = write_config(
        r#"
[source]
endpoint = "https://securityhub.us-east-1.amazonaws.com"
# api_token = "${NOT_SET_ANYWHERE}"
api_token = "${TEST_SECHUB_TOKEN}"

[storage]
path = "/data/findings"
"#,
    );

    let config = load_config(file.path()).unwrap();
    assert_eq!(
        config.source.api_token.as_ref().unwrap().expose_secret().as_ref(),
        "substituted-token"
    );

    cleanup_env_vars();
}

#[test]
fn test_missing_substitution_variable() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config(
        r#"
[source]
endpoint = "https://securityhub.us-east-1.amazonaws.com"
api_token = "${TEST_SECHUB_TOKEN}"

[storage]
path = "/data/findings"
"#,
    );

    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("TEST_SECHUB_TOKEN"));
}

#[test]
fn test_env_var_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("SECHUB_EXPORT_APPLICATION_LOG_LEVEL", "trace");
    std::env::set_var("SECHUB_EXPORT_SOURCE_MAX_RESULTS", "25");
    std::env::set_var("SECHUB_EXPORT_WORKFLOW_MAX_ATTEMPTS", "3");
    std::env::set_var("SECHUB_EXPORT_WORKFLOW_RETRY_ON", "transient");

    let file = write_config(MINIMAL);
    let config = load_config(file.path()).unwrap();

    assert_eq!(config.application.log_level, "trace");
    assert_eq!(config.source.max_results, 25);
    assert_eq!(config.workflow.max_attempts, 3);
    assert_eq!(config.workflow.retry_on, RetryOn::Transient);

    cleanup_env_vars();
}

#[test]
fn test_invalid_override_is_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("SECHUB_EXPORT_WORKFLOW_RETRY_ON", "sometimes");

    let file = write_config(MINIMAL);
    let result = load_config(file.path());

    cleanup_env_vars();
    assert!(result.is_err());
}

#[test]
fn test_invalid_config_validation() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    for (section, expected) in [
        ("[workflow]\nmax_attempts = 0\n", "max_attempts"),
        ("[workflow]\nbackoff_rate = 1.0\n", "backoff_rate"),
        ("[workflow]\nretry_on = \"never\"\n", "retry_on"),
        ("[state]\nlease_ttl_secs = 0\n", "lease_ttl_secs"),
        (
            "[state]\nlease_ttl_secs = 60\n\n[workflow]\nexecution_timeout_secs = 600\n",
            "lease_ttl_secs",
        ),
        (
            "[workflow]\ninitial_interval_ms = 5000\nmax_interval_ms = 1000\n",
            "max_interval_ms",
        ),
        ("[notification]\nwebhook_url = \"not a url\"\n", "webhook_url"),
        ("[logging]\nlocal_rotation = \"weekly\"\n", "local_rotation"),
    ] {
        let file = write_config(&format!("{MINIMAL}\n{section}"));
        let err = load_config(file.path()).unwrap_err().to_string();
        assert!(
            err.contains(expected),
            "expected error mentioning {expected}, got: {err}"
        );
    }
}

#[test]
fn test_invalid_source_endpoint() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config(
        r#"
[source]
endpoint = "ftp://securityhub.example.com"

[storage]
path = "/data/findings"
"#,
    );
    assert!(load_config(file.path()).is_err());
}

#[test]
fn test_missing_required_section() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config(
        r#"
[source]
endpoint = "https://securityhub.us-east-1.amazonaws.com"
"#,
    );
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse TOML"));
}

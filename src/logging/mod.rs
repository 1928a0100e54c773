//! Logging and observability
//!
//! Structured logging with:
//! - JSON-formatted file logs
//! - Configurable log levels
//! - Local file logging with rotation
//!
//! # Example
//!
//! ```no_run
//! use sechub_export::logging::init_logging;
//! use sechub_export::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, parse_log_level, LoggingGuard};

/// Log one completed fetch call of the pagination loop
///
/// # Example
///
/// ```no_run
/// use sechub_export::log_page_exported;
///
/// let has_more = true;
/// log_page_exported!("2f0c8f5e-4f0e-4d55-a9b5-6f1f3d6c3c1a", 3, 100, 300, has_more);
/// ```
#[macro_export]
macro_rules! log_page_exported {
    ($execution_id:expr, $call:expr, $items:expr, $total:expr, $has_more:expr) => {
        tracing::info!(
            execution_id = %$execution_id,
            call = $call,
            items = $items,
            total = $total,
            has_more = $has_more,
            "Findings page exported"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use sechub_export::log_retry_attempt;
///
/// log_retry_attempt!(2, 5, 20_000u64, "Connection timeout");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $delay_ms:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            delay_ms = $delay_ms,
            reason = %$reason,
            "Fetch failed, retrying with exponential backoff"
        );
    };
}

/// Log the terminal status of an execution
///
/// Successful executions log at info, everything else at error.
///
/// # Example
///
/// ```no_run
/// use sechub_export::log_terminal_status;
/// use sechub_export::core::export::TerminalOutcome;
///
/// log_terminal_status!("2f0c8f5e", TerminalOutcome::Succeeded, 18u64);
/// ```
#[macro_export]
macro_rules! log_terminal_status {
    ($execution_id:expr, $outcome:expr, $items:expr) => {
        if $outcome.is_success() {
            tracing::info!(
                execution_id = %$execution_id,
                status = %$outcome,
                items_exported = $items,
                "Export execution finished"
            );
        } else {
            tracing::error!(
                execution_id = %$execution_id,
                status = %$outcome,
                items_exported = $items,
                "Export execution finished"
            );
        }
    };
}

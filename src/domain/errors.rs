//! Domain error types
//!
//! This module defines the error hierarchy for the exporter.
//! All errors are domain-specific and don't expose third-party types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main exporter error type
///
/// This is the primary error type used throughout the crate.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Findings fetch errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Counter or lease store errors
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Status notification errors
    #[error("Notification error: {0}")]
    Notification(#[from] NotifyError),

    /// Another execution holds the workflow lease
    #[error("Lease '{lease}' is held by execution {holder}")]
    LeaseHeld {
        /// Lease name
        lease: String,
        /// Execution currently holding the lease
        holder: String,
    },

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Whether retrying an operation that failed this way can succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Throttling, timeouts, dropped connections, 5xx
    Transient,
    /// Authorization failures, malformed responses, bad requests
    Permanent,
}

/// Classification capability consulted by the retry policy
pub trait Classify {
    /// Returns the error class
    fn class(&self) -> ErrorClass;

    /// True when the error is worth retrying
    fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

/// Errors raised by a fetch task
///
/// Each variant keeps its classification so a retry policy can tell
/// transient infrastructure failures from hard failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The source throttled the request (429)
    #[error("Request throttled: {0}")]
    Throttled(String),

    /// Request timed out
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Failed to reach the source
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Server error (5xx)
    #[error("Server error: {status} - {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Authorization failed (401/403)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Client error (other 4xx)
    #[error("Client error: {status} - {message}")]
    Client {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Response could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Writing the findings batch to storage failed
    #[error("Storage write failed: {0}")]
    Storage(String),
}

impl Classify for FetchError {
    fn class(&self) -> ErrorClass {
        match self {
            FetchError::Throttled(_)
            | FetchError::Timeout(_)
            | FetchError::Connection(_)
            | FetchError::Server { .. } => ErrorClass::Transient,
            FetchError::Unauthorized(_)
            | FetchError::Client { .. }
            | FetchError::InvalidResponse(_)
            | FetchError::Storage(_) => ErrorClass::Permanent,
        }
    }
}

/// I/O failures may clear on their own; everything else needs a change
impl Classify for ExportError {
    fn class(&self) -> ErrorClass {
        match self {
            ExportError::Fetch(e) => e.class(),
            ExportError::Io(_) => ErrorClass::Transient,
            _ => ErrorClass::Permanent,
        }
    }
}

/// Counter and lease store errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    /// The named parameter does not exist
    #[error("Parameter not found: {0}")]
    NotFound(String),

    /// A compare-and-swap found a different value than expected
    #[error("Concurrent update on '{name}': expected {expected}, found {actual}")]
    Conflict {
        /// Parameter name
        name: String,
        /// Value the writer expected
        expected: u64,
        /// Value actually stored
        actual: u64,
    },

    /// Stored record could not be parsed
    #[error("Corrupt state record: {0}")]
    Corrupt(String),

    /// Underlying storage failure
    #[error("State storage I/O failed: {0}")]
    Io(String),
}

/// Status notification errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    /// The event could not be delivered
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// The endpoint rejected the event
    #[error("Endpoint rejected event: {status} - {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// The channel had nobody listening
    #[error("No subscribers attached to topic '{0}'")]
    NoSubscribers(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for ExportError {
    fn from(err: toml::de::Error) -> Self {
        ExportError::Configuration(format!("TOML parse error: {err}"))
    }
}

//! Domain identifier types with validation
//!
//! Newtype wrappers for the identifiers that flow through an export execution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier of one export execution
///
/// # Examples
///
/// ```
/// use sechub_export::domain::ids::ExecutionId;
/// use std::str::FromStr;
///
/// let id = ExecutionId::from_str("0b0f8c2e-8d6a-4e0e-9c4c-0f7f3b0d8f11").unwrap();
/// assert_eq!(id.to_string(), "0b0f8c2e-8d6a-4e0e-9c4c-0f7f3b0d8f11");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    /// Generates a fresh random execution ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExecutionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| format!("Invalid execution ID '{s}': {e}"))
    }
}

/// Opaque pagination token returned by the findings source
///
/// A cursor is never empty. An empty token coming off the wire means
/// "no more pages" and maps to `None` through [`Cursor::from_token`].
///
/// # Examples
///
/// ```
/// use sechub_export::domain::ids::Cursor;
///
/// assert!(Cursor::from_token(Some(String::new())).is_none());
/// assert_eq!(Cursor::from_token(Some("abc".into())).unwrap().as_str(), "abc");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Creates a cursor, rejecting empty tokens
    pub fn new(token: impl Into<String>) -> Result<Self, String> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err("Cursor cannot be empty".to_string());
        }
        Ok(Self(token))
    }

    /// Maps an optional wire token to an optional cursor, treating empty as absent
    pub fn from_token(token: Option<String>) -> Option<Self> {
        token.and_then(|t| Self::new(t).ok())
    }

    /// Returns the token as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Cursor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Cursor {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

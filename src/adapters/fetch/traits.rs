//! Fetch task contract
//!
//! A fetch task moves one chunk of findings from the source into storage
//! and reports how many items it handled and where to resume.

use crate::domain::{Cursor, ExecutionId, FetchError};
use async_trait::async_trait;

/// Input of one fetch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Execution issuing the call
    pub execution_id: ExecutionId,

    /// Where to resume; `None` starts from the beginning
    pub cursor: Option<Cursor>,
}

/// Output of one successful fetch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// Items written by this call
    pub items_processed: u64,

    /// Present when more data remains
    pub next_cursor: Option<Cursor>,
}

impl FetchResult {
    /// True when another call should follow
    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

/// One unit of export work invoked by the pagination loop
///
/// Implementations must be safe to retry: a failed call may be repeated
/// with the same request.
#[async_trait]
pub trait FetchTask: Send + Sync {
    /// Performs one call
    ///
    /// # Errors
    ///
    /// Returns a classified [`FetchError`] so the retry policy can decide
    /// whether another attempt is worthwhile.
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResult, FetchError>;
}

/// One page returned by a findings source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindingsPage {
    /// Raw finding documents
    pub findings: Vec<serde_json::Value>,

    /// Token for the following page, if any
    pub next_token: Option<Cursor>,
}

/// Paged read access to security findings
#[async_trait]
pub trait FindingsSource: Send + Sync {
    /// Reads one page of at most `max_results` findings starting at `cursor`
    ///
    /// # Errors
    ///
    /// Returns a classified [`FetchError`].
    async fn get_findings(
        &self,
        cursor: Option<&Cursor>,
        max_results: u32,
    ) -> Result<FindingsPage, FetchError>;
}

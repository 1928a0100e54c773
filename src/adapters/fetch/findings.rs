//! Findings export task
//!
//! One call pulls up to `pages_per_call` pages from a [`FindingsSource`],
//! consolidates them into a single JSON array and writes it to a
//! [`FindingsSink`]. The batch is written only after every page was read,
//! so retrying a failed call never leaves a duplicate object behind.
//!
//! Throttling is absorbed inside the call: a throttled page is requested
//! again after `throttle_delay`, up to `throttle_retries` times, keeping the
//! pages already read. Transient sink failures are retried the same way, up
//! to `put_attempts` writes in total. Anything else fails the call and is
//! left to the workflow's retry policy.

use crate::adapters::fetch::traits::{
    FetchRequest, FetchResult, FetchTask, FindingsPage, FindingsSource,
};
use crate::adapters::storage::FindingsSink;
use crate::config::{SourceConfig, StorageConfig};
use crate::domain::{Classify, Cursor, ExecutionId, FetchError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Throttled page requests repeated within one call
pub const DEFAULT_THROTTLE_RETRIES: u32 = 3;
/// Pause before repeating a throttled page request
pub const DEFAULT_THROTTLE_DELAY: Duration = Duration::from_secs(5);
/// Writes attempted per batch when the sink fails transiently
pub const DEFAULT_PUT_ATTEMPTS: u32 = 3;
/// Pause between batch write attempts
pub const DEFAULT_PUT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Builds the object key for a batch written at `now`
///
/// Format: `YYYY/MM/DD/<prefix><uuid>.json`
pub fn object_key(prefix: &str, now: DateTime<Utc>, id: Uuid) -> String {
    format!("{}/{}{}.json", now.format("%Y/%m/%d"), prefix, id)
}

/// Pages findings from a source into a sink
pub struct FindingsFetchTask {
    source: Arc<dyn FindingsSource>,
    sink: Arc<dyn FindingsSink>,
    pages_per_call: usize,
    max_results: u32,
    object_prefix: String,
    throttle_retries: u32,
    throttle_delay: Duration,
    put_attempts: u32,
    put_retry_delay: Duration,
}

impl FindingsFetchTask {
    /// Creates a task with explicit paging limits
    pub fn new(
        source: Arc<dyn FindingsSource>,
        sink: Arc<dyn FindingsSink>,
        pages_per_call: usize,
        max_results: u32,
        object_prefix: impl Into<String>,
    ) -> Self {
        Self {
            source,
            sink,
            pages_per_call: pages_per_call.max(1),
            max_results,
            object_prefix: object_prefix.into(),
            throttle_retries: DEFAULT_THROTTLE_RETRIES,
            throttle_delay: DEFAULT_THROTTLE_DELAY,
            put_attempts: DEFAULT_PUT_ATTEMPTS,
            put_retry_delay: DEFAULT_PUT_RETRY_DELAY,
        }
    }

    /// Sets how often a throttled page is requested again, and the pause
    pub fn with_throttle_retry(mut self, retries: u32, delay: Duration) -> Self {
        self.throttle_retries = retries;
        self.throttle_delay = delay;
        self
    }

    /// Sets the write attempts per batch (at least 1), and the pause
    pub fn with_put_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.put_attempts = attempts.max(1);
        self.put_retry_delay = delay;
        self
    }

    /// Creates a task using the `[source]` and `[storage]` settings
    pub fn from_config(
        source: Arc<dyn FindingsSource>,
        sink: Arc<dyn FindingsSink>,
        source_config: &SourceConfig,
        storage_config: &StorageConfig,
    ) -> Self {
        Self::new(
            source,
            sink,
            source_config.pages_per_call,
            source_config.max_results,
            storage_config.object_prefix.clone(),
        )
        .with_throttle_retry(
            source_config.throttle_retries,
            Duration::from_millis(source_config.throttle_delay_ms),
        )
        .with_put_retry(
            storage_config.put_attempts,
            Duration::from_millis(storage_config.put_retry_delay_ms),
        )
    }

    async fn get_page(
        &self,
        execution_id: ExecutionId,
        cursor: Option<&Cursor>,
    ) -> Result<FindingsPage, FetchError> {
        let mut throttled = 0;
        loop {
            match self.source.get_findings(cursor, self.max_results).await {
                Err(FetchError::Throttled(reason)) if throttled < self.throttle_retries => {
                    throttled += 1;
                    tracing::warn!(
                        execution_id = %execution_id,
                        attempt = throttled,
                        max_retries = self.throttle_retries,
                        delay_ms = self.throttle_delay.as_millis() as u64,
                        reason = %reason,
                        "Source throttled, requesting the page again"
                    );
                    tokio::time::sleep(self.throttle_delay).await;
                }
                outcome => return outcome,
            }
        }
    }

    async fn put_batch(
        &self,
        execution_id: ExecutionId,
        key: &str,
        body: Vec<u8>,
    ) -> Result<(), FetchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.sink.put_object(key, body.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.put_attempts => {
                    tracing::warn!(
                        execution_id = %execution_id,
                        attempt,
                        max_attempts = self.put_attempts,
                        delay_ms = self.put_retry_delay.as_millis() as u64,
                        key = %key,
                        error = %e,
                        "Batch write failed, retrying"
                    );
                    tokio::time::sleep(self.put_retry_delay).await;
                }
                Err(e) => return Err(FetchError::Storage(e.to_string())),
            }
        }
    }
}

#[async_trait]
impl FetchTask for FindingsFetchTask {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResult, FetchError> {
        let mut cursor = request.cursor;
        let mut findings = Vec::new();
        let mut pages = 0usize;

        while pages < self.pages_per_call {
            let page = self.get_page(request.execution_id, cursor.as_ref()).await?;
            pages += 1;
            findings.extend(page.findings);
            cursor = page.next_token;

            if cursor.is_none() {
                tracing::debug!(
                    execution_id = %request.execution_id,
                    pages,
                    "No next token returned, source exhausted"
                );
                break;
            }
        }

        let items_processed = findings.len() as u64;

        if findings.is_empty() {
            tracing::debug!(
                execution_id = %request.execution_id,
                pages,
                "No findings in this call, nothing written"
            );
        } else {
            let key = object_key(&self.object_prefix, Utc::now(), Uuid::new_v4());
            let body = serde_json::to_vec(&findings)
                .map_err(|e| FetchError::Storage(format!("Failed to encode findings: {e}")))?;

            tracing::info!(
                execution_id = %request.execution_id,
                findings = items_processed,
                location = %self.sink.location(),
                key = %key,
                "Exporting findings batch"
            );

            self.put_batch(request.execution_id, &key, body).await?;
        }

        Ok(FetchResult {
            items_processed,
            next_cursor: cursor,
        })
    }
}

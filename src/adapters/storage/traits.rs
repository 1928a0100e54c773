//! Object storage abstraction for exported findings

use crate::domain::Result;
use async_trait::async_trait;

/// Destination for consolidated findings batches
///
/// Keys are `/`-separated relative paths such as
/// `2025/01/31/security-hub-finding-export<uuid>.json`.
#[async_trait]
pub trait FindingsSink: Send + Sync {
    /// Writes `body` under `key`, replacing any existing object
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the write fails.
    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<()>;

    /// Human-readable location of the sink, used in logs
    fn location(&self) -> String;
}

//! Filesystem-backed findings sink
//!
//! Objects are written to a temporary sibling first and renamed into place,
//! so a reader never sees a partially written batch.

use crate::adapters::storage::traits::FindingsSink;
use crate::domain::{ExportError, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Writes objects as files under a root directory
#[derive(Debug, Clone)]
pub struct FileSystemSink {
    root: PathBuf,
}

impl FileSystemSink {
    /// Creates a sink rooted at `root`; the directory is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            return Err(ExportError::Validation(format!(
                "Invalid object key '{key}'"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FindingsSink for FileSystemSink {
    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let path = self.resolve(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        tokio::fs::write(&temp_path, &body).await?;
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::debug!(path = %path.display(), bytes = body.len(), "Object written");
        Ok(())
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

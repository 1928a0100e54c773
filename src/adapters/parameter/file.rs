//! File-backed counter and lease stores
//!
//! Each parameter is one JSON file under the state directory, named after
//! the parameter with `/` replaced by `__` (so `/sechubexport/count` lives
//! in `sechubexport__count.json`). Writes go to a temporary file that is
//! synced and renamed into place. A lease is written to a temporary file
//! first and then hard-linked to its final name; the link fails if the
//! lease exists, so two processes racing for it cannot both win and a crash
//! never leaves a half-written lease behind. An unreadable lease file is
//! treated as stale.

use crate::core::state::counter::{CounterRecord, CounterStore, StateResult};
use crate::core::state::lease::{LeaseAcquisition, LeaseRecord, LeaseStore};
use crate::domain::{ExecutionId, StateError};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

fn file_stem(name: &str) -> String {
    let stem = name.trim_matches('/').replace('/', "__");
    if stem.is_empty() {
        "parameter".to_string()
    } else {
        stem
    }
}

fn io_error(path: &Path, err: std::io::Error) -> StateError {
    StateError::Io(format!("{}: {}", path.display(), err))
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> StateResult<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StateError::Corrupt(format!("{}: {}", path.display(), e))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error(path, e)),
    }
}

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> StateResult<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| StateError::Corrupt(format!("{}: {}", path.display(), e)))?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(parent, e))?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    write_synced(&temp_path, &bytes).await?;
    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|e| io_error(path, e))
}

async fn write_synced(path: &Path, bytes: &[u8]) -> StateResult<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| io_error(path, e))?;
    file.write_all(bytes).await.map_err(|e| io_error(path, e))?;
    file.sync_all().await.map_err(|e| io_error(path, e))
}

async fn remove_if_present(path: &Path) -> StateResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(path, e)),
    }
}

/// Counter parameter stored as a JSON file
#[derive(Debug)]
pub struct FileCounterStore {
    name: String,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCounterStore {
    /// Creates a store for parameter `name` under `dir`
    pub fn new(dir: impl AsRef<Path>, name: impl Into<String>) -> Self {
        let name = name.into();
        let path = dir.as_ref().join(format!("{}.json", file_stem(&name)));
        Self {
            name,
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// File backing the parameter
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_record(&self) -> StateResult<CounterRecord> {
        let record = read_json::<CounterRecord>(&self.path)
            .await?
            .unwrap_or_else(|| CounterRecord::initial(self.name.clone()));
        if record.name != self.name {
            return Err(StateError::Corrupt(format!(
                "{} holds parameter '{}', expected '{}'",
                self.path.display(),
                record.name,
                self.name
            )));
        }
        Ok(record)
    }
}

#[async_trait]
impl CounterStore for FileCounterStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> StateResult<CounterRecord> {
        self.read_record().await
    }

    async fn set(&self, value: u64) -> StateResult<()> {
        let _guard = self.write_lock.lock().await;
        let record = self.read_record().await?;
        write_json_atomic(&self.path, &record.next(value)).await
    }

    async fn compare_and_swap(&self, expected: u64, new: u64) -> StateResult<bool> {
        let _guard = self.write_lock.lock().await;
        let record = self.read_record().await?;
        if record.value != expected {
            return Ok(false);
        }
        write_json_atomic(&self.path, &record.next(new)).await?;
        Ok(true)
    }
}

/// Execution leases stored as `<name>.lease` JSON files
#[derive(Debug)]
pub struct FileLeaseStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileLeaseStore {
    /// Creates a store keeping lease files under `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    fn lease_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.lease", file_stem(name)))
    }

    async fn create_exclusive(&self, path: &Path, record: &LeaseRecord) -> StateResult<bool> {
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|e| StateError::Corrupt(format!("{}: {}", path.display(), e)))?;

        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(format!(".{}.tmp", record.holder));
        let temp_path = PathBuf::from(temp_name);

        write_synced(&temp_path, &bytes).await?;
        let linked = tokio::fs::hard_link(&temp_path, path).await;
        remove_if_present(&temp_path).await?;

        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(io_error(path, e)),
        }
    }

    /// Reads the lease at `path`, mapping an unreadable file to `Stale`
    async fn read_lease(&self, path: &Path) -> StateResult<StoredLease> {
        match read_json::<LeaseRecord>(path).await {
            Ok(Some(record)) => Ok(StoredLease::Record(record)),
            Ok(None) => Ok(StoredLease::Missing),
            Err(StateError::Corrupt(reason)) => Ok(StoredLease::Stale(reason)),
            Err(e) => Err(e),
        }
    }
}

enum StoredLease {
    Missing,
    Record(LeaseRecord),
    Stale(String),
}

#[async_trait]
impl LeaseStore for FileLeaseStore {
    async fn try_acquire(
        &self,
        name: &str,
        holder: ExecutionId,
        ttl: Option<Duration>,
    ) -> StateResult<LeaseAcquisition> {
        let _guard = self.lock.lock().await;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;

        let path = self.lease_path(name);

        // One retry covers removing an expired lease and claiming it
        for _ in 0..2 {
            let record = LeaseRecord::grant(name, holder, ttl);
            if self.create_exclusive(&path, &record).await? {
                return Ok(LeaseAcquisition::Acquired(record));
            }

            match self.read_lease(&path).await? {
                StoredLease::Record(existing) if !existing.is_expired_at(Utc::now()) => {
                    return Ok(LeaseAcquisition::Held(existing));
                }
                StoredLease::Record(existing) => {
                    tracing::warn!(
                        lease = %name,
                        previous_holder = %existing.holder,
                        "Taking over expired lease"
                    );
                    remove_if_present(&path).await?;
                }
                StoredLease::Stale(reason) => {
                    tracing::warn!(
                        lease = %name,
                        reason = %reason,
                        "Removing unreadable lease file"
                    );
                    remove_if_present(&path).await?;
                }
                // Released between our create and read
                StoredLease::Missing => {}
            }
        }

        match self.read_lease(&path).await? {
            StoredLease::Record(existing) => Ok(LeaseAcquisition::Held(existing)),
            _ => Err(StateError::Io(format!(
                "Could not claim lease '{name}' at {}",
                path.display()
            ))),
        }
    }

    async fn release(&self, name: &str, holder: ExecutionId) -> StateResult<bool> {
        let _guard = self.lock.lock().await;
        let path = self.lease_path(name);

        match self.read_lease(&path).await? {
            StoredLease::Record(existing) if existing.holder == holder => {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| io_error(&path, e))?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn force_release(&self, name: &str) -> StateResult<Option<LeaseRecord>> {
        let _guard = self.lock.lock().await;
        let path = self.lease_path(name);

        let previous = match self.read_lease(&path).await? {
            StoredLease::Record(record) => Some(record),
            StoredLease::Stale(_) | StoredLease::Missing => None,
        };
        remove_if_present(&path).await?;
        Ok(previous)
    }

    async fn current(&self, name: &str) -> StateResult<Option<LeaseRecord>> {
        read_json(&self.lease_path(name)).await
    }
}

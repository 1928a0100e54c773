//! Durable running count of exported findings
//!
//! The counter is a single named `u64` parameter, starting at 0. The
//! pagination loop is its only writer and updates it with a
//! compare-and-swap against the value it read immediately before, so a
//! concurrent writer surfaces as [`StateError::Conflict`] instead of a lost
//! update.

use crate::domain::StateError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Result type for state stores
pub type StateResult<T> = std::result::Result<T, StateError>;

/// Persisted form of the counter parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    /// Parameter name, e.g. `/sechubexport/count`
    pub name: String,
    /// Current value
    pub value: u64,
    /// Incremented on every write
    pub version: u64,
    /// Time of the last write; `None` until first written
    pub updated_at: Option<DateTime<Utc>>,
}

impl CounterRecord {
    /// A never-written parameter
    pub fn initial(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: 0,
            version: 0,
            updated_at: None,
        }
    }

    /// Returns the record after writing `value`
    pub fn next(&self, value: u64) -> Self {
        Self {
            name: self.name.clone(),
            value,
            version: self.version + 1,
            updated_at: Some(Utc::now()),
        }
    }
}

/// Storage for the counter parameter
///
/// A parameter that was never written reads as 0.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Parameter name
    fn name(&self) -> &str;

    /// Reads the full record
    async fn load(&self) -> StateResult<CounterRecord>;

    /// Reads the current value
    async fn get(&self) -> StateResult<u64> {
        Ok(self.load().await?.value)
    }

    /// Unconditionally overwrites the value
    async fn set(&self, value: u64) -> StateResult<()>;

    /// Writes `new` only if the stored value equals `expected`
    ///
    /// Returns `false` without writing when the values differ.
    async fn compare_and_swap(&self, expected: u64, new: u64) -> StateResult<bool>;
}

/// Process-local counter store
#[derive(Debug)]
pub struct InMemoryCounterStore {
    name: String,
    record: Mutex<CounterRecord>,
}

impl InMemoryCounterStore {
    /// Creates a store whose parameter reads as 0
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            record: Mutex::new(CounterRecord::initial(name.clone())),
            name,
        }
    }

    /// Creates a store seeded with `value`
    pub fn with_value(name: impl Into<String>, value: u64) -> Self {
        let name = name.into();
        let record = CounterRecord::initial(name.clone()).next(value);
        Self {
            name,
            record: Mutex::new(record),
        }
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> StateResult<CounterRecord> {
        Ok(self.record.lock().await.clone())
    }

    async fn set(&self, value: u64) -> StateResult<()> {
        let mut record = self.record.lock().await;
        *record = record.next(value);
        Ok(())
    }

    async fn compare_and_swap(&self, expected: u64, new: u64) -> StateResult<bool> {
        let mut record = self.record.lock().await;
        if record.value != expected {
            return Ok(false);
        }
        *record = record.next(new);
        Ok(true)
    }
}

/// Adds exported items to a [`CounterStore`]
#[derive(Clone)]
pub struct ProgressCounter {
    store: Arc<dyn CounterStore>,
}

impl ProgressCounter {
    /// Wraps a store
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Current value of the parameter
    pub async fn current(&self) -> StateResult<u64> {
        self.store.get().await
    }

    /// Adds `items` with a read-then-compare-and-swap
    ///
    /// Returns the new value. A zero increment is still a read, never a
    /// write, so it leaves the record untouched.
    ///
    /// # Errors
    ///
    /// [`StateError::Conflict`] when the value changed between the read and
    /// the swap, or the store error.
    pub async fn add(&self, items: u64) -> StateResult<u64> {
        let previous = self.store.get().await?;
        if items == 0 {
            return Ok(previous);
        }

        let updated = previous.checked_add(items).ok_or_else(|| {
            StateError::Corrupt(format!("counter overflow adding {items} to {previous}"))
        })?;

        if self.store.compare_and_swap(previous, updated).await? {
            tracing::debug!(
                parameter = %self.store.name(),
                previous,
                updated,
                "Counter updated"
            );
            return Ok(updated);
        }

        let actual = self.store.get().await?;
        Err(StateError::Conflict {
            name: self.store.name().to_string(),
            expected: previous,
            actual,
        })
    }
}

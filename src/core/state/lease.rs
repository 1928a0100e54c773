//! Execution lease
//!
//! At most one execution of a workflow runs at a time. The driver takes the
//! lease named after the workflow before the loop starts and gives it back
//! once the execution is terminal. A lease may carry a time-to-live; an
//! expired lease can be taken over by a new execution.

use crate::core::state::counter::StateResult;
use crate::domain::ExecutionId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// A granted lease
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    /// Lease name (the workflow name)
    pub name: String,
    /// Execution holding the lease
    pub holder: ExecutionId,
    /// When the lease was granted
    pub acquired_at: DateTime<Utc>,
    /// When the lease lapses; `None` means held until released
    pub expires_at: Option<DateTime<Utc>>,
}

impl LeaseRecord {
    /// Creates a record granted now
    pub fn grant(name: impl Into<String>, holder: ExecutionId, ttl: Option<Duration>) -> Self {
        let acquired_at = Utc::now();
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| acquired_at + ttl);
        Self {
            name: name.into(),
            holder,
            acquired_at,
            expires_at,
        }
    }

    /// True once the TTL has passed
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| now >= expires)
    }
}

/// Result of an acquisition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseAcquisition {
    /// The caller now holds the lease
    Acquired(LeaseRecord),
    /// Another execution holds a live lease
    Held(LeaseRecord),
}

/// Storage for execution leases
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Grants `name` to `holder` unless another live lease exists
    ///
    /// An expired lease is replaced.
    async fn try_acquire(
        &self,
        name: &str,
        holder: ExecutionId,
        ttl: Option<Duration>,
    ) -> StateResult<LeaseAcquisition>;

    /// Removes the lease if `holder` still owns it
    ///
    /// Returns `false` when the lease was missing or owned by someone else.
    async fn release(&self, name: &str, holder: ExecutionId) -> StateResult<bool>;

    /// Removes the lease whoever holds it, returning the removed record
    ///
    /// Used by operators to clear the lease of an execution that died.
    async fn force_release(&self, name: &str) -> StateResult<Option<LeaseRecord>>;

    /// Reads the current lease, live or expired
    async fn current(&self, name: &str) -> StateResult<Option<LeaseRecord>>;
}

/// Process-local lease store
#[derive(Debug, Default)]
pub struct InMemoryLeaseStore {
    leases: Mutex<HashMap<String, LeaseRecord>>,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn try_acquire(
        &self,
        name: &str,
        holder: ExecutionId,
        ttl: Option<Duration>,
    ) -> StateResult<LeaseAcquisition> {
        let mut leases = self.leases.lock().await;
        if let Some(existing) = leases.get(name) {
            if !existing.is_expired_at(Utc::now()) {
                return Ok(LeaseAcquisition::Held(existing.clone()));
            }
            tracing::warn!(
                lease = %name,
                previous_holder = %existing.holder,
                "Taking over expired lease"
            );
        }

        let record = LeaseRecord::grant(name, holder, ttl);
        leases.insert(name.to_string(), record.clone());
        Ok(LeaseAcquisition::Acquired(record))
    }

    async fn release(&self, name: &str, holder: ExecutionId) -> StateResult<bool> {
        let mut leases = self.leases.lock().await;
        match leases.get(name) {
            Some(existing) if existing.holder == holder => {
                leases.remove(name);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn force_release(&self, name: &str) -> StateResult<Option<LeaseRecord>> {
        Ok(self.leases.lock().await.remove(name))
    }

    async fn current(&self, name: &str) -> StateResult<Option<LeaseRecord>> {
        Ok(self.leases.lock().await.get(name).cloned())
    }
}

/// A lease held by a running execution
///
/// Must be given back with [`ExecutionLease::release`]; a lease that is
/// never released blocks later executions until its TTL passes.
pub struct ExecutionLease {
    store: Arc<dyn LeaseStore>,
    record: LeaseRecord,
}

impl std::fmt::Debug for ExecutionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionLease")
            .field("record", &self.record)
            .finish()
    }
}

impl ExecutionLease {
    /// Acquires `name` for `holder`
    ///
    /// # Errors
    ///
    /// `Ok(Err(record))` carries the live lease held by another execution;
    /// the outer error is a store failure.
    pub async fn acquire(
        store: Arc<dyn LeaseStore>,
        name: &str,
        holder: ExecutionId,
        ttl: Option<Duration>,
    ) -> StateResult<std::result::Result<Self, LeaseRecord>> {
        match store.try_acquire(name, holder, ttl).await? {
            LeaseAcquisition::Acquired(record) => {
                tracing::debug!(lease = %name, holder = %holder, "Lease acquired");
                Ok(Ok(Self { store, record }))
            }
            LeaseAcquisition::Held(record) => Ok(Err(record)),
        }
    }

    /// The granted record
    pub fn record(&self) -> &LeaseRecord {
        &self.record
    }

    /// Gives the lease back
    ///
    /// A lease that was taken over after expiring is logged, not an error.
    pub async fn release(self) -> StateResult<()> {
        let released = self
            .store
            .release(&self.record.name, self.record.holder)
            .await?;
        if released {
            tracing::debug!(lease = %self.record.name, "Lease released");
        } else {
            tracing::warn!(
                lease = %self.record.name,
                holder = %self.record.holder,
                "Lease was no longer held at release"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEASE: &str = "sec_hub_finding_export";

    #[tokio::test]
    async fn test_second_acquire_is_held() {
        let store = InMemoryLeaseStore::new();
        let first = ExecutionId::new();
        let second = ExecutionId::new();

        assert!(matches!(
            store.try_acquire(LEASE, first, None).await.unwrap(),
            LeaseAcquisition::Acquired(_)
        ));
        match store.try_acquire(LEASE, second, None).await.unwrap() {
            LeaseAcquisition::Held(record) => assert_eq!(record.holder, first),
            other => panic!("expected held lease, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_release_frees_lease() {
        let store = InMemoryLeaseStore::new();
        let first = ExecutionId::new();

        store.try_acquire(LEASE, first, None).await.unwrap();
        assert!(store.release(LEASE, first).await.unwrap());
        assert!(store.current(LEASE).await.unwrap().is_none());

        assert!(matches!(
            store.try_acquire(LEASE, ExecutionId::new(), None).await.unwrap(),
            LeaseAcquisition::Acquired(_)
        ));
    }

    #[tokio::test]
    async fn test_release_by_non_holder_is_ignored() {
        let store = InMemoryLeaseStore::new();
        let first = ExecutionId::new();

        store.try_acquire(LEASE, first, None).await.unwrap();
        assert!(!store.release(LEASE, ExecutionId::new()).await.unwrap());
        assert!(store.current(LEASE).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_lease_is_taken_over() {
        let store = InMemoryLeaseStore::new();
        let first = ExecutionId::new();
        let second = ExecutionId::new();

        store
            .try_acquire(LEASE, first, Some(Duration::from_millis(1)))
            .await
            .unwrap();
        std::thread::sleep(Duration::from_millis(5));

        match store.try_acquire(LEASE, second, None).await.unwrap() {
            LeaseAcquisition::Acquired(record) => assert_eq!(record.holder, second),
            other => panic!("expected takeover, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execution_lease_round_trip() {
        let store: Arc<dyn LeaseStore> = Arc::new(InMemoryLeaseStore::new());
        let holder = ExecutionId::new();

        let lease = ExecutionLease::acquire(store.clone(), LEASE, holder, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lease.record().holder, holder);

        let blocked = ExecutionLease::acquire(store.clone(), LEASE, ExecutionId::new(), None)
            .await
            .unwrap();
        assert_eq!(blocked.unwrap_err().holder, holder);

        lease.release().await.unwrap();
        assert!(store.current(LEASE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_force_release_ignores_holder() {
        let store = InMemoryLeaseStore::new();
        let holder = ExecutionId::new();

        store.try_acquire(LEASE, holder, None).await.unwrap();
        assert_eq!(store.force_release(LEASE).await.unwrap().unwrap().holder, holder);
        assert!(store.force_release(LEASE).await.unwrap().is_none());
        assert!(!store.release(LEASE, holder).await.unwrap());
    }

    #[test]
    fn test_grant_without_ttl_never_expires() {
        let record = LeaseRecord::grant(LEASE, ExecutionId::new(), None);
        assert!(record.expires_at.is_none());
        assert!(!record.is_expired_at(Utc::now() + chrono::Duration::days(365)));
    }
}

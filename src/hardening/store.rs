//! Counter store seam and the two typed stores built on it.
//!
//! Flow Overview:
//! 1) [`CounterStore`] is a plain key-value cache keyed by namespace and user.
//! 2) [`ResetFlags`] reads the `ForcePasswordReset` namespace as a boolean.
//! 3) [`FailedLogins`] reads the `FailedLogins` namespace as a counter.
//!
//! `increment` defaults to read-modify-write, which can under-count when two
//! requests for the same user race. Stores with an atomic primitive override
//! it; [`MemoryStore`] increments under its lock.

use async_trait::async_trait;
use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, info_span};

use super::directory::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    ForcePasswordReset,
    FailedLogins,
}

impl Namespace {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ForcePasswordReset => "ForcePasswordReset",
            Self::FailedLogins => "FailedLogins",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn get(&self, namespace: Namespace, key: UserId) -> Result<Option<u64>, StoreError>;

    async fn set(&self, namespace: Namespace, key: UserId, value: u64) -> Result<(), StoreError>;

    /// Add one to the stored value (absent counts as 0) and return the result.
    async fn increment(&self, namespace: Namespace, key: UserId) -> Result<u64, StoreError> {
        let next = self.get(namespace, key).await?.unwrap_or(0).saturating_add(1);
        self.set(namespace, key, next).await?;
        Ok(next)
    }
}

/// Users who must change their password before using the backend.
#[derive(Clone)]
pub struct ResetFlags {
    store: Arc<dyn CounterStore>,
}

impl ResetFlags {
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// # Errors
    /// Returns `StoreError` if the backing store cannot be read.
    pub async fn is_flagged(&self, user: UserId) -> Result<bool, StoreError> {
        let span = info_span!("cache.get", cache.namespace = Namespace::ForcePasswordReset.as_str());
        let value = self
            .store
            .get(Namespace::ForcePasswordReset, user)
            .instrument(span)
            .await?;
        Ok(value.is_some_and(|v| v != 0))
    }

    /// # Errors
    /// Returns `StoreError` if the backing store cannot be written.
    pub async fn flag(&self, user: UserId) -> Result<(), StoreError> {
        self.store.set(Namespace::ForcePasswordReset, user, 1).await
    }
}

/// Consecutive failed logins per user.
#[derive(Clone)]
pub struct FailedLogins {
    store: Arc<dyn CounterStore>,
}

impl FailedLogins {
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// # Errors
    /// Returns `StoreError` if the backing store cannot be read.
    pub async fn count(&self, user: UserId) -> Result<u64, StoreError> {
        Ok(self
            .store
            .get(Namespace::FailedLogins, user)
            .await?
            .unwrap_or(0))
    }

    /// Count one more failure and return the new total.
    ///
    /// # Errors
    /// Returns `StoreError` if the backing store cannot be updated.
    pub async fn record_failure(&self, user: UserId) -> Result<u64, StoreError> {
        let span = info_span!("cache.increment", cache.namespace = Namespace::FailedLogins.as_str());
        self.store
            .increment(Namespace::FailedLogins, user)
            .instrument(span)
            .await
    }

    /// # Errors
    /// Returns `StoreError` if the backing store cannot be written.
    pub async fn reset(&self, user: UserId) -> Result<(), StoreError> {
        let span = info_span!("cache.set", cache.namespace = Namespace::FailedLogins.as_str());
        self.store
            .set(Namespace::FailedLogins, user, 0)
            .instrument(span)
            .await
    }
}

#[derive(Debug)]
struct Slot {
    value: u64,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Cache held in process memory with an optional lifetime per namespace.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<(Namespace, UserId), Slot>>,
    lifetimes: HashMap<Namespace, Duration>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries written to `namespace` read as absent once `lifetime` elapses.
    #[must_use]
    pub fn with_lifetime(mut self, namespace: Namespace, lifetime: Duration) -> Self {
        self.lifetimes.insert(namespace, lifetime);
        self
    }

    /// Number of entries, live or expired, currently held.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }

    fn slot(&self, namespace: Namespace, value: u64, now: Instant) -> Slot {
        Slot {
            value,
            expires_at: self
                .lifetimes
                .get(&namespace)
                .and_then(|lifetime| now.checked_add(*lifetime)),
        }
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn get(&self, namespace: Namespace, key: UserId) -> Result<Option<u64>, StoreError> {
        let now = Instant::now();
        let mut slots = self.slots.lock().await;

        let lookup = slots
            .get(&(namespace, key))
            .map(|slot| slot.is_live(now).then_some(slot.value));

        match lookup {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                debug!(%namespace, user = %key, "cache entry expired");
                slots.remove(&(namespace, key));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, namespace: Namespace, key: UserId, value: u64) -> Result<(), StoreError> {
        let slot = self.slot(namespace, value, Instant::now());
        self.slots.lock().await.insert((namespace, key), slot);
        Ok(())
    }

    async fn increment(&self, namespace: Namespace, key: UserId) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut slots = self.slots.lock().await;

        let current = slots
            .get(&(namespace, key))
            .filter(|slot| slot.is_live(now))
            .map_or(0, |slot| slot.value);
        let next = current.saturating_add(1);

        slots.insert((namespace, key), self.slot(namespace, next, now));

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Only implements get/set so the default `increment` is exercised.
    #[derive(Default)]
    struct PlainStore {
        values: StdMutex<HashMap<(Namespace, UserId), u64>>,
    }

    #[async_trait]
    impl CounterStore for PlainStore {
        async fn get(&self, namespace: Namespace, key: UserId) -> Result<Option<u64>, StoreError> {
            let values = self
                .values
                .lock()
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            Ok(values.get(&(namespace, key)).copied())
        }

        async fn set(&self, namespace: Namespace, key: UserId, value: u64) -> Result<(), StoreError> {
            let mut values = self
                .values
                .lock()
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            values.insert((namespace, key), value);
            Ok(())
        }
    }

    #[test]
    fn namespace_names() {
        assert_eq!(Namespace::ForcePasswordReset.to_string(), "ForcePasswordReset");
        assert_eq!(Namespace::FailedLogins.to_string(), "FailedLogins");
    }

    #[tokio::test]
    async fn default_increment_reads_and_writes() {
        let store = PlainStore::default();
        let user = UserId::new();

        assert_eq!(store.increment(Namespace::FailedLogins, user).await.unwrap(), 1);
        assert_eq!(store.increment(Namespace::FailedLogins, user).await.unwrap(), 2);
        assert_eq!(store.get(Namespace::FailedLogins, user).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn namespaces_are_independent() {
        let store: Arc<dyn CounterStore> = Arc::new(MemoryStore::new());
        let flags = ResetFlags::new(store.clone());
        let failures = FailedLogins::new(store);
        let user = UserId::new();

        failures.record_failure(user).await.unwrap();
        assert!(!flags.is_flagged(user).await.unwrap());

        flags.flag(user).await.unwrap();
        assert!(flags.is_flagged(user).await.unwrap());
        assert_eq!(failures.count(user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reset_flag_zero_reads_false() {
        let store = Arc::new(MemoryStore::new());
        let flags = ResetFlags::new(store.clone());
        let user = UserId::new();

        flags.flag(user).await.unwrap();
        store.set(Namespace::ForcePasswordReset, user, 0).await.unwrap();
        assert!(!flags.is_flagged(user).await.unwrap());
    }

    #[tokio::test]
    async fn failed_logins_count_and_reset() {
        let failures = FailedLogins::new(Arc::new(MemoryStore::new()));
        let user = UserId::new();

        assert_eq!(failures.count(user).await.unwrap(), 0);
        assert_eq!(failures.record_failure(user).await.unwrap(), 1);
        assert_eq!(failures.record_failure(user).await.unwrap(), 2);

        failures.reset(user).await.unwrap();
        assert_eq!(failures.count(user).await.unwrap(), 0);
        assert_eq!(failures.record_failure(user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let user = UserId::new();

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.increment(Namespace::FailedLogins, user).await })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(
            store.get(Namespace::FailedLogins, user).await.unwrap(),
            Some(32)
        );
    }

    #[tokio::test]
    async fn entries_expire_after_lifetime() {
        let store = MemoryStore::new()
            .with_lifetime(Namespace::ForcePasswordReset, Duration::from_millis(20));
        let user = UserId::new();

        store.set(Namespace::ForcePasswordReset, user, 1).await.unwrap();
        store.set(Namespace::FailedLogins, user, 3).await.unwrap();
        assert_eq!(
            store.get(Namespace::ForcePasswordReset, user).await.unwrap(),
            Some(1)
        );

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(
            store.get(Namespace::ForcePasswordReset, user).await.unwrap(),
            None
        );
        // No lifetime configured for this namespace.
        assert_eq!(store.get(Namespace::FailedLogins, user).await.unwrap(), Some(3));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn increment_restarts_after_expiry() {
        let store =
            MemoryStore::new().with_lifetime(Namespace::FailedLogins, Duration::from_millis(20));
        let user = UserId::new();

        store.increment(Namespace::FailedLogins, user).await.unwrap();
        store.increment(Namespace::FailedLogins, user).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.increment(Namespace::FailedLogins, user).await.unwrap(), 1);
    }
}

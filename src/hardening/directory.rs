//! User directory seam.
//!
//! The policies only need to resolve a username, deactivate an account and
//! obtain a stable identifier. [`MemoryDirectory`] backs the demo server and
//! the tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Stable, comparable identifier assigned to a user by the persistence layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    id: UserId,
    username: String,
}

impl User {
    #[must_use]
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("user directory unavailable: {0}")]
    Unavailable(String),
    #[error("user {0} not found")]
    NotFound(UserId),
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve a submitted username. Unknown usernames yield `Ok(None)`.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DirectoryError>;

    async fn deactivate(&self, user: &User) -> Result<(), DirectoryError>;

    /// Stable identifier used as the cache key for the user.
    fn identifier(&self, user: &User) -> UserId {
        user.id()
    }
}

#[derive(Debug)]
struct Entry {
    user: User,
    active: bool,
}

/// Directory held in process memory, keyed by username.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active user, replacing any entry with the same username.
    pub async fn insert(&self, user: User) {
        let mut entries = self.entries.write().await;
        entries.insert(
            user.username().to_string(),
            Entry { user, active: true },
        );
    }

    /// `None` for unknown usernames.
    pub async fn is_active(&self, username: &str) -> Option<bool> {
        self.entries.read().await.get(username).map(|e| e.active)
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self
            .entries
            .read()
            .await
            .get(username)
            .map(|entry| entry.user.clone()))
    }

    async fn deactivate(&self, user: &User) -> Result<(), DirectoryError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(user.username())
            .filter(|entry| entry.user.id() == user.id())
            .ok_or(DirectoryError::NotFound(user.id()))?;

        if entry.active {
            entry.active = false;
            info!(user = %user.id(), "account deactivated");
        } else {
            debug!(user = %user.id(), "account already inactive");
        }

        Ok(())
    }
}

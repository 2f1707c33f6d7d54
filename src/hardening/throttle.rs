//! Failed login throttle.
//!
//! Flow Overview:
//! 1) On an authentication failure, resolve the submitted username and count
//!    the failure against the user's stable identifier.
//! 2) Once the count exceeds `blockAfterFailedLogins`, deactivate the account
//!    and surface an error notice.
//! 3) On an authentication success, reset the count to zero.
//!
//! The throttle never changes the outcome of the authentication itself: the
//! wrapped action always runs, and errors from the directory or the store are
//! turned into a notice (failure path) or dropped (success path).

use std::{future::Future, sync::Arc};
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use super::{
    directory::{DirectoryError, User, UserDirectory, UserId},
    notice::Notice,
    settings::Settings,
    store::{FailedLogins, StoreError},
};

#[derive(Debug, Error)]
pub enum ThrottleError {
    #[error("You have reached the maximum number of failed logins.")]
    AuthenticationBlocked { user: UserId, failures: u64 },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

pub struct LoginThrottle {
    settings: Arc<Settings>,
    directory: Arc<dyn UserDirectory>,
    failures: FailedLogins,
}

impl LoginThrottle {
    #[must_use]
    pub fn new(
        settings: Arc<Settings>,
        directory: Arc<dyn UserDirectory>,
        failures: FailedLogins,
    ) -> Self {
        Self {
            settings,
            directory,
            failures,
        }
    }

    /// Wraps the "authentication failed" action.
    ///
    /// `next` receives the notice to display, if the throttle produced one,
    /// and its result is returned unchanged.
    #[instrument(skip_all, fields(username))]
    pub async fn on_authentication_failure<F, Fut, T>(&self, username: Option<&str>, next: F) -> T
    where
        F: FnOnce(Option<Notice>) -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.settings.check_failed_logins() {
            return next(None).await;
        }

        let notice = match self.register_failure(username).await {
            Ok(_) => None,
            Err(err @ ThrottleError::AuthenticationBlocked { .. }) => {
                warn!("{err}");
                Some(Notice::error(err.to_string()))
            }
            Err(err) => {
                error!("Failed to record failed login: {err}");
                Some(Notice::error(err.to_string()))
            }
        };

        next(notice).await
    }

    /// Wraps the "authentication succeeded" action.
    #[instrument(skip_all, fields(username))]
    pub async fn on_authentication_success<F, Fut, T>(&self, username: Option<&str>, next: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if self.settings.check_failed_logins() {
            if let Err(err) = self.reset_failures(username).await {
                debug!("Ignoring failed login reset error: {err}");
            }
        }

        next().await
    }

    /// Count one failure for `username`.
    ///
    /// Returns `Ok(None)` for unknown usernames, otherwise the new count.
    ///
    /// # Errors
    /// Returns `ThrottleError::AuthenticationBlocked` once the threshold is
    /// exceeded (the account is already deactivated at that point), or the
    /// collaborator error that interrupted the update.
    pub async fn register_failure(&self, username: Option<&str>) -> Result<Option<u64>, ThrottleError> {
        let Some(user) = self.resolve(username).await? else {
            return Ok(None);
        };

        let id = self.directory.identifier(&user);
        let failures = self.failures.record_failure(id).await?;
        debug!(user = %id, failures, "failed login recorded");

        if failures > u64::from(self.settings.block_after_failed_logins()) {
            self.directory.deactivate(&user).await?;
            return Err(ThrottleError::AuthenticationBlocked { user: id, failures });
        }

        Ok(Some(failures))
    }

    /// Reset the failure count for `username`.
    ///
    /// Returns `false` for unknown usernames.
    ///
    /// # Errors
    /// Returns the collaborator error that interrupted the reset.
    pub async fn reset_failures(&self, username: Option<&str>) -> Result<bool, ThrottleError> {
        let Some(user) = self.resolve(username).await? else {
            return Ok(false);
        };

        let id = self.directory.identifier(&user);
        self.failures.reset(id).await?;
        debug!(user = %id, "failed logins reset");

        Ok(true)
    }

    async fn resolve(&self, username: Option<&str>) -> Result<Option<User>, ThrottleError> {
        let Some(username) = username.map(str::trim).filter(|name| !name.is_empty()) else {
            return Ok(None);
        };

        tracing::Span::current().record("username", username);

        Ok(self.directory.find_by_username(username).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardening::{
        directory::MemoryDirectory,
        notice::Severity,
        store::{CounterStore, MemoryStore, Namespace},
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        throttle: LoginThrottle,
        directory: Arc<MemoryDirectory>,
        store: Arc<MemoryStore>,
        user: User,
    }

    async fn fixture(settings: Settings) -> Fixture {
        let directory = Arc::new(MemoryDirectory::new());
        let store = Arc::new(MemoryStore::new());
        let user = User::new(UserId::new(), "editor");
        directory.insert(user.clone()).await;

        let throttle = LoginThrottle::new(
            Arc::new(settings),
            directory.clone(),
            FailedLogins::new(store.clone()),
        );

        Fixture {
            throttle,
            directory,
            store,
            user,
        }
    }

    fn threshold(attempts: u32) -> Settings {
        Settings::default()
            .with_block_after_failed_logins(attempts)
            .unwrap()
    }

    async fn failures(fixture: &Fixture) -> Option<u64> {
        fixture
            .store
            .get(Namespace::FailedLogins, fixture.user.id())
            .await
            .unwrap()
    }

    struct BrokenStore;

    #[async_trait]
    impl CounterStore for BrokenStore {
        async fn get(&self, _: Namespace, _: UserId) -> Result<Option<u64>, StoreError> {
            Err(StoreError::Unavailable("cache backend down".to_string()))
        }

        async fn set(&self, _: Namespace, _: UserId, _: u64) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("cache backend down".to_string()))
        }
    }

    struct BrokenDirectory;

    #[async_trait]
    impl UserDirectory for BrokenDirectory {
        async fn find_by_username(&self, _: &str) -> Result<Option<User>, DirectoryError> {
            Err(DirectoryError::Unavailable("ldap timeout".to_string()))
        }

        async fn deactivate(&self, _: &User) -> Result<(), DirectoryError> {
            Err(DirectoryError::Unavailable("ldap timeout".to_string()))
        }
    }

    #[tokio::test]
    async fn blocks_after_threshold_is_exceeded() {
        let fx = fixture(threshold(3)).await;
        let ran = AtomicUsize::new(0);

        for expected in 1..=3 {
            let notice = fx
                .throttle
                .on_authentication_failure(Some("editor"), |notice| {
                    ran.fetch_add(1, Ordering::SeqCst);
                    async move { notice }
                })
                .await;

            assert_eq!(notice, None);
            assert_eq!(failures(&fx).await, Some(expected));
            assert_eq!(fx.directory.is_active("editor").await, Some(true));
        }

        let notice = fx
            .throttle
            .on_authentication_failure(Some("editor"), |notice| {
                ran.fetch_add(1, Ordering::SeqCst);
                async move { notice }
            })
            .await;

        assert_eq!(
            notice,
            Some(Notice::error(
                "You have reached the maximum number of failed logins."
            ))
        );
        assert_eq!(failures(&fx).await, Some(4));
        assert_eq!(fx.directory.is_active("editor").await, Some(false));
        assert_eq!(ran.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn register_failure_reports_blocked_user() {
        let fx = fixture(threshold(1)).await;

        assert_eq!(
            fx.throttle.register_failure(Some("editor")).await.unwrap(),
            Some(1)
        );

        let err = fx
            .throttle
            .register_failure(Some("editor"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ThrottleError::AuthenticationBlocked { user, failures: 2 } if user == fx.user.id()
        ));
    }

    #[tokio::test]
    async fn success_resets_counter() {
        let fx = fixture(threshold(3)).await;

        for _ in 0..3 {
            fx.throttle
                .on_authentication_failure(Some("editor"), |_| async {})
                .await;
        }
        assert_eq!(failures(&fx).await, Some(3));

        let response = fx
            .throttle
            .on_authentication_success(Some("editor"), || async { "welcome" })
            .await;
        assert_eq!(response, "welcome");
        assert_eq!(failures(&fx).await, Some(0));

        // A fresh streak starts from zero again.
        fx.throttle
            .on_authentication_failure(Some("editor"), |_| async {})
            .await;
        assert_eq!(failures(&fx).await, Some(1));
        assert_eq!(fx.directory.is_active("editor").await, Some(true));
    }

    #[tokio::test]
    async fn unknown_username_creates_no_entries() {
        let fx = fixture(threshold(1)).await;

        for username in [Some("ghost"), Some("   "), Some(""), None] {
            let notice = fx
                .throttle
                .on_authentication_failure(username, |notice| async move { notice })
                .await;
            assert_eq!(notice, None);

            let result = fx
                .throttle
                .on_authentication_success(username, || async { 7 })
                .await;
            assert_eq!(result, 7);
        }

        assert!(fx.store.is_empty().await);
    }

    #[tokio::test]
    async fn disabled_throttle_only_delegates() {
        let fx = fixture(threshold(1).with_check_failed_logins(false)).await;

        for _ in 0..5 {
            let notice = fx
                .throttle
                .on_authentication_failure(Some("editor"), |notice| async move { notice })
                .await;
            assert_eq!(notice, None);
        }

        assert!(fx.store.is_empty().await);
        assert_eq!(fx.directory.is_active("editor").await, Some(true));
    }

    #[tokio::test]
    async fn store_failure_becomes_notice_on_failure_path() {
        let directory = Arc::new(MemoryDirectory::new());
        directory.insert(User::new(UserId::new(), "editor")).await;
        let throttle = LoginThrottle::new(
            Arc::new(threshold(3)),
            directory,
            FailedLogins::new(Arc::new(BrokenStore)),
        );

        let notice = throttle
            .on_authentication_failure(Some("editor"), |notice| async move { notice })
            .await
            .unwrap();

        assert_eq!(notice.severity, Severity::Error);
        assert_eq!(notice.title, "Error");
        assert!(notice.message.contains("cache backend down"));
    }

    #[tokio::test]
    async fn directory_failure_is_silent_on_success_path() {
        let throttle = LoginThrottle::new(
            Arc::new(threshold(3)),
            Arc::new(BrokenDirectory),
            FailedLogins::new(Arc::new(MemoryStore::new())),
        );

        let result = throttle
            .on_authentication_success(Some("editor"), || async { "ok" })
            .await;
        assert_eq!(result, "ok");

        let notice = throttle
            .on_authentication_failure(Some("editor"), |notice| async move { notice })
            .await;
        assert!(notice.is_some_and(|n| n.message.contains("ldap timeout")));
    }
}

//! Forced password reset gate.
//!
//! A user whose reset flag is set may only reach the password settings page.
//! Both guards run before the wrapped action and either hand back its result
//! untouched or return a redirect without running it.
//!
//! Store failures are not swallowed here: not knowing whether the flag is set
//! must not grant access, so the error goes back to the caller.

use std::{future::Future, sync::Arc};
use thiserror::Error;
use tracing::{debug, info, instrument};

use super::{
    directory::{User, UserDirectory},
    settings::Settings,
    store::{ResetFlags, StoreError},
};

#[derive(Debug, PartialEq, Eq)]
pub enum GateOutcome<T> {
    /// The wrapped action ran and this is its result.
    Proceed(T),
    /// The wrapped action did not run; redirect to this location.
    Redirect(String),
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("failed to read password reset flag: {0}")]
    Store(#[from] StoreError),
}

pub struct ResetGate {
    settings: Arc<Settings>,
    directory: Arc<dyn UserDirectory>,
    flags: ResetFlags,
}

impl ResetGate {
    #[must_use]
    pub fn new(
        settings: Arc<Settings>,
        directory: Arc<dyn UserDirectory>,
        flags: ResetFlags,
    ) -> Self {
        Self {
            settings,
            directory,
            flags,
        }
    }

    /// Gate for the main backend UI entry point. No exemptions.
    ///
    /// # Errors
    /// Returns `GateError` if the reset flag cannot be read.
    #[instrument(skip_all, fields(user = current_user.map(|u| u.username())))]
    pub async fn guard_primary_entry<F, Fut, T>(
        &self,
        current_user: Option<&User>,
        next: F,
    ) -> Result<GateOutcome<T>, GateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if self.reset_required(current_user).await? {
            return Ok(self.redirect());
        }

        Ok(GateOutcome::Proceed(next().await))
    }

    /// Gate for module pages. Requests already aimed at the settings page pass
    /// through so the redirect cannot loop.
    ///
    /// # Errors
    /// Returns `GateError` if the reset flag cannot be read.
    #[instrument(skip_all, fields(user = current_user.map(|u| u.username()), path = request_path))]
    pub async fn guard_module_entry<F, Fut, T>(
        &self,
        current_user: Option<&User>,
        request_path: &str,
        next: F,
    ) -> Result<GateOutcome<T>, GateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if self.reset_required(current_user).await? && !self.targets_settings_page(request_path) {
            return Ok(self.redirect());
        }

        Ok(GateOutcome::Proceed(next().await))
    }

    #[must_use]
    pub fn targets_settings_page(&self, request_path: &str) -> bool {
        request_path.contains(&self.settings.settings_path())
    }

    async fn reset_required(&self, current_user: Option<&User>) -> Result<bool, GateError> {
        if !self.settings.force_password_reset_after_update() {
            return Ok(false);
        }

        let Some(user) = current_user else {
            debug!("no authenticated user, nothing to gate");
            return Ok(false);
        };

        // Same key the throttle and the seeding use.
        let id = self.directory.identifier(user);
        Ok(self.flags.is_flagged(id).await?)
    }

    fn redirect<T>(&self) -> GateOutcome<T> {
        let location = self.settings.redirect_target();
        info!(%location, "password reset required, redirecting");
        GateOutcome::Redirect(location)
    }
}

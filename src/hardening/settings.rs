//! Process-wide policy settings.
//!
//! Settings are built once at startup and shared behind an `Arc`; nothing
//! mutates them afterwards.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use thiserror::Error;

const DEFAULT_LOGIN_URI: &str = "neos";
const DEFAULT_BLOCK_AFTER_FAILED_LOGINS: u32 = 5;

/// Settings page relative to the login URI.
pub const SETTINGS_PAGE: &str = "user/usersettings";

// One or more URL-safe path segments.
static LOGIN_URI_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._~-]+(/[A-Za-z0-9._~-]+)*$"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("invalid login URI: {0:?}")]
    InvalidLoginUri(String),
    #[error("blockAfterFailedLogins must be at least 1")]
    InvalidThreshold,
    #[error("login URI pattern failed to compile: {0}")]
    Pattern(String),
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    login_uri: String,
    block_after_failed_logins: u32,
    force_password_reset_after_update: bool,
    check_failed_logins: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            login_uri: DEFAULT_LOGIN_URI.to_string(),
            block_after_failed_logins: DEFAULT_BLOCK_AFTER_FAILED_LOGINS,
            force_password_reset_after_update: true,
            check_failed_logins: true,
        }
    }
}

impl Settings {
    /// Create settings for the given login URI with both policies enabled.
    ///
    /// # Errors
    /// Returns `SettingsError::InvalidLoginUri` if the URI is not made of
    /// URL-safe path segments.
    pub fn new(login_uri: &str) -> Result<Self, SettingsError> {
        Ok(Self {
            login_uri: normalize_login_uri(login_uri)?,
            ..Self::default()
        })
    }

    /// # Errors
    /// Returns `SettingsError::InvalidThreshold` for a zero threshold.
    pub fn with_block_after_failed_logins(mut self, attempts: u32) -> Result<Self, SettingsError> {
        if attempts == 0 {
            return Err(SettingsError::InvalidThreshold);
        }
        self.block_after_failed_logins = attempts;
        Ok(self)
    }

    #[must_use]
    pub fn with_force_password_reset_after_update(mut self, enabled: bool) -> Self {
        self.force_password_reset_after_update = enabled;
        self
    }

    #[must_use]
    pub fn with_check_failed_logins(mut self, enabled: bool) -> Self {
        self.check_failed_logins = enabled;
        self
    }

    #[must_use]
    pub fn login_uri(&self) -> &str {
        &self.login_uri
    }

    #[must_use]
    pub fn block_after_failed_logins(&self) -> u32 {
        self.block_after_failed_logins
    }

    #[must_use]
    pub fn force_password_reset_after_update(&self) -> bool {
        self.force_password_reset_after_update
    }

    #[must_use]
    pub fn check_failed_logins(&self) -> bool {
        self.check_failed_logins
    }

    /// `{login_uri}/user/usersettings`, without a leading slash, as matched
    /// against request paths.
    #[must_use]
    pub fn settings_path(&self) -> String {
        format!("{}/{SETTINGS_PAGE}", self.login_uri)
    }

    /// Absolute redirect target for users who must reset their password.
    #[must_use]
    pub fn redirect_target(&self) -> String {
        format!("/{}", self.settings_path())
    }

    /// Route prefix for everything served under the login URI.
    #[must_use]
    pub fn route_prefix(&self) -> String {
        format!("/{}", self.login_uri)
    }
}

fn normalize_login_uri(login_uri: &str) -> Result<String, SettingsError> {
    let trimmed = login_uri.trim().trim_matches('/');

    let pattern = LOGIN_URI_PATTERN
        .as_ref()
        .map_err(|err| SettingsError::Pattern(err.to_string()))?;

    if pattern.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(SettingsError::InvalidLoginUri(login_uri.to_string()))
    }
}

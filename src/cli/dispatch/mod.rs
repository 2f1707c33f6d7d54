//! Map validated CLI arguments to the action to run.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{
    ARG_BLOCK_AFTER_FAILED_LOGINS, ARG_CHECK_FAILED_LOGINS, ARG_FAILED_LOGINS_LIFETIME,
    ARG_FORCE_PASSWORD_RESET, ARG_LOGIN_URI, ARG_PORT, ARG_RESET_FLAG_LIFETIME, ARG_USERS,
};
use crate::hardening::settings::Settings;
use anyhow::{Context, Result};
use std::{path::PathBuf, time::Duration};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if the login URI or the threshold is invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    let login_uri = matches
        .get_one::<String>(ARG_LOGIN_URI)
        .context("missing required argument: --login-uri")?;

    let settings = Settings::new(login_uri)
        .context("invalid --login-uri")?
        .with_block_after_failed_logins(
            matches
                .get_one::<u32>(ARG_BLOCK_AFTER_FAILED_LOGINS)
                .copied()
                .unwrap_or(5),
        )
        .context("invalid --block-after-failed-logins")?
        .with_force_password_reset_after_update(flag(matches, ARG_FORCE_PASSWORD_RESET))
        .with_check_failed_logins(flag(matches, ARG_CHECK_FAILED_LOGINS));

    Ok(Action::Server(Args {
        port,
        settings,
        users: matches.get_one::<String>(ARG_USERS).map(PathBuf::from),
        failed_logins_lifetime: lifetime(matches, ARG_FAILED_LOGINS_LIFETIME),
        reset_flag_lifetime: lifetime(matches, ARG_RESET_FLAG_LIFETIME),
    }))
}

fn flag(matches: &clap::ArgMatches, id: &str) -> bool {
    matches.get_one::<bool>(id).copied().unwrap_or(true)
}

// 0 means the entries never expire.
fn lifetime(matches: &clap::ArgMatches, id: &str) -> Option<Duration> {
    matches
        .get_one::<u64>(id)
        .copied()
        .filter(|seconds| *seconds > 0)
        .map(Duration::from_secs)
}

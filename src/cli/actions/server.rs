use crate::hardening::{
    self,
    directory::{MemoryDirectory, User, UserDirectory, UserId},
    settings::Settings,
    store::{MemoryStore, Namespace, ResetFlags},
    Policies,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf, sync::Arc, time::Duration};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub settings: Settings,
    pub users: Option<PathBuf>,
    pub failed_logins_lifetime: Option<Duration>,
    pub reset_flag_lifetime: Option<Duration>,
}

/// Entry of the users file.
#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct UserSeed {
    pub username: String,
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub force_password_reset: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the users file cannot be loaded or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let mut store = MemoryStore::new();
    if let Some(lifetime) = args.failed_logins_lifetime {
        store = store.with_lifetime(Namespace::FailedLogins, lifetime);
    }
    if let Some(lifetime) = args.reset_flag_lifetime {
        store = store.with_lifetime(Namespace::ForcePasswordReset, lifetime);
    }
    let store = Arc::new(store);
    let directory = Arc::new(MemoryDirectory::new());

    if let Some(path) = &args.users {
        let seeds = read_users(path)?;
        seed(&directory, &ResetFlags::new(store.clone()), seeds).await?;
    }

    info!(
        login_uri = args.settings.login_uri(),
        block_after_failed_logins = args.settings.block_after_failed_logins(),
        force_password_reset_after_update = args.settings.force_password_reset_after_update(),
        check_failed_logins = args.settings.check_failed_logins(),
        "policies configured"
    );

    let policies = Policies::new(args.settings, directory, store);

    hardening::new(args.port, policies).await
}

/// Read the users file.
/// # Errors
/// Returns an error if the file cannot be read or is not a JSON array of users.
pub fn read_users(path: &Path) -> Result<Vec<UserSeed>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read users file: {}", path.display()))?;

    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid users file: {}", path.display()))
}

/// Load users into the directory and raise reset flags where requested.
/// # Errors
/// Returns an error if a reset flag cannot be stored.
pub async fn seed(
    directory: &MemoryDirectory,
    flags: &ResetFlags,
    seeds: Vec<UserSeed>,
) -> Result<()> {
    let count = seeds.len();

    for seed in seeds {
        let id = seed.id.map_or_else(UserId::new, UserId::from_uuid);
        let user = User::new(id, seed.username);

        if seed.force_password_reset {
            flags
                .flag(directory.identifier(&user))
                .await
                .with_context(|| format!("Failed to flag {} for password reset", user.username()))?;
            debug!(user = user.username(), "password reset required");
        }

        directory.insert(user).await;
    }

    info!("Loaded {} users", count);

    Ok(())
}

//! # Hardening (backend access policies)
//!
//! `hardening` provides two request-interception policies for a content
//! management backend:
//!
//! - **Reset gate:** a user flagged for a mandatory password reset is
//!   redirected to the password settings page instead of reaching any other
//!   backend page.
//! - **Login throttle:** consecutive failed logins are counted per user and the
//!   account is deactivated once the configured threshold is exceeded. A
//!   successful login resets the count.
//!
//! Both policies are plain decorators: they take their inputs explicitly plus
//! the `next` action to run, and either short-circuit or delegate. The
//! [`hardening`] module also ships axum adapters and a small server that puts
//! the policies in front of stand-in backend pages.
//!
//! ## Collaborators
//!
//! The user directory and the counter store are traits
//! ([`hardening::directory::UserDirectory`], [`hardening::store::CounterStore`]).
//! In-memory implementations are bundled for the demo server and tests.

pub mod cli;
pub mod hardening;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub mod logging;

use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        BoolishValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";
pub const ARG_LOGIN_URI: &str = "login-uri";
pub const ARG_BLOCK_AFTER_FAILED_LOGINS: &str = "block-after-failed-logins";
pub const ARG_FORCE_PASSWORD_RESET: &str = "force-password-reset-after-update";
pub const ARG_CHECK_FAILED_LOGINS: &str = "check-failed-logins";
pub const ARG_USERS: &str = "users";
pub const ARG_FAILED_LOGINS_LIFETIME: &str = "failed-logins-lifetime";
pub const ARG_RESET_FLAG_LIFETIME: &str = "reset-flag-lifetime";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("hardening")
        .about("Forced password reset gate and failed login throttle")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("HARDENING_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_LOGIN_URI)
                .long(ARG_LOGIN_URI)
                .help("Base path of the backend login routes, example: neos")
                .default_value("neos")
                .env("HARDENING_LOGIN_URI"),
        )
        .arg(
            Arg::new(ARG_BLOCK_AFTER_FAILED_LOGINS)
                .long(ARG_BLOCK_AFTER_FAILED_LOGINS)
                .help("Deactivate an account once its consecutive failed logins exceed this number")
                .default_value("5")
                .env("HARDENING_BLOCK_AFTER_FAILED_LOGINS")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_FORCE_PASSWORD_RESET)
                .long(ARG_FORCE_PASSWORD_RESET)
                .help("Redirect flagged users to the password settings page")
                .default_value("true")
                .env("HARDENING_FORCE_PASSWORD_RESET")
                .action(ArgAction::Set)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new(ARG_CHECK_FAILED_LOGINS)
                .long(ARG_CHECK_FAILED_LOGINS)
                .help("Count failed logins and deactivate accounts past the threshold")
                .default_value("true")
                .env("HARDENING_CHECK_FAILED_LOGINS")
                .action(ArgAction::Set)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new(ARG_USERS)
                .long(ARG_USERS)
                .help("JSON file with the users to load into the in-memory directory")
                .env("HARDENING_USERS"),
        )
        .arg(
            Arg::new(ARG_FAILED_LOGINS_LIFETIME)
                .long(ARG_FAILED_LOGINS_LIFETIME)
                .help("Seconds before a failed login counter expires, 0 keeps it forever")
                .default_value("0")
                .env("HARDENING_FAILED_LOGINS_LIFETIME")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_RESET_FLAG_LIFETIME)
                .long(ARG_RESET_FLAG_LIFETIME)
                .help("Seconds before a password reset flag expires, 0 keeps it forever")
                .default_value("0")
                .env("HARDENING_RESET_FLAG_LIFETIME")
                .value_parser(clap::value_parser!(u64)),
        );

    logging::with_args(command)
}

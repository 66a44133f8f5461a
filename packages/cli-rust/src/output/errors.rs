//! Centralized command error formatting
//!
//! Every command returns a [`CommandError`]; this module turns it into the
//! styled, multi-line text printed on stderr.

use console::style;
use skyport_core::config::{ConfigError, ValidationError};
use skyport_core::{ActorError, CommandError};
use std::path::Path;

/// Format command errors with actionable guidance
///
/// The first line is always the error's own message so scripted callers can
/// match on it; hints follow as indented `Tip:` lines.
pub fn format_command_error(e: &CommandError) -> String {
    let title = style(e.to_string()).red().bold();
    match e {
        CommandError::UnableToAuthenticate => format!(
            "{title}\n\n  {} Check the credentials, or log in with {}",
            style("Tip:").cyan(),
            style("--sso").cyan()
        ),
        CommandError::Actor(ActorError::Request { .. }) => format!(
            "{title}\n\n  {} Check the API endpoint and your network connection.\n  {} Self-signed certificates need {}",
            style("Tip:").cyan(),
            style("Tip:").cyan(),
            style("--skip-ssl-validation").cyan()
        ),
        CommandError::InvalidApiEndpoint { .. } => format!(
            "{title}\n\n  {} Use a URL such as {}",
            style("Tip:").cyan(),
            style("https://api.example.com").cyan()
        ),
        CommandError::Actor(ActorError::NoApiTargeted) => format!(
            "{title}\n\n  {} Set one with {}",
            style("Tip:").cyan(),
            style("login -a API_URL").cyan()
        ),
        CommandError::Actor(ActorError::Config(_)) | CommandError::ConfigWrite(_) => format!(
            "{title}\n\n  {} Check the permissions of the config directory, or set {}",
            style("Tip:").cyan(),
            style("SKYPORT_CONFIG_DIR").cyan()
        ),
        _ => title.to_string(),
    }
}

/// Print a command error to stderr
pub fn show_command_error(e: &CommandError) {
    eprintln!();
    eprintln!("{}", format_command_error(e));
    eprintln!("{}", style("FAILED").red().bold());
}

/// Print an unreadable config file error and where to look
pub fn show_config_error(e: &ConfigError, config_path: &Path) {
    eprintln!("{} Configuration error", style("Error:").red().bold());
    eprintln!();
    eprintln!("  {e}");
    eprintln!();
    eprintln!("  Config file: {}", style(config_path.display()).yellow());
    eprintln!();
    eprintln!(
        "  {} Check the config file for syntax errors or unknown fields.",
        style("Tip:").cyan()
    );
    eprintln!(
        "  {} Delete it to start over; the next login writes a fresh one.",
        style("Tip:").cyan()
    );
}

/// Print a config value that failed validation, with its fix
pub fn show_validation_error(e: &ValidationError) {
    eprintln!(
        "{} Invalid value for {}",
        style("Error:").red().bold(),
        style(&e.field).yellow()
    );
    eprintln!();
    eprintln!("  {}", e.message);
    eprintln!();
    eprintln!("  {} {}", style("Fix:").cyan(), e.fix_command);
}

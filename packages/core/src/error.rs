//! Error types
//!
//! [`ActorError`] is what the remote actor layer reports. [`CommandError`] is
//! what a command returns to the CLI boundary; every actor error that has a
//! dedicated user-facing form is mapped by [`CommandError::translate`].

use crate::ui::UiError;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by the actor layer (remote APIs, local state)
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ActorError {
    /// UAA rejected the supplied credentials
    #[error("{message}")]
    Unauthorized { message: String },

    /// UAA locked the account after too many failed attempts
    #[error("{message}")]
    AccountLocked { message: String },

    #[error("{reason}")]
    StagingFailed { reason: String },

    #[error("Staging of app {app_name} timed out after {}", format_timeout(.timeout))]
    StagingTimeout { app_name: String, timeout: Duration },

    #[error("Instance of app {name} crashed")]
    InstanceCrashed { name: String },

    #[error("Instance of app {name} is flapping")]
    InstanceFlapping { name: String },

    #[error("Timed out waiting for app {name} to start")]
    StartupTimeout { name: String },

    #[error("App '{name}' not found")]
    ApplicationNotFound { name: String },

    #[error("Organization '{name}' not found.")]
    OrganizationNotFound { name: String },

    #[error("Space '{name}' not found.")]
    SpaceNotFound { name: String },

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("No API endpoint set")]
    NoApiTargeted,

    /// The request never produced a response (DNS, TLS, connection reset)
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// The server answered with a non-success status
    #[error("Unexpected response {status} from {url}: {message}")]
    Api {
        status: u16,
        url: String,
        message: String,
    },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Errors surfaced to the user by a command
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    /// Mutually exclusive flags were combined
    #[error(
        "Incorrect Usage: The following arguments cannot be used together: {}",
        .args.join(", ")
    )]
    ArgumentCombination { args: Vec<String> },

    #[error("Unable to authenticate.")]
    UnableToAuthenticate,

    #[error("{message}")]
    AccountLocked { message: String },

    #[error("{message}")]
    StagingFailed { message: String },

    #[error("Error staging application {app_name}: timed out after {}", format_timeout(.timeout))]
    StagingTimeout { app_name: String, timeout: Duration },

    #[error(
        "Start unsuccessful\n\nTIP: use '{binary_name} logs {app_name} --recent' for more information"
    )]
    ApplicationUnableToStart {
        app_name: String,
        binary_name: String,
    },

    #[error(
        "Start app timeout\n\nTIP: Application must be listening on the right port. Instead of hard coding the port, use the $PORT environment variable.\n\nUse '{binary_name} logs {app_name} --recent' for more information"
    )]
    StartupTimeout {
        app_name: String,
        binary_name: String,
    },

    #[error("Not logged in. Use '{binary_name} login' or '{binary_name} login --sso' to log in.")]
    NotLoggedIn { binary_name: String },

    #[error("No org targeted, use '{binary_name} login -o ORG' to target an org.")]
    NoOrganizationTargeted { binary_name: String },

    #[error("No space targeted, use '{binary_name} login -s SPACE' to target a space.")]
    NoSpaceTargeted { binary_name: String },

    /// A client-credentials session is active and would be overwritten
    #[error(
        "Service account currently logged in. Use '{binary_name} logout' to log out service account and try again."
    )]
    ServiceAccountLoggedIn { binary_name: String },

    /// A non-default UAA client is stored outside a client-credentials session
    #[error(
        "A custom UAA client is configured. Use '{binary_name} logout' to reset it before logging in with a password."
    )]
    ManualClientCredentials { binary_name: String },

    #[error("Invalid API endpoint '{endpoint}': {reason}")]
    InvalidApiEndpoint { endpoint: String, reason: String },

    #[error("Error writing config: {0}")]
    ConfigWrite(String),

    /// Reading interactive input failed outside the credential loop
    #[error(transparent)]
    Prompt(#[from] UiError),

    #[error(transparent)]
    Actor(#[from] ActorError),
}

impl CommandError {
    /// Map an actor error onto its user-facing form
    pub fn translate(err: ActorError, binary_name: &str) -> Self {
        match err {
            ActorError::StagingFailed { reason } => CommandError::StagingFailed { message: reason },
            ActorError::StagingTimeout { app_name, timeout } => {
                CommandError::StagingTimeout { app_name, timeout }
            }
            ActorError::InstanceCrashed { name } | ActorError::InstanceFlapping { name } => {
                CommandError::ApplicationUnableToStart {
                    app_name: name,
                    binary_name: binary_name.to_string(),
                }
            }
            ActorError::StartupTimeout { name } => CommandError::StartupTimeout {
                app_name: name,
                binary_name: binary_name.to_string(),
            },
            ActorError::AccountLocked { message } => CommandError::AccountLocked { message },
            ActorError::NotLoggedIn => CommandError::NotLoggedIn {
                binary_name: binary_name.to_string(),
            },
            err @ (ActorError::Unauthorized { .. }
            | ActorError::ApplicationNotFound { .. }
            | ActorError::OrganizationNotFound { .. }
            | ActorError::SpaceNotFound { .. }
            | ActorError::NoApiTargeted
            | ActorError::Request { .. }
            | ActorError::Api { .. }
            | ActorError::Decode { .. }
            | ActorError::Config(_)
            | ActorError::Other(_)) => CommandError::Actor(err),
        }
    }
}

fn format_timeout(timeout: &Duration) -> String {
    humantime::format_duration(*timeout).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_timeout_keeps_app_and_duration() {
        let err = CommandError::translate(
            ActorError::StagingTimeout {
                app_name: "some-app".to_string(),
                timeout: Duration::from_nanos(1),
            },
            "sky",
        );
        assert_eq!(
            err,
            CommandError::StagingTimeout {
                app_name: "some-app".to_string(),
                timeout: Duration::from_nanos(1),
            }
        );
        assert_eq!(
            err.to_string(),
            "Error staging application some-app: timed out after 1ns"
        );
    }

    #[test]
    fn crashed_and_flapping_both_mean_unable_to_start() {
        for err in [
            ActorError::InstanceCrashed {
                name: "some-app".to_string(),
            },
            ActorError::InstanceFlapping {
                name: "some-app".to_string(),
            },
        ] {
            assert_eq!(
                CommandError::translate(err, "faceman"),
                CommandError::ApplicationUnableToStart {
                    app_name: "some-app".to_string(),
                    binary_name: "faceman".to_string(),
                }
            );
        }
    }

    #[test]
    fn startup_timeout_mentions_recent_logs() {
        let err = CommandError::translate(
            ActorError::StartupTimeout {
                name: "some-app".to_string(),
            },
            "faceman",
        );
        assert!(err.to_string().contains("faceman logs some-app --recent"));
    }

    #[test]
    fn staging_failed_carries_reason_verbatim() {
        let err = CommandError::translate(
            ActorError::StagingFailed {
                reason: "Something, but not nothing".to_string(),
            },
            "sky",
        );
        assert_eq!(err.to_string(), "Something, but not nothing");
    }

    #[test]
    fn unclassified_errors_pass_through_verbatim() {
        let err = CommandError::translate(ActorError::Other("err log message".to_string()), "sky");
        assert_eq!(err.to_string(), "err log message");
        assert!(matches!(err, CommandError::Actor(ActorError::Other(_))));
    }

    #[test]
    fn prompt_failures_convert() {
        let err: CommandError = UiError::Interrupted.into();
        assert_eq!(err.to_string(), "prompt interrupted");
    }

    #[test]
    fn argument_combination_lists_flags() {
        let err = CommandError::ArgumentCombination {
            args: vec!["--sso".to_string(), "--origin".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Incorrect Usage: The following arguments cannot be used together: --sso, --origin"
        );
    }
}

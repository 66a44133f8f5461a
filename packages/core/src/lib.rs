//! skyport-core - shared logic for the skyport CLI
//!
//! This crate contains everything that does not touch the terminal directly:
//! - Configuration schema, validation and the shared config store
//! - Interactive credential negotiation (prompt plan + attempt loop)
//! - Actor traits over the remote platform APIs and their stream types
//! - The streamed operation orchestrator used by `restart` and `logs`
//! - The user-facing error taxonomy
//! - An HTTP-backed actor (`CloudClient`)

pub mod actor;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod summary;
pub mod ui;
pub mod version;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use actor::{
    Actor, AppStateChange, Application, ApplicationActor, ApplicationState, ApplicationSummary,
    ApplicationSummaryActor, LogActor, LogMessage, LogStream, OperationStreams, Organization,
    ProcessInstance, ProcessSummary, Space, StreamCanceller, TargetActor, TargetInfo,
    TargetSettings, TokenRefreshStream, TokenRefresher, Warnings,
};
pub use api::CloudClient;
pub use auth::{
    AuthPrompt, CredentialNegotiator, CredentialSet, GrantType, LoginMode, LoginRequest,
    PromptKind, PromptPlan, Presupplied,
};
pub use config::{Config, ConfigError, ConfigStore};
pub use error::{ActorError, CommandError};
pub use orchestrator::OperationOrchestrator;
pub use ui::{Ui, UiError};

/// Get the version of skyport-core
pub fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

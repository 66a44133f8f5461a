//! Terminal UI seam
//!
//! Commands, the negotiator and the orchestrator write exclusively through
//! [`Ui`]. The CLI provides the real terminal implementation; tests use
//! `testing::BufferUi`.

use crate::actor::LogMessage;
use thiserror::Error;

/// Failures while reading interactive input
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UiError {
    /// Input stream ended (EOF, closed pipe)
    #[error("input closed")]
    Closed,

    /// User interrupted the prompt (Ctrl+C)
    #[error("prompt interrupted")]
    Interrupted,

    #[error("prompt failed: {0}")]
    Io(String),
}

/// Output and prompt primitives used by every command
///
/// Implementations write text and log lines to stdout, warnings to stderr.
pub trait Ui: Send + Sync {
    fn display_text(&self, text: &str);

    fn display_newline(&self);

    fn display_ok(&self);

    fn display_warning(&self, warning: &str);

    fn display_warnings(&self, warnings: &[String]) {
        for warning in warnings {
            self.display_warning(warning);
        }
    }

    /// Prompt for a visible value
    fn display_text_prompt(&self, label: &str) -> Result<String, UiError>;

    /// Prompt for a value without echoing it
    fn display_password_prompt(&self, label: &str) -> Result<String, UiError>;

    fn display_bool_prompt(&self, label: &str, default: bool) -> Result<bool, UiError>;

    /// Let the user pick one of `choices`; `None` means the user skipped
    fn display_text_menu(&self, choices: &[String], label: &str) -> Result<Option<String>, UiError>;

    /// Two-column table with aligned values
    fn display_key_value_table(&self, rows: &[(String, String)]);

    fn display_table(&self, headers: &[&str], rows: &[Vec<String>]);

    fn display_log_message(&self, message: &LogMessage);
}

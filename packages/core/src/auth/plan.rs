//! Prompt planning
//!
//! Turns the login server's prompt set into the ordered list the user sees.
//! No I/O happens here.

use super::{
    AuthPrompt, CLIENT_ID_KEY, CLIENT_SECRET_KEY, LoginMode, PASSCODE_KEY, PASSWORD_KEY,
    PromptKind, USERNAME_KEY,
};

/// A prompt as it will be displayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPrompt {
    pub key: String,
    pub kind: PromptKind,
    pub label: String,
}

impl PlannedPrompt {
    fn new(key: &str, kind: PromptKind, label: &str) -> Self {
        Self {
            key: key.to_string(),
            kind,
            label: label.to_string(),
        }
    }
}

impl From<&AuthPrompt> for PlannedPrompt {
    fn from(prompt: &AuthPrompt) -> Self {
        Self::new(&prompt.key, prompt.kind, &prompt.display_name)
    }
}

/// Ordered prompts for one login mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPlan {
    prompts: Vec<PlannedPrompt>,
}

impl PromptPlan {
    /// Build the plan for `mode` from the server-declared prompts
    ///
    /// Text prompts come before secret ones; `username` leads the text group
    /// and `password` the secret group, the rest follow by key.
    pub fn build(prompts: &[AuthPrompt], mode: LoginMode) -> Self {
        let prompts = match mode {
            LoginMode::ClientCredentials => vec![
                PlannedPrompt::new(CLIENT_ID_KEY, PromptKind::Text, "Client ID"),
                PlannedPrompt::new(CLIENT_SECRET_KEY, PromptKind::Secret, "Client Secret"),
            ],
            LoginMode::SsoPasscode => {
                let passcode = prompts
                    .iter()
                    .find(|p| p.key == PASSCODE_KEY)
                    .map(PlannedPrompt::from)
                    .unwrap_or_else(|| {
                        PlannedPrompt::new(PASSCODE_KEY, PromptKind::Secret, "Passcode")
                    });
                vec![passcode]
            }
            LoginMode::Password => {
                let mut planned: Vec<PlannedPrompt> = prompts
                    .iter()
                    .filter(|p| p.key != PASSCODE_KEY)
                    .map(PlannedPrompt::from)
                    .collect();
                planned.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
                planned.dedup_by(|a, b| a.key == b.key);
                planned
            }
        };
        Self { prompts }
    }

    pub fn prompts(&self) -> &[PlannedPrompt] {
        &self.prompts
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.prompts.iter().map(|p| p.key.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}

fn sort_key(prompt: &PlannedPrompt) -> (PromptKind, bool, &str) {
    let leading = match prompt.kind {
        PromptKind::Text => USERNAME_KEY,
        PromptKind::Secret => PASSWORD_KEY,
    };
    (prompt.kind, prompt.key != leading, prompt.key.as_str())
}

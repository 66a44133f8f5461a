//! Login credential handling
//!
//! - [`plan`]: which prompts to show, in which order (pure)
//! - [`negotiator`]: the prompt/authenticate/retry loop

pub mod negotiator;
pub mod plan;

pub use negotiator::{AttemptOutcome, CredentialNegotiator, MAX_LOGIN_ATTEMPTS};
pub use plan::{PlannedPrompt, PromptPlan};

use crate::error::CommandError;
use std::collections::BTreeMap;
use std::fmt;

pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";
pub const PASSCODE_KEY: &str = "passcode";
pub const CLIENT_ID_KEY: &str = "client_id";
pub const CLIENT_SECRET_KEY: &str = "client_secret";

/// How a prompt's value is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PromptKind {
    /// Echoed input
    Text,
    /// Hidden input
    Secret,
}

impl PromptKind {
    /// Map the login server's prompt type ("text", "password")
    pub fn from_server_type(kind: &str) -> Self {
        if kind.eq_ignore_ascii_case("password") {
            PromptKind::Secret
        } else {
            PromptKind::Text
        }
    }
}

/// One prompt declared by the login server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPrompt {
    pub key: String,
    pub display_name: String,
    pub kind: PromptKind,
}

impl AuthPrompt {
    pub fn new(key: impl Into<String>, display_name: impl Into<String>, kind: PromptKind) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            kind,
        }
    }
}

/// OAuth grant used for the token request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrantType {
    #[default]
    Password,
    ClientCredentials,
}

impl GrantType {
    pub fn as_str(self) -> &'static str {
        match self {
            GrantType::Password => "password",
            GrantType::ClientCredentials => "client_credentials",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which credentials the login flow asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginMode {
    /// Username/password (plus any extra server prompts)
    #[default]
    Password,
    /// One-time passcode from the SSO page
    SsoPasscode,
    /// Client id/secret, no user involved
    ClientCredentials,
}

impl LoginMode {
    /// Pick the mode from login flags
    ///
    /// At most one of `--sso`, `--sso-passcode` and `--client-credentials`
    /// may be given, and `--origin` only combines with a plain password login.
    pub fn from_flags(
        sso: bool,
        sso_passcode: bool,
        client_credentials: bool,
        origin: bool,
    ) -> Result<Self, CommandError> {
        let selected: Vec<&str> = [
            (sso, "--sso"),
            (sso_passcode, "--sso-passcode"),
            (client_credentials, "--client-credentials"),
        ]
        .into_iter()
        .filter_map(|(set, flag)| set.then_some(flag))
        .collect();

        if selected.len() > 1 || (origin && !selected.is_empty()) {
            let mut args: Vec<String> = selected.iter().map(|s| s.to_string()).collect();
            if origin {
                args.push("--origin".to_string());
            }
            return Err(CommandError::ArgumentCombination { args });
        }

        Ok(match (sso || sso_passcode, client_credentials) {
            (true, _) => LoginMode::SsoPasscode,
            (false, true) => LoginMode::ClientCredentials,
            (false, false) => LoginMode::Password,
        })
    }

    pub fn grant_type(self) -> GrantType {
        match self {
            LoginMode::ClientCredentials => GrantType::ClientCredentials,
            LoginMode::Password | LoginMode::SsoPasscode => GrantType::Password,
        }
    }
}

/// Values given on the command line or in the environment
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Presupplied {
    pub username: Option<String>,
    pub password: Option<String>,
    pub passcode: Option<String>,
}

impl Presupplied {
    /// Value that answers the prompt `key`, if any was supplied
    pub fn value_for(&self, key: &str) -> Option<&str> {
        let value = match key {
            USERNAME_KEY | CLIENT_ID_KEY => self.username.as_deref(),
            PASSWORD_KEY | CLIENT_SECRET_KEY => self.password.as_deref(),
            PASSCODE_KEY => self.passcode.as_deref(),
            _ => None,
        };
        value.filter(|v| !v.is_empty())
    }
}

impl fmt::Debug for Presupplied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Presupplied")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("passcode", &self.passcode.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Values collected for one authentication attempt
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialSet {
    values: BTreeMap<String, String>,
}

impl CredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CredentialSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = CredentialSet::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

/// Everything the negotiator needs for one login
#[derive(Debug, Clone, Default)]
pub struct LoginRequest {
    pub mode: LoginMode,
    pub origin: Option<String>,
    pub presupplied: Presupplied,
}

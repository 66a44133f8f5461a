//! Interactive credential negotiation
//!
//! Collects values for the planned prompts, submits them, and retries
//! rejected credentials up to [`MAX_LOGIN_ATTEMPTS`] times.

use super::{CredentialSet, LoginMode, LoginRequest, PlannedPrompt, PromptKind, PromptPlan};
use crate::actor::AuthActor;
use crate::error::{ActorError, CommandError};
use crate::ui::{Ui, UiError};
use tracing::debug;

/// Attempts before giving up on rejected credentials
pub const MAX_LOGIN_ATTEMPTS: u32 = 3;

const REJECTED_WARNING: &str = "Credentials were rejected, please try again.";

/// Result of one authentication attempt
#[derive(Debug, PartialEq)]
pub enum AttemptOutcome {
    /// Authenticated as the contained user
    Success(String),
    /// Credentials rejected, another attempt may succeed
    Retryable(String),
    /// Account locked, retrying is pointless
    Locked(String),
    /// Anything else; surfaced as-is
    Fatal(ActorError),
}

impl AttemptOutcome {
    pub fn classify(result: Result<String, ActorError>) -> Self {
        match result {
            Ok(user) => AttemptOutcome::Success(user),
            Err(ActorError::Unauthorized { message }) => AttemptOutcome::Retryable(message),
            Err(ActorError::AccountLocked { message }) => AttemptOutcome::Locked(message),
            Err(err) => AttemptOutcome::Fatal(err),
        }
    }
}

/// Drives the login prompt/authenticate loop
pub struct CredentialNegotiator<'a, A: ?Sized, U: ?Sized> {
    actor: &'a A,
    ui: &'a U,
}

impl<'a, A, U> CredentialNegotiator<'a, A, U>
where
    A: AuthActor + ?Sized,
    U: Ui + ?Sized,
{
    pub fn new(actor: &'a A, ui: &'a U) -> Self {
        Self { actor, ui }
    }

    /// Authenticate and return the logged-in user name
    pub async fn negotiate(&self, request: &LoginRequest) -> Result<String, CommandError> {
        let server_prompts = match request.mode {
            LoginMode::ClientCredentials => Vec::new(),
            LoginMode::Password | LoginMode::SsoPasscode => self.actor.get_login_prompts().await?,
        };
        let plan = PromptPlan::build(&server_prompts, request.mode);
        let grant_type = request.mode.grant_type();
        debug!(mode = ?request.mode, prompts = plan.prompts().len(), "starting login negotiation");

        for attempt in 1..=MAX_LOGIN_ATTEMPTS {
            let credentials = self
                .collect(&plan, request, attempt)
                .map_err(|e| {
                    debug!(attempt, error = %e, "prompt failed");
                    CommandError::UnableToAuthenticate
                })?;

            self.ui.display_newline();
            self.ui.display_text("Authenticating...");

            let result = self
                .actor
                .authenticate(&credentials, request.origin.as_deref(), grant_type)
                .await;
            drop(credentials);

            match AttemptOutcome::classify(result) {
                AttemptOutcome::Success(user) => {
                    debug!(attempt, "authenticated");
                    self.ui.display_ok();
                    return Ok(user);
                }
                AttemptOutcome::Retryable(reason) => {
                    debug!(attempt, %reason, "credentials rejected");
                    self.ui.display_warning(REJECTED_WARNING);
                }
                AttemptOutcome::Locked(message) => {
                    self.ui.display_warning(&message);
                    return Err(CommandError::AccountLocked { message });
                }
                AttemptOutcome::Fatal(err) => return Err(CommandError::Actor(err)),
            }
        }

        Err(CommandError::UnableToAuthenticate)
    }

    fn collect(
        &self,
        plan: &PromptPlan,
        request: &LoginRequest,
        attempt: u32,
    ) -> Result<CredentialSet, UiError> {
        let mut credentials = CredentialSet::new();
        for prompt in plan.prompts() {
            let supplied = (attempt == 1)
                .then(|| request.presupplied.value_for(&prompt.key))
                .flatten();
            let value = match supplied {
                Some(value) => value.to_string(),
                None => self.ask(prompt)?,
            };
            credentials.insert(prompt.key.clone(), value);
        }
        Ok(credentials)
    }

    fn ask(&self, prompt: &PlannedPrompt) -> Result<String, UiError> {
        match prompt.kind {
            PromptKind::Text => self.ui.display_text_prompt(&prompt.label),
            PromptKind::Secret => self.ui.display_password_prompt(&prompt.label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthPrompt, GrantType, Presupplied};
    use crate::testing::{BufferUi, FakeActor};

    fn password_prompts() -> Vec<AuthPrompt> {
        vec![
            AuthPrompt::new("password", "Password", PromptKind::Secret),
            AuthPrompt::new("username", "Email", PromptKind::Text),
        ]
    }

    fn unauthorized() -> ActorError {
        ActorError::Unauthorized {
            message: "Bad credentials".to_string(),
        }
    }

    #[test]
    fn classify_maps_errors() {
        assert_eq!(
            AttemptOutcome::classify(Ok("faceman".to_string())),
            AttemptOutcome::Success("faceman".to_string())
        );
        assert_eq!(
            AttemptOutcome::classify(Err(unauthorized())),
            AttemptOutcome::Retryable("Bad credentials".to_string())
        );
        assert_eq!(
            AttemptOutcome::classify(Err(ActorError::AccountLocked {
                message: "locked".to_string()
            })),
            AttemptOutcome::Locked("locked".to_string())
        );
        assert!(matches!(
            AttemptOutcome::classify(Err(ActorError::Other("boom".to_string()))),
            AttemptOutcome::Fatal(ActorError::Other(_))
        ));
    }

    #[tokio::test]
    async fn presupplied_credentials_skip_prompts() {
        let actor = FakeActor::new();
        actor.set_login_prompts(password_prompts());
        actor.push_authenticate(Ok("faceman".to_string()));
        let ui = BufferUi::new();

        let request = LoginRequest {
            presupplied: Presupplied {
                username: Some("faceman".to_string()),
                password: Some("hunter2".to_string()),
                passcode: None,
            },
            ..LoginRequest::default()
        };
        let user = CredentialNegotiator::new(&actor, &ui)
            .negotiate(&request)
            .await
            .unwrap();

        assert_eq!(user, "faceman");
        let calls = actor.authenticate_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].credentials.get("username"), Some("faceman"));
        assert_eq!(calls[0].credentials.get("password"), Some("hunter2"));
        assert_eq!(calls[0].grant_type, GrantType::Password);
        assert!(ui.prompts().is_empty());
        assert!(ui.out().contains("Authenticating..."));
        assert!(ui.out().contains("OK"));
    }

    #[tokio::test]
    async fn rejected_credentials_are_reprompted() {
        let actor = FakeActor::new();
        actor.set_login_prompts(password_prompts());
        actor.push_authenticate(Err(unauthorized()));
        actor.push_authenticate(Err(unauthorized()));
        actor.push_authenticate(Ok("faceman".to_string()));
        let ui = BufferUi::new();
        ui.push_input("faceman");
        ui.push_input("second-pass");
        ui.push_input("faceman");
        ui.push_input("third-pass");

        let request = LoginRequest {
            presupplied: Presupplied {
                username: Some("faceman".to_string()),
                password: Some("first-pass".to_string()),
                passcode: None,
            },
            ..LoginRequest::default()
        };
        let user = CredentialNegotiator::new(&actor, &ui)
            .negotiate(&request)
            .await
            .unwrap();

        assert_eq!(user, "faceman");
        let calls = actor.authenticate_calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].credentials.get("password"), Some("first-pass"));
        assert_eq!(calls[1].credentials.get("password"), Some("second-pass"));
        assert_eq!(calls[2].credentials.get("password"), Some("third-pass"));
        assert_eq!(ui.prompts(), vec!["Email", "Password", "Email", "Password"]);
        assert_eq!(
            ui.err().matches("Credentials were rejected, please try again.").count(),
            2
        );
    }

    #[tokio::test]
    async fn gives_up_after_three_rejections() {
        let actor = FakeActor::new();
        actor.set_login_prompts(password_prompts());
        for _ in 0..3 {
            actor.push_authenticate(Err(unauthorized()));
        }
        let ui = BufferUi::new();
        for _ in 0..3 {
            ui.push_input("faceman");
            ui.push_input("wrong");
        }

        let err = CredentialNegotiator::new(&actor, &ui)
            .negotiate(&LoginRequest::default())
            .await
            .unwrap_err();

        assert_eq!(err, CommandError::UnableToAuthenticate);
        assert_eq!(actor.authenticate_calls().len(), 3);
    }

    #[tokio::test]
    async fn account_locked_stops_immediately() {
        let actor = FakeActor::new();
        actor.set_login_prompts(password_prompts());
        actor.push_authenticate(Err(ActorError::AccountLocked {
            message: "Your account has been locked because of too many failed attempts to login."
                .to_string(),
        }));
        let ui = BufferUi::new();
        ui.push_input("faceman");
        ui.push_input("wrong");

        let err = CredentialNegotiator::new(&actor, &ui)
            .negotiate(&LoginRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::AccountLocked { .. }));
        assert_eq!(actor.authenticate_calls().len(), 1);
        assert!(ui.err().contains("Your account has been locked"));
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let actor = FakeActor::new();
        actor.set_login_prompts(password_prompts());
        actor.push_authenticate(Err(ActorError::Other("uaa exploded".to_string())));
        let ui = BufferUi::new();
        ui.push_input("faceman");
        ui.push_input("pass");

        let err = CredentialNegotiator::new(&actor, &ui)
            .negotiate(&LoginRequest::default())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            CommandError::Actor(ActorError::Other("uaa exploded".to_string()))
        );
        assert_eq!(actor.authenticate_calls().len(), 1);
    }

    #[tokio::test]
    async fn sso_submits_only_the_passcode() {
        let actor = FakeActor::new();
        actor.set_login_prompts(vec![
            AuthPrompt::new("passcode", "Temporary Authentication Code", PromptKind::Secret),
            AuthPrompt::new("password", "Password", PromptKind::Secret),
        ]);
        actor.push_authenticate(Ok("faceman".to_string()));
        let ui = BufferUi::new();
        ui.push_input("some-passcode");

        let request = LoginRequest {
            mode: LoginMode::SsoPasscode,
            ..LoginRequest::default()
        };
        CredentialNegotiator::new(&actor, &ui)
            .negotiate(&request)
            .await
            .unwrap();

        assert_eq!(ui.prompts(), vec!["Temporary Authentication Code"]);
        let calls = actor.authenticate_calls();
        assert_eq!(calls.len(), 1);
        let keys: Vec<&str> = calls[0].credentials.keys().collect();
        assert_eq!(keys, vec!["passcode"]);
        assert_eq!(calls[0].credentials.get("passcode"), Some("some-passcode"));
    }

    #[tokio::test]
    async fn closed_input_ends_negotiation() {
        let actor = FakeActor::new();
        actor.set_login_prompts(password_prompts());
        let ui = BufferUi::new();
        ui.push_input("faceman");

        let err = CredentialNegotiator::new(&actor, &ui)
            .negotiate(&LoginRequest::default())
            .await
            .unwrap_err();

        assert_eq!(err, CommandError::UnableToAuthenticate);
        assert!(actor.authenticate_calls().is_empty());
    }

    #[tokio::test]
    async fn client_credentials_skip_server_prompts() {
        let actor = FakeActor::new();
        actor.push_authenticate(Ok("ci-bot".to_string()));
        let ui = BufferUi::new();

        let request = LoginRequest {
            mode: LoginMode::ClientCredentials,
            presupplied: Presupplied {
                username: Some("ci-bot".to_string()),
                password: Some("secret".to_string()),
                passcode: None,
            },
            ..LoginRequest::default()
        };
        CredentialNegotiator::new(&actor, &ui)
            .negotiate(&request)
            .await
            .unwrap();

        assert_eq!(actor.login_prompt_calls(), 0);
        let calls = actor.authenticate_calls();
        assert_eq!(calls[0].grant_type, GrantType::ClientCredentials);
        assert_eq!(calls[0].credentials.get("client_id"), Some("ci-bot"));
        assert_eq!(calls[0].credentials.get("client_secret"), Some("secret"));
    }

    #[tokio::test]
    async fn origin_is_forwarded() {
        let actor = FakeActor::new();
        actor.set_login_prompts(password_prompts());
        actor.push_authenticate(Ok("faceman".to_string()));
        let ui = BufferUi::new();
        ui.push_input("faceman");
        ui.push_input("pass");

        let request = LoginRequest {
            origin: Some("ldap".to_string()),
            ..LoginRequest::default()
        };
        CredentialNegotiator::new(&actor, &ui)
            .negotiate(&request)
            .await
            .unwrap();

        assert_eq!(
            actor.authenticate_calls()[0].origin.as_deref(),
            Some("ldap")
        );
    }
}

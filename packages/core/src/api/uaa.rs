//! UAA: login prompts and OAuth token grants

use super::{CloudClient, error_message, request_error};
use crate::actor::{AuthActor, TokenRefreshStream, TokenRefresher};
use crate::auth::{
    AuthPrompt, CLIENT_ID_KEY, CLIENT_SECRET_KEY, CredentialSet, GrantType, PromptKind,
};
use crate::config::token;
use crate::error::ActorError;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct LoginInfo {
    #[serde(default)]
    prompts: BTreeMap<String, (String, String)>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Map a rejected grant onto the actor error the negotiator classifies
fn grant_error(status: u16, url: &str, message: String) -> ActorError {
    match status {
        401 if message.to_ascii_lowercase().contains("locked") => {
            ActorError::AccountLocked { message }
        }
        401 => ActorError::Unauthorized { message },
        _ => ActorError::Api {
            status,
            url: url.to_string(),
            message,
        },
    }
}

impl CloudClient {
    fn uaa_url(&self) -> Result<String, ActorError> {
        self.config()
            .read(|c| c.uaa_endpoint.clone().or(c.authorization_endpoint.clone()))
            .ok_or(ActorError::NoApiTargeted)
    }

    /// POST a grant to `{uaa}/oauth/token` and store the resulting tokens
    async fn request_token(
        &self,
        form: &[(&str, &str)],
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenResponse, ActorError> {
        let url = format!("{}/oauth/token", self.uaa_url()?);
        debug!(%url, grant_type = form.first().map(|(_, v)| *v), "requesting token");
        let response = self
            .http()
            .post(&url)
            .basic_auth(client_id, Some(client_secret))
            .header(ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| request_error(&url, e))?;

        if !response.status().is_success() {
            let (status, message) = error_message(response).await;
            return Err(grant_error(status, &url, message));
        }

        let tokens: TokenResponse = response.json().await.map_err(|e| ActorError::Decode {
            url: url.clone(),
            message: e.to_string(),
        })?;

        self.config().update(|c| {
            c.access_token = Some(format!("{} {}", tokens.token_type, tokens.access_token));
            if tokens.refresh_token.is_some() {
                c.refresh_token = tokens.refresh_token.clone();
            }
        });
        Ok(tokens)
    }

    /// Exchange the stored refresh token (or client credentials) for a new
    /// access token
    pub async fn refresh_access_token(&self) -> Result<(), ActorError> {
        let (grant, refresh_token, client, secret) = self.config().read(|c| {
            (
                c.uaa_grant_type.clone(),
                c.refresh_token.clone(),
                c.uaa_client.clone(),
                c.uaa_client_secret.clone(),
            )
        });

        if grant.as_deref() == Some(GrantType::ClientCredentials.as_str()) {
            self.request_token(
                &[("grant_type", GrantType::ClientCredentials.as_str())],
                &client,
                &secret,
            )
            .await?;
        } else {
            let refresh_token = refresh_token
                .filter(|t| !t.is_empty())
                .ok_or(ActorError::NotLoggedIn)?;
            self.request_token(
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", &refresh_token),
                    ("token_format", "jwt"),
                ],
                &client,
                &secret,
            )
            .await?;
        }

        // Persist so the next invocation starts with the fresh token
        self.config()
            .save()
            .map_err(|e| ActorError::Config(e.to_string()))?;
        debug!("access token refreshed");
        Ok(())
    }
}

#[async_trait]
impl AuthActor for CloudClient {
    async fn get_login_prompts(&self) -> Result<Vec<AuthPrompt>, ActorError> {
        let login = self
            .config()
            .read(|c| c.authorization_endpoint.clone())
            .ok_or(ActorError::NoApiTargeted)?;
        let url = format!("{login}/login");
        debug!(%url, "fetching login prompts");
        let response = self
            .http()
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| request_error(&url, e))?;
        let info: LoginInfo = super::decode_response(&url, response).await?.0;

        Ok(info
            .prompts
            .into_iter()
            .map(|(key, (kind, display_name))| {
                AuthPrompt::new(key, display_name, PromptKind::from_server_type(&kind))
            })
            .collect())
    }

    async fn authenticate(
        &self,
        credentials: &CredentialSet,
        origin: Option<&str>,
        grant_type: GrantType,
    ) -> Result<String, ActorError> {
        let tokens = match grant_type {
            GrantType::ClientCredentials => {
                let client_id = credentials.get(CLIENT_ID_KEY).unwrap_or_default();
                let client_secret = credentials.get(CLIENT_SECRET_KEY).unwrap_or_default();
                let tokens = self
                    .request_token(
                        &[("grant_type", grant_type.as_str())],
                        client_id,
                        client_secret,
                    )
                    .await?;
                self.config().update(|c| {
                    c.uaa_grant_type = Some(grant_type.as_str().to_string());
                    c.uaa_client = client_id.to_string();
                    c.uaa_client_secret = client_secret.to_string();
                    c.refresh_token = None;
                });
                tokens
            }
            GrantType::Password => {
                let login_hint = origin.map(|o| serde_json::json!({ "origin": o }).to_string());
                let mut form: Vec<(&str, &str)> = vec![("grant_type", grant_type.as_str())];
                form.extend(credentials.iter());
                if let Some(hint) = login_hint.as_deref() {
                    form.push(("login_hint", hint));
                }
                let (client, secret) = self
                    .config()
                    .read(|c| (c.uaa_client.clone(), c.uaa_client_secret.clone()));
                let tokens = self.request_token(&form, &client, &secret).await?;
                self.config().update(|c| c.uaa_grant_type = None);
                tokens
            }
        };

        token::user_name_from_token(&tokens.access_token)
    }
}

impl TokenRefresher for CloudClient {
    fn schedule_token_refresh(&self, period: Duration) -> Result<TokenRefreshStream, ActorError> {
        self.access_token()?;
        if period.is_zero() {
            return Err(ActorError::Config(
                "token refresh interval must be greater than zero".to_string(),
            ));
        }

        let (senders, stream) = TokenRefreshStream::channel();
        let client = self.clone();
        debug!(period = ?period, "scheduling token refresh");
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = senders.stop.cancelled() => break,
                    _ = tokio::time::sleep(period) => {
                        if let Err(err) = client.refresh_access_token().await {
                            warn!(error = %err, "token refresh failed");
                            if senders.errors.try_send(err).is_err() {
                                break;
                            }
                        }
                    }
                }
            }
            debug!("token refresher stopped");
            drop(senders.errors);
            senders.stop.acknowledge();
        });
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ConfigStore};

    #[test]
    fn login_prompts_decode_server_tuples() {
        let info: LoginInfo = serde_json::from_str(
            r#"{"app":{"version":"4.30.0"},"prompts":{"username":["text","Email"],"password":["password","Password"],"passcode":["password","Temporary Authentication Code"]}}"#,
        )
        .unwrap();
        assert_eq!(info.prompts["username"], ("text".to_string(), "Email".to_string()));
        assert_eq!(info.prompts.len(), 3);
    }

    #[test]
    fn rejected_grants_are_classified() {
        assert!(matches!(
            grant_error(401, "u", "Bad credentials".to_string()),
            ActorError::Unauthorized { .. }
        ));
        assert!(matches!(
            grant_error(
                401,
                "u",
                "Your account has been locked because of too many failed attempts to login."
                    .to_string()
            ),
            ActorError::AccountLocked { .. }
        ));
        assert!(matches!(
            grant_error(500, "u", "boom".to_string()),
            ActorError::Api { status: 500, .. }
        ));
    }

    #[tokio::test]
    async fn refresh_needs_a_session() {
        let client = CloudClient::new(ConfigStore::in_memory(Config::default())).unwrap();
        assert!(matches!(
            client.schedule_token_refresh(Duration::from_secs(60)),
            Err(ActorError::NotLoggedIn)
        ));
    }

    #[tokio::test]
    async fn refresher_acknowledges_cancel() {
        let token = token::encode_test_token(&serde_json::json!({"user_name": "faceman"}));
        let client = CloudClient::new(ConfigStore::in_memory(Config {
            access_token: Some(format!("bearer {token}")),
            ..Config::default()
        }))
        .unwrap();
        let stream = client
            .schedule_token_refresh(Duration::from_secs(3600))
            .unwrap();
        stream.canceller.cancel().await;
    }
}

//! Access token inspection
//!
//! UAA access tokens are JWTs; the CLI only reads the claims it displays.
//! Signatures are not verified here, the API does that on every request.

use crate::error::ActorError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TokenClaims {
    user_name: Option<String>,
    client_id: Option<String>,
}

fn decode_claims(token: &str) -> Result<TokenClaims, ActorError> {
    let token = token
        .strip_prefix("bearer ")
        .or_else(|| token.strip_prefix("Bearer "))
        .unwrap_or(token);
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| ActorError::Config("access token is not a JWT".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| ActorError::Config(format!("access token payload is not base64: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ActorError::Config(format!("access token claims are invalid: {e}")))
}

/// Name shown for the token owner: the user for password grants, the
/// client for client-credentials grants
pub fn user_name_from_token(token: &str) -> Result<String, ActorError> {
    let claims = decode_claims(token)?;
    claims
        .user_name
        .or(claims.client_id)
        .ok_or_else(|| ActorError::Config("access token has no user_name claim".to_string()))
}

/// Build an unsigned JWT carrying `claims`
#[cfg(any(test, feature = "test-support"))]
pub fn encode_test_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}

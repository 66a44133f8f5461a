//! HTTP-backed actor
//!
//! [`CloudClient`] implements every actor trait against the platform's
//! public APIs:
//! - [`uaa`]: login prompts, token grants and refreshes
//! - [`cloud_controller`]: targeting, orgs/spaces, apps, restart, summaries
//! - [`log_cache`]: recent and tailed app logs
//!
//! Endpoints and tokens live in the shared [`ConfigStore`]; the client reads
//! them per request and writes back what targeting and login discover.

pub mod cloud_controller;
pub mod log_cache;
pub mod uaa;

use crate::actor::Warnings;
use crate::config::ConfigStore;
use crate::error::ActorError;
use percent_encoding::percent_decode_str;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const WARNINGS_HEADER: &str = "x-cf-warnings";

/// Remote actor over reqwest
///
/// Cheap to clone; clones share the HTTP client and the config store.
#[derive(Debug, Clone)]
pub struct CloudClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    config: ConfigStore,
    http: RwLock<reqwest::Client>,
}

impl CloudClient {
    pub fn new(config: ConfigStore) -> Result<Self, ActorError> {
        let skip_ssl_validation = config.read(|c| c.skip_ssl_validation);
        let http = build_http_client(skip_ssl_validation)?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                http: RwLock::new(http),
            }),
        })
    }

    pub fn config(&self) -> &ConfigStore {
        &self.inner.config
    }

    fn http(&self) -> reqwest::Client {
        self.inner
            .http
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap the HTTP client, e.g. when TLS validation settings change
    fn rebuild_http(&self, skip_ssl_validation: bool) -> Result<(), ActorError> {
        let http = build_http_client(skip_ssl_validation)?;
        *self
            .inner
            .http
            .write()
            .unwrap_or_else(PoisonError::into_inner) = http;
        Ok(())
    }

    /// Targeted cloud controller URL
    fn api_url(&self) -> Result<String, ActorError> {
        self.config().target().ok_or(ActorError::NoApiTargeted)
    }

    /// Stored access token, already carrying its "bearer" prefix
    fn access_token(&self) -> Result<String, ActorError> {
        self.config()
            .read(|c| c.access_token.clone())
            .filter(|t| !t.is_empty())
            .ok_or(ActorError::NotLoggedIn)
    }

    /// Authenticated GET returning decoded JSON and CC warnings
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<(T, Warnings), ActorError> {
        let token = self.access_token()?;
        debug!(%url, "GET");
        let response = self
            .http()
            .get(url)
            .query(query)
            .header(AUTHORIZATION, token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| request_error(url, e))?;
        decode_response(url, response).await
    }

    /// Authenticated request with a JSON body, returning decoded JSON
    async fn send_json<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: &B,
    ) -> Result<(T, Warnings), ActorError> {
        let token = self.access_token()?;
        debug!(%url, %method, "sending");
        let response = self
            .http()
            .request(method, url)
            .header(AUTHORIZATION, token)
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;
        decode_response(url, response).await
    }

    /// GET every page of a CC v3 list endpoint
    async fn get_all_resources<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<(Vec<T>, Warnings), ActorError> {
        let (mut page, mut warnings): (Page<T>, Warnings) = self.get_json(url, query).await?;
        let mut resources = std::mem::take(&mut page.resources);
        while let Some(next) = page.pagination.and_then(|p| p.next).map(|n| n.href) {
            let (next_page, more): (Page<T>, Warnings) = self.get_json(&next, &[]).await?;
            warnings.extend(more);
            page = next_page;
            resources.append(&mut page.resources);
        }
        Ok((resources, warnings))
    }
}

fn build_http_client(skip_ssl_validation: bool) -> Result<reqwest::Client, ActorError> {
    reqwest::Client::builder()
        .user_agent(format!("skyport/{}", env!("CARGO_PKG_VERSION")))
        .timeout(REQUEST_TIMEOUT)
        .danger_accept_invalid_certs(skip_ssl_validation)
        .build()
        .map_err(|e| ActorError::Other(format!("Failed to build HTTP client: {e}")))
}

fn request_error(url: &str, err: reqwest::Error) -> ActorError {
    ActorError::Request {
        url: url.to_string(),
        message: err.to_string(),
    }
}

/// CC v3 list response
#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    resources: Vec<T>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    next: Option<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
}

/// Error bodies from CC v2 (`description`), CC v3 (`errors[].detail`) and
/// UAA (`error_description`)
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    description: Option<String>,
    error_description: Option<String>,
    #[serde(default)]
    errors: Vec<V3Error>,
}

#[derive(Debug, Deserialize)]
struct V3Error {
    detail: String,
}

impl ErrorBody {
    fn message(self, fallback: &str) -> String {
        if !self.errors.is_empty() {
            return self
                .errors
                .into_iter()
                .map(|e| e.detail)
                .collect::<Vec<_>>()
                .join(", ");
        }
        self.description
            .or(self.error_description)
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Split a non-success response into status and server message
async fn error_message(response: reqwest::Response) -> (u16, String) {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let fallback = if text.trim().is_empty() {
        status.to_string()
    } else {
        text.clone()
    };
    let message = serde_json::from_str::<ErrorBody>(&text)
        .unwrap_or_default()
        .message(&fallback);
    (status.as_u16(), message)
}

async fn decode_response<T: DeserializeOwned>(
    url: &str,
    response: reqwest::Response,
) -> Result<(T, Warnings), ActorError> {
    let warnings = warnings_from_headers(response.headers());
    if !response.status().is_success() {
        let (status, message) = error_message(response).await;
        debug!(%url, status, "request failed");
        return Err(ActorError::Api {
            status,
            url: url.to_string(),
            message,
        });
    }

    let bytes = response.bytes().await.map_err(|e| request_error(url, e))?;
    // 202/204 responses may carry no body
    let body: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
    let value = serde_json::from_slice(body).map_err(|e| ActorError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    Ok((value, warnings))
}

/// Parse the comma-separated, percent-encoded `X-Cf-Warnings` header
fn warnings_from_headers(headers: &HeaderMap) -> Warnings {
    headers
        .get_all(WARNINGS_HEADER)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|w| unescape_warning(w.trim()))
        .filter(|w| !w.is_empty())
        .collect()
}

/// Query-style unescape: `+` is a space, `%XX` a byte, malformed escapes
/// stay as written
fn unescape_warning(input: &str) -> String {
    percent_decode_str(&input.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use reqwest::header::HeaderValue;

    #[test]
    fn warnings_header_is_decoded() {
        let mut headers = HeaderMap::new();
        headers.insert(
            WARNINGS_HEADER,
            HeaderValue::from_static("app%20is%20big,second+warning"),
        );
        assert_eq!(
            warnings_from_headers(&headers),
            vec!["app is big".to_string(), "second warning".to_string()]
        );
    }

    #[test]
    fn malformed_escapes_are_kept() {
        assert_eq!(unescape_warning("100%"), "100%");
        assert_eq!(unescape_warning("%zz"), "%zz");
        assert_eq!(unescape_warning("%41"), "A");
        assert_eq!(unescape_warning("1%2B1"), "1+1");
    }

    #[test]
    fn error_body_prefers_v3_details() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"errors":[{"detail":"App not found","title":"CF-ResourceNotFound","code":10010}]}"#,
        )
        .unwrap();
        assert_eq!(body.message("fallback"), "App not found");

        let body: ErrorBody =
            serde_json::from_str(r#"{"error":"unauthorized","error_description":"Bad credentials"}"#)
                .unwrap();
        assert_eq!(body.message("fallback"), "Bad credentials");
    }

    #[test]
    fn requests_need_a_target_and_token() {
        let client = CloudClient::new(ConfigStore::in_memory(Config::default())).unwrap();
        assert_eq!(client.api_url(), Err(ActorError::NoApiTargeted));
        assert_eq!(client.access_token(), Err(ActorError::NotLoggedIn));
    }
}

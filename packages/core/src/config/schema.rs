//! Configuration schema for skyport
//!
//! Defines the structure and defaults for the config.json file.

use serde::{Deserialize, Serialize};

/// Org or space the user has targeted
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TargetedResource {
    pub guid: String,
    pub name: String,
}

/// Main configuration structure for skyport
///
/// Serialized to/from `~/.config/skyport/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Config file version for migrations
    pub version: u32,

    /// Cloud controller API endpoint (e.g. "https://api.example.com")
    #[serde(default)]
    pub target: Option<String>,

    /// Cloud controller API version reported by the root endpoint
    #[serde(default)]
    pub api_version: Option<String>,

    /// Skip TLS certificate verification for all endpoints
    #[serde(default)]
    pub skip_ssl_validation: bool,

    /// Login server, source of the login prompts
    #[serde(default)]
    pub authorization_endpoint: Option<String>,

    /// UAA token endpoint base
    #[serde(default)]
    pub uaa_endpoint: Option<String>,

    #[serde(default)]
    pub log_cache_endpoint: Option<String>,

    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Grant type used for the stored tokens ("password" or "client_credentials")
    #[serde(default)]
    pub uaa_grant_type: Option<String>,

    /// OAuth client used for password grants (default: "cf")
    #[serde(default = "default_uaa_client")]
    pub uaa_client: String,

    #[serde(default)]
    pub uaa_client_secret: String,

    #[serde(default)]
    pub targeted_organization: Option<TargetedResource>,

    #[serde(default)]
    pub targeted_space: Option<TargetedResource>,

    /// Seconds to wait for staging before giving up (default: 900)
    #[serde(default = "default_staging_timeout_secs")]
    pub staging_timeout_secs: u64,

    /// Seconds to wait for an instance to start (default: 300)
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    /// Seconds between staging/startup polls (default: 5)
    #[serde(default = "default_polling_interval_secs")]
    pub polling_interval_secs: u64,

    /// Seconds between token refreshes while streaming (default: 60)
    #[serde(default = "default_token_refresh_interval_secs")]
    pub token_refresh_interval_secs: u64,
}

fn default_uaa_client() -> String {
    "cf".to_string()
}

fn default_staging_timeout_secs() -> u64 {
    900
}

fn default_startup_timeout_secs() -> u64 {
    300
}

fn default_polling_interval_secs() -> u64 {
    5
}

fn default_token_refresh_interval_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            target: None,
            api_version: None,
            skip_ssl_validation: false,
            authorization_endpoint: None,
            uaa_endpoint: None,
            log_cache_endpoint: None,
            access_token: None,
            refresh_token: None,
            uaa_grant_type: None,
            uaa_client: default_uaa_client(),
            uaa_client_secret: String::new(),
            targeted_organization: None,
            targeted_space: None,
            staging_timeout_secs: default_staging_timeout_secs(),
            startup_timeout_secs: default_startup_timeout_secs(),
            polling_interval_secs: default_polling_interval_secs(),
            token_refresh_interval_secs: default_token_refresh_interval_secs(),
        }
    }
}

impl Config {
    /// Create a new Config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// True when an access token is stored
    pub fn is_logged_in(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// True while the UAA client is the stock public one with no secret
    pub fn uses_default_uaa_client(&self) -> bool {
        self.uaa_client == default_uaa_client() && self.uaa_client_secret.is_empty()
    }

    /// Drop tokens, client credentials and targets, keeping the API endpoint
    pub fn clear_session(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.uaa_grant_type = None;
        self.uaa_client = default_uaa_client();
        self.uaa_client_secret.clear();
        self.targeted_organization = None;
        self.targeted_space = None;
    }

    /// Forget everything tied to the current API endpoint
    pub fn clear_target(&mut self) {
        self.clear_session();
        self.target = None;
        self.api_version = None;
        self.authorization_endpoint = None;
        self.uaa_endpoint = None;
        self.log_cache_endpoint = None;
    }

    pub fn set_organization(&mut self, guid: &str, name: &str) {
        self.targeted_organization = Some(TargetedResource {
            guid: guid.to_string(),
            name: name.to_string(),
        });
        self.targeted_space = None;
    }

    pub fn set_space(&mut self, guid: &str, name: &str) {
        self.targeted_space = Some(TargetedResource {
            guid: guid.to_string(),
            name: name.to_string(),
        });
    }

    pub fn targeted_organization_name(&self) -> Option<&str> {
        self.targeted_organization.as_ref().map(|o| o.name.as_str())
    }

    pub fn targeted_space_name(&self) -> Option<&str> {
        self.targeted_space.as_ref().map(|s| s.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, 1);
        assert_eq!(config.uaa_client, "cf");
        assert!(config.uaa_client_secret.is_empty());
        assert_eq!(config.staging_timeout_secs, 900);
        assert_eq!(config.startup_timeout_secs, 300);
        assert_eq!(config.polling_interval_secs, 5);
        assert_eq!(config.token_refresh_interval_secs, 60);
        assert!(!config.is_logged_in());
    }

    #[test]
    fn test_deserialize_with_missing_optional_fields() {
        let json = r#"{"version": 1, "target": "https://api.example.com"}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.target.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.uaa_client, "cf");
        assert_eq!(config.staging_timeout_secs, 900);
        assert!(config.targeted_space.is_none());
    }

    #[test]
    fn test_reject_unknown_fields() {
        let json = r#"{"version": 1, "unknown_field": "value"}"#;
        let result: Result<Config, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn set_organization_clears_space() {
        let mut config = Config::default();
        config.set_space("space-guid", "dev");
        config.set_organization("org-guid", "acme");
        assert_eq!(config.targeted_organization_name(), Some("acme"));
        assert!(config.targeted_space.is_none());
    }

    #[test]
    fn clear_session_keeps_endpoint() {
        let mut config = Config {
            target: Some("https://api.example.com".to_string()),
            access_token: Some("token".to_string()),
            refresh_token: Some("refresh".to_string()),
            ..Config::default()
        };
        config.set_organization("org-guid", "acme");
        config.clear_session();
        assert!(!config.is_logged_in());
        assert!(config.refresh_token.is_none());
        assert!(config.targeted_organization.is_none());
        assert_eq!(config.target.as_deref(), Some("https://api.example.com"));
    }

    #[test]
    fn clear_session_resets_service_account_client() {
        let mut config = Config {
            access_token: Some("bearer token".to_string()),
            uaa_grant_type: Some("client_credentials".to_string()),
            uaa_client: "ci-bot".to_string(),
            uaa_client_secret: "ci-secret".to_string(),
            ..Config::default()
        };
        assert!(!config.uses_default_uaa_client());

        config.clear_session();
        assert!(config.uaa_grant_type.is_none());
        assert_eq!(config.uaa_client, "cf");
        assert!(config.uaa_client_secret.is_empty());
        assert!(config.uses_default_uaa_client());
    }
}

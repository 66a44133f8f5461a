//! Configuration validation with actionable error messages
//!
//! Validates the configuration and names the config key to fix.

use super::schema::Config;

/// A configuration validation error with an actionable fix
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// The config field that has an error
    pub field: String,
    /// Description of what's wrong
    pub message: String,
    /// How to fix the issue
    pub fix_command: String,
}

/// A configuration validation warning (non-fatal)
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub fix_command: String,
}

/// Validate configuration and return warnings or first error
///
/// Returns Ok(warnings) if validation passes (possibly with non-fatal warnings).
/// Returns Err(error) on the first fatal validation error encountered.
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>, ValidationError> {
    let mut warnings = Vec::new();

    let intervals = [
        ("staging_timeout_secs", config.staging_timeout_secs, 900),
        ("startup_timeout_secs", config.startup_timeout_secs, 300),
        ("polling_interval_secs", config.polling_interval_secs, 5),
        (
            "token_refresh_interval_secs",
            config.token_refresh_interval_secs,
            60,
        ),
    ];
    for (field, value, default) in intervals {
        if value == 0 {
            return Err(ValidationError {
                field: field.to_string(),
                message: format!("{field} must be > 0"),
                fix_command: format_fix(field, &default.to_string()),
            });
        }
    }

    if config.polling_interval_secs > config.startup_timeout_secs {
        return Err(ValidationError {
            field: "polling_interval_secs".to_string(),
            message: "polling_interval_secs must not exceed startup_timeout_secs".to_string(),
            fix_command: format_fix("polling_interval_secs", "5"),
        });
    }

    if let Some(target) = config.target.as_deref()
        && !(target.starts_with("https://") || target.starts_with("http://"))
    {
        return Err(ValidationError {
            field: "target".to_string(),
            message: format!("target '{target}' is not an http(s) URL"),
            fix_command: "skyport login -a https://api.example.com".to_string(),
        });
    }

    if config.skip_ssl_validation {
        warnings.push(ValidationWarning {
            field: "skip_ssl_validation".to_string(),
            message: "TLS certificate verification is disabled".to_string(),
            fix_command: "skyport login -a <API_URL>".to_string(),
        });
    }

    if config.uaa_client != "cf" || !config.uaa_client_secret.is_empty() {
        warnings.push(ValidationWarning {
            field: "uaa_client".to_string(),
            message: "A custom OAuth client is configured; password logins use it".to_string(),
            fix_command: format_fix("uaa_client", "cf"),
        });
    }

    Ok(warnings)
}

fn format_fix(field: &str, value: &str) -> String {
    format!("set \"{field}\": {value} in config.json")
}

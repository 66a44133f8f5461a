//! Cloud controller API version checks

use semver::Version;

/// Oldest cloud controller API version the CLI is tested against
pub const MIN_SUPPORTED_API_VERSION: &str = "2.128.0";

/// Outcome of comparing the targeted API version to the supported minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiVersionCheck {
    Supported,
    BelowMinimum { current: String },
    /// Missing or not a semantic version
    Unknown,
}

impl ApiVersionCheck {
    /// Warning to show the user, if any
    pub fn warning(&self) -> Option<String> {
        match self {
            ApiVersionCheck::Supported => None,
            ApiVersionCheck::BelowMinimum { current } => Some(format!(
                "Warning: Your targeted API's version ({current}) is less than the minimum supported API version ({MIN_SUPPORTED_API_VERSION}). Some commands may not function correctly."
            )),
            ApiVersionCheck::Unknown => Some(
                "Warning: unable to determine whether targeted API's version meets minimum supported."
                    .to_string(),
            ),
        }
    }
}

/// Parse a `major.minor.patch` version, tolerating a leading "v"
pub fn parse_version(version: &str) -> Option<Version> {
    let version = version.trim();
    Version::parse(version.strip_prefix('v').unwrap_or(version)).ok()
}

/// Compare the API version reported by the root endpoint to the minimum
pub fn check_api_version(api_version: Option<&str>) -> ApiVersionCheck {
    let (Some(current), Some(minimum)) = (
        api_version.and_then(parse_version),
        parse_version(MIN_SUPPORTED_API_VERSION),
    ) else {
        return ApiVersionCheck::Unknown;
    };

    if current < minimum {
        ApiVersionCheck::BelowMinimum {
            current: current.to_string(),
        }
    } else {
        ApiVersionCheck::Supported
    }
}

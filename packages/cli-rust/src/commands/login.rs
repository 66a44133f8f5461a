//! Login command implementation
//!
//! Targets the API endpoint, negotiates credentials with the login server,
//! then targets an org and a space. The status table is shown whether or
//! not login succeeds.

use super::CommandContext;
use crate::output::CommandSpinner;
use clap::Args;
use skyport_core::version::check_api_version;
use skyport_core::{
    CommandError, CredentialNegotiator, GrantType, LoginMode, LoginRequest, Organization,
    Presupplied, Space, TargetSettings, UiError,
};
use tracing::debug;
use url::Url;

#[derive(Args)]
pub struct LoginArgs {
    /// API endpoint (e.g. https://api.example.com)
    #[arg(short = 'a', value_name = "API_URL")]
    pub api: Option<String>,

    /// Username
    #[arg(short = 'u', env = "SKYPORT_USERNAME", value_name = "USERNAME")]
    pub username: Option<String>,

    /// Password
    #[arg(
        short = 'p',
        env = "SKYPORT_PASSWORD",
        hide_env_values = true,
        value_name = "PASSWORD"
    )]
    pub password: Option<String>,

    /// Org to target
    #[arg(short = 'o', value_name = "ORG")]
    pub org: Option<String>,

    /// Space to target
    #[arg(short = 's', value_name = "SPACE")]
    pub space: Option<String>,

    /// Prompt for a one-time passcode to log in
    #[arg(long)]
    pub sso: bool,

    /// One-time passcode
    #[arg(
        long,
        env = "SKYPORT_PASSCODE",
        hide_env_values = true,
        value_name = "PASSCODE"
    )]
    pub sso_passcode: Option<String>,

    /// Log in as a client using its id (-u) and secret (-p)
    #[arg(long)]
    pub client_credentials: bool,

    /// Identity provider to authenticate with (password login only)
    #[arg(long, value_name = "ORIGIN")]
    pub origin: Option<String>,

    /// Skip verification of the API endpoint's TLS certificate
    #[arg(long)]
    pub skip_ssl_validation: bool,
}

/// Log in and target an org and space
pub async fn cmd_login(ctx: &CommandContext<'_>, args: &LoginArgs) -> Result<(), CommandError> {
    let mode = LoginMode::from_flags(
        args.sso,
        args.sso_passcode.is_some(),
        args.client_credentials,
        args.origin.is_some(),
    )?;

    let (service_account, default_client) = ctx.config.read(|c| {
        (
            c.uaa_grant_type.as_deref() == Some(GrantType::ClientCredentials.as_str()),
            c.uses_default_uaa_client(),
        )
    });
    if mode != LoginMode::ClientCredentials {
        if service_account {
            return Err(CommandError::ServiceAccountLoggedIn {
                binary_name: ctx.binary_name.to_string(),
            });
        }
        if !default_client {
            return Err(CommandError::ManualClientCredentials {
                binary_name: ctx.binary_name.to_string(),
            });
        }
    }

    let settings = determine_endpoint(ctx, args)?;
    target_api(ctx, &settings).await?;

    let api_version = ctx.config.read(|c| c.api_version.clone());
    if let Some(warning) = check_api_version(api_version.as_deref()).warning() {
        ctx.ui.display_warning(&warning);
    }
    ctx.ui.display_newline();

    let outcome = authenticate_and_target(ctx, args, mode).await;
    display_status(ctx);
    outcome
}

/// Endpoint from `-a`, the stored target, or a prompt
fn determine_endpoint(
    ctx: &CommandContext<'_>,
    args: &LoginArgs,
) -> Result<TargetSettings, CommandError> {
    let (configured, configured_skip) = ctx
        .config
        .read(|c| (c.target.clone(), c.skip_ssl_validation));

    let (endpoint, skip_ssl_validation) = match (&args.api, configured) {
        (Some(api), _) => (api.clone(), args.skip_ssl_validation),
        (None, Some(target)) if !target.is_empty() => {
            (target, configured_skip || args.skip_ssl_validation)
        }
        (None, _) => {
            let entered = ctx.ui.display_text_prompt("API endpoint")?;
            return Ok(TargetSettings {
                url: normalize_endpoint(&entered)?,
                skip_ssl_validation: args.skip_ssl_validation,
            });
        }
    };
    ctx.ui.display_text(&format!("API endpoint: {endpoint}"));

    Ok(TargetSettings {
        url: normalize_endpoint(&endpoint)?,
        skip_ssl_validation,
    })
}

/// Parse the endpoint, defaulting the scheme to https and trimming
/// trailing slashes
pub fn normalize_endpoint(endpoint: &str) -> Result<String, CommandError> {
    let endpoint = endpoint.trim();
    let invalid = |reason: &str| CommandError::InvalidApiEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = endpoint.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(invalid("no endpoint given"));
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&with_scheme).map_err(|e| invalid(&e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

async fn target_api(ctx: &CommandContext<'_>, settings: &TargetSettings) -> Result<(), CommandError> {
    let spinner = CommandSpinner::new_maybe("Connecting to API endpoint...", ctx.quiet);
    let result = ctx.actor.set_target(settings).await;
    spinner.clear();

    let (info, warnings) = result.map_err(|e| ctx.translate(e))?;
    ctx.ui.display_warnings(&warnings);
    debug!(url = %settings.url, api_version = ?info.api_version, "API targeted");

    if settings.url.starts_with("http:") {
        ctx.ui.display_warning(
            "Warning: Insecure http API endpoint detected: secure https API endpoints are recommended",
        );
    }
    Ok(())
}

async fn authenticate_and_target(
    ctx: &CommandContext<'_>,
    args: &LoginArgs,
    mode: LoginMode,
) -> Result<(), CommandError> {
    let request = LoginRequest {
        mode,
        origin: args.origin.clone(),
        presupplied: Presupplied {
            username: args.username.clone(),
            password: args.password.clone(),
            passcode: args.sso_passcode.clone(),
        },
    };
    let user = CredentialNegotiator::new(ctx.actor, ctx.ui)
        .negotiate(&request)
        .await?;
    debug!(%user, "authenticated");
    ctx.save_config()?;

    let targeted = target_organization(ctx, args.org.as_deref()).await;
    // Whatever got targeted before a failure is kept
    ctx.save_config()?;
    if let Some(org) = targeted? {
        target_space(ctx, &org, args.space.as_deref()).await?;
        ctx.save_config()?;
    }
    Ok(())
}

async fn target_organization(
    ctx: &CommandContext<'_>,
    name: Option<&str>,
) -> Result<Option<Organization>, CommandError> {
    let org = match name {
        Some(name) => {
            let (org, warnings) = ctx
                .actor
                .get_organization_by_name(name)
                .await
                .map_err(|e| ctx.translate(e))?;
            ctx.ui.display_warnings(&warnings);
            Some(org)
        }
        None => {
            let (orgs, warnings) = ctx
                .actor
                .get_organizations()
                .await
                .map_err(|e| ctx.translate(e))?;
            ctx.ui.display_warnings(&warnings);
            choose(ctx, orgs, "Select an org:", "Org", |o: &Organization| &o.name)?
        }
    };

    if let Some(org) = &org {
        ctx.config.update(|c| c.set_organization(&org.guid, &org.name));
        ctx.ui.display_text(&format!("Targeted org {}.", org.name));
        ctx.ui.display_newline();
    }
    Ok(org)
}

async fn target_space(
    ctx: &CommandContext<'_>,
    org: &Organization,
    name: Option<&str>,
) -> Result<(), CommandError> {
    let space = match name {
        Some(name) => {
            let (space, warnings) = ctx
                .actor
                .get_space_by_name_and_organization(name, &org.guid)
                .await
                .map_err(|e| ctx.translate(e))?;
            ctx.ui.display_warnings(&warnings);
            Some(space)
        }
        None => {
            let (spaces, warnings) = ctx
                .actor
                .get_organization_spaces(&org.guid)
                .await
                .map_err(|e| ctx.translate(e))?;
            ctx.ui.display_warnings(&warnings);
            choose(ctx, spaces, "Select a space:", "Space", |s: &Space| &s.name)?
        }
    };

    if let Some(space) = space {
        ctx.config.update(|c| c.set_space(&space.guid, &space.name));
        ctx.ui.display_text(&format!("Targeted space {}.", space.name));
        ctx.ui.display_newline();
    }
    Ok(())
}

/// Auto-pick a single candidate, menu for several; closed input skips
fn choose<T>(
    ctx: &CommandContext<'_>,
    candidates: Vec<T>,
    text: &str,
    label: &str,
    name: impl Fn(&T) -> &String,
) -> Result<Option<T>, CommandError> {
    if candidates.len() <= 1 {
        return Ok(candidates.into_iter().next());
    }

    let names: Vec<String> = candidates.iter().map(|c| name(c).clone()).collect();
    ctx.ui.display_text(text);
    let picked = match ctx.ui.display_text_menu(&names, label) {
        Ok(picked) => picked,
        Err(UiError::Closed) => None,
        Err(e) => return Err(e.into()),
    };
    Ok(picked.and_then(|picked| candidates.into_iter().find(|c| *name(c) == picked)))
}

/// Endpoint, version and (when logged in) user/org/space
fn display_status(ctx: &CommandContext<'_>) {
    let config = ctx.config.snapshot();
    let mut rows = vec![
        (
            "API endpoint:".to_string(),
            config
                .target
                .as_deref()
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
        ),
        (
            "API version:".to_string(),
            config.api_version.clone().unwrap_or_default(),
        ),
    ];

    let user = ctx.config.current_user_name().ok().flatten();
    let Some(user) = user.filter(|u| !u.is_empty()) else {
        ctx.ui.display_key_value_table(&rows);
        ctx.ui.display_text(&format!(
            "Not logged in. Use '{bin} login' or '{bin} login --sso' to log in.",
            bin = ctx.binary_name
        ));
        return;
    };
    rows.push(("user:".to_string(), user));

    let Some(org) = config.targeted_organization_name() else {
        ctx.ui.display_key_value_table(&rows);
        ctx.ui.display_text(&format!(
            "No org or space targeted, use '{} login -o ORG -s SPACE'",
            ctx.binary_name
        ));
        return;
    };
    rows.push(("org:".to_string(), org.to_string()));

    let space = config
        .targeted_space_name()
        .map(String::from)
        .unwrap_or_else(|| format!("No space targeted, use '{} login -s SPACE'", ctx.binary_name));
    rows.push(("space:".to_string(), space));
    ctx.ui.display_key_value_table(&rows);
}

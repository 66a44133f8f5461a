//! Target checks shared by app commands

use super::CommandContext;
use skyport_core::CommandError;

/// Org, space and user an app command runs against
#[derive(Debug, Clone, PartialEq)]
pub struct CommandTarget {
    pub org_name: String,
    pub space_guid: String,
    pub space_name: String,
    pub user: String,
}

/// Require a session with an org and a space targeted
pub fn check_target(ctx: &CommandContext<'_>) -> Result<CommandTarget, CommandError> {
    let binary_name = ctx.binary_name.to_string();
    let (logged_in, org, space) = ctx.config.read(|c| {
        (
            c.is_logged_in(),
            c.targeted_organization.clone(),
            c.targeted_space.clone(),
        )
    });

    if !logged_in {
        return Err(CommandError::NotLoggedIn { binary_name });
    }
    let org = org.ok_or_else(|| CommandError::NoOrganizationTargeted {
        binary_name: binary_name.clone(),
    })?;
    let space = space.ok_or_else(|| CommandError::NoSpaceTargeted {
        binary_name: binary_name.clone(),
    })?;

    let user = ctx
        .config
        .current_user_name()
        .map_err(|e| ctx.translate(e))?
        .ok_or(CommandError::NotLoggedIn { binary_name })?;

    Ok(CommandTarget {
        org_name: org.name,
        space_guid: space.guid,
        space_name: space.name,
        user,
    })
}

//! Logout command implementation

use super::CommandContext;
use skyport_core::CommandError;
use tracing::debug;

/// Forget tokens and targeted org/space, keeping the API endpoint
pub async fn cmd_logout(ctx: &CommandContext<'_>) -> Result<(), CommandError> {
    // An unreadable token still gets cleared
    let user = ctx.config.current_user_name().ok().flatten().unwrap_or_default();
    ctx.ui.display_text(&format!("Logging out {user}..."));

    ctx.config.update(|c| c.clear_session());
    ctx.save_config()?;
    debug!("session cleared");

    ctx.ui.display_ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context, targeted_config};
    use skyport_core::ConfigStore;
    use skyport_core::config::load_config_from;
    use skyport_core::testing::{BufferUi, FakeActor};

    #[tokio::test]
    async fn logout_clears_session_and_keeps_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = ConfigStore::load(path.clone()).unwrap();
        store.update(|c| *c = targeted_config("faceman"));
        let actor = FakeActor::new();
        let ui = BufferUi::new();

        cmd_logout(&context(&actor, &ui, &store)).await.unwrap();

        assert_eq!(ui.out(), "Logging out faceman...\nOK\n");
        let saved = load_config_from(&path).unwrap();
        assert!(!saved.is_logged_in());
        assert!(saved.refresh_token.is_none());
        assert!(saved.targeted_organization.is_none());
        assert!(saved.targeted_space.is_none());
        assert_eq!(saved.target.as_deref(), Some("https://api.example.com"));
    }

    #[tokio::test]
    async fn logout_without_session_still_succeeds() {
        let store = ConfigStore::in_memory(Default::default());
        let actor = FakeActor::new();
        let ui = BufferUi::new();

        cmd_logout(&context(&actor, &ui, &store)).await.unwrap();

        assert!(ui.out().ends_with("OK\n"));
    }
}

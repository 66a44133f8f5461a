//! Restart command implementation
//!
//! Stops the app, stages it when it has no droplet, starts it and streams
//! its logs while doing so, then prints the app summary.

use super::CommandContext;
use super::target::check_target;
use clap::Args;
use skyport_core::{CommandError, OperationOrchestrator};
use std::time::Duration;

/// Arguments for the restart command
#[derive(Args)]
pub struct RestartArgs {
    /// Name of the app
    pub app_name: String,
}

/// Restart an app in the targeted space
pub async fn cmd_restart(ctx: &CommandContext<'_>, args: &RestartArgs) -> Result<(), CommandError> {
    let target = check_target(ctx)?;

    ctx.ui.display_text(&format!(
        "Restarting app {} in org {} / space {} as {}...",
        args.app_name, target.org_name, target.space_name, target.user
    ));
    ctx.ui.display_newline();

    let (app, warnings) = ctx
        .actor
        .get_application_by_name_and_space(&args.app_name, &target.space_guid)
        .await
        .map_err(|e| ctx.translate(e))?;
    ctx.ui.display_warnings(&warnings);

    let refresh_period =
        Duration::from_secs(ctx.config.read(|c| c.token_refresh_interval_secs));
    OperationOrchestrator::new(ctx.actor, ctx.ui, ctx.binary_name)
        .with_refresh_period(refresh_period)
        .restart(&app)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context, targeted_config};
    use skyport_core::testing::{BufferUi, FakeActor, RestartScript, application, empty_summary};
    use skyport_core::{ActorError, AppStateChange, ConfigStore};

    fn restart_args() -> RestartArgs {
        RestartArgs {
            app_name: "some-app".to_string(),
        }
    }

    #[tokio::test]
    async fn restart_announces_target_then_shows_summary() {
        let actor = FakeActor::new();
        actor.add_application(application("some-app", "space-guid"));
        actor.set_application_warnings(vec!["get-app-warning".to_string()]);
        actor.set_restart(RestartScript {
            states: vec![AppStateChange::Stopping, AppStateChange::Starting],
            ..RestartScript::default()
        });
        actor.set_summary(Ok((empty_summary("some-app"), Vec::new())));
        let ui = BufferUi::new();
        let store = ConfigStore::in_memory(targeted_config("faceman"));

        cmd_restart(&context(&actor, &ui, &store), &restart_args())
            .await
            .unwrap();

        let out = ui.out();
        assert!(out.starts_with(
            "Restarting app some-app in org some-org / space some-space as faceman...\n"
        ));
        assert!(out.contains("Stopping app..."));
        assert!(out.contains("Waiting for app to start..."));
        assert!(out.contains("name: some-app"));
        assert!(ui.err().contains("get-app-warning"));
        assert_eq!(actor.restart_calls(), 1);
    }

    #[tokio::test]
    async fn refresh_period_comes_from_config() {
        let actor = FakeActor::new();
        actor.add_application(application("some-app", "space-guid"));
        actor.set_summary(Ok((empty_summary("some-app"), Vec::new())));
        let ui = BufferUi::new();
        let mut config = targeted_config("faceman");
        config.token_refresh_interval_secs = 30;
        let store = ConfigStore::in_memory(config);

        cmd_restart(&context(&actor, &ui, &store), &restart_args())
            .await
            .unwrap();

        assert_eq!(actor.refresh_periods(), vec![Duration::from_secs(30)]);
    }

    #[tokio::test]
    async fn missing_app_is_reported_without_restarting() {
        let actor = FakeActor::new();
        let ui = BufferUi::new();
        let store = ConfigStore::in_memory(targeted_config("faceman"));

        let err = cmd_restart(&context(&actor, &ui, &store), &restart_args())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            CommandError::Actor(ActorError::ApplicationNotFound {
                name: "some-app".to_string()
            })
        );
        assert_eq!(actor.restart_calls(), 0);
    }

    #[tokio::test]
    async fn untargeted_space_fails_before_any_request() {
        let actor = FakeActor::new();
        let ui = BufferUi::new();
        let mut config = targeted_config("faceman");
        config.targeted_space = None;
        let store = ConfigStore::in_memory(config);

        let err = cmd_restart(&context(&actor, &ui, &store), &restart_args())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            CommandError::NoSpaceTargeted {
                binary_name: "sky".to_string()
            }
        );
        assert!(ui.out().is_empty());
    }

    #[tokio::test]
    async fn staging_timeout_surfaces_typed_error() {
        let actor = FakeActor::new();
        actor.add_application(application("some-app", "space-guid"));
        actor.set_restart(RestartScript {
            states: vec![AppStateChange::Staging],
            error: Some(ActorError::StagingTimeout {
                app_name: "some-app".to_string(),
                timeout: Duration::from_nanos(1),
            }),
            ..RestartScript::default()
        });
        let ui = BufferUi::new();
        let store = ConfigStore::in_memory(targeted_config("faceman"));

        let err = cmd_restart(&context(&actor, &ui, &store), &restart_args())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            CommandError::StagingTimeout {
                app_name: "some-app".to_string(),
                timeout: Duration::from_nanos(1),
            }
        );
        assert_eq!(actor.log_cancellations(), 1);
        assert!(actor.summary_calls().is_empty());
    }
}

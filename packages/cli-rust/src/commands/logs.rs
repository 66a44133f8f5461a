//! Logs command implementation
//!
//! Prints the recent log window with `--recent`, otherwise follows the
//! app's log stream until it ends or the user interrupts.

use super::CommandContext;
use super::target::check_target;
use clap::Args;
use skyport_core::{CommandError, OperationOrchestrator};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Arguments for the logs command
#[derive(Args)]
pub struct LogsArgs {
    /// Name of the app
    pub app_name: String,

    /// Dump recent logs instead of tailing
    #[arg(long)]
    pub recent: bool,
}

/// Show or follow an app's logs; `interrupt` ends following
pub async fn cmd_logs(
    ctx: &CommandContext<'_>,
    args: &LogsArgs,
    interrupt: CancellationToken,
) -> Result<(), CommandError> {
    let target = check_target(ctx)?;

    ctx.ui.display_text(&format!(
        "Retrieving logs for app {} in org {} / space {} as {}...",
        args.app_name, target.org_name, target.space_name, target.user
    ));
    ctx.ui.display_newline();

    let refresh_period =
        Duration::from_secs(ctx.config.read(|c| c.token_refresh_interval_secs));
    OperationOrchestrator::new(ctx.actor, ctx.ui, ctx.binary_name)
        .with_refresh_period(refresh_period)
        .with_interrupt(interrupt)
        .stream_logs(&args.app_name, &target.space_guid, args.recent)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context, targeted_config};
    use chrono::Utc;
    use skyport_core::testing::{BufferUi, FakeActor, LogScript};
    use skyport_core::{ConfigStore, LogMessage};

    fn message(text: &str) -> LogMessage {
        LogMessage::new(
            text.to_string(),
            "OUT".to_string(),
            Utc::now(),
            "APP/PROC/WEB".to_string(),
            "0".to_string(),
        )
    }

    #[tokio::test]
    async fn recent_logs_are_printed_without_a_refresher() {
        let actor = FakeActor::new();
        actor.set_recent_logs(vec![message("first"), message("second")]);
        let ui = BufferUi::new();
        let store = ConfigStore::in_memory(targeted_config("faceman"));
        let args = LogsArgs {
            app_name: "some-app".to_string(),
            recent: true,
        };

        cmd_logs(&context(&actor, &ui, &store), &args, CancellationToken::new())
            .await
            .unwrap();

        let out = ui.out();
        assert!(out.starts_with(
            "Retrieving logs for app some-app in org some-org / space some-space as faceman...\n"
        ));
        assert!(out.contains("first\nsecond\n"));
        assert_eq!(actor.recent_log_calls(), 1);
        assert!(actor.refresh_periods().is_empty());
    }

    #[tokio::test]
    async fn interrupt_stops_following() {
        let actor = FakeActor::new();
        actor.set_logs(LogScript {
            messages: vec![message("tailed")],
            ..LogScript::default()
        });
        let ui = BufferUi::new();
        let store = ConfigStore::in_memory(targeted_config("faceman"));
        let args = LogsArgs {
            app_name: "some-app".to_string(),
            recent: false,
        };
        let interrupt = CancellationToken::new();
        let trigger = interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        cmd_logs(&context(&actor, &ui, &store), &args, interrupt)
            .await
            .unwrap();

        assert_eq!(ui.log_messages().len(), 1);
        assert_eq!(actor.log_cancellations(), 1);
        assert_eq!(actor.refresh_stops(), 1);
    }

    #[tokio::test]
    async fn logs_need_a_login() {
        let actor = FakeActor::new();
        let ui = BufferUi::new();
        let store = ConfigStore::in_memory(Default::default());
        let args = LogsArgs {
            app_name: "some-app".to_string(),
            recent: true,
        };

        let err = cmd_logs(&context(&actor, &ui, &store), &args, CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            CommandError::NotLoggedIn {
                binary_name: "sky".to_string()
            }
        );
        assert_eq!(actor.recent_log_calls(), 0);
    }
}

//! CLI command implementations
//!
//! Each command takes a [`CommandContext`] instead of building its own
//! clients, so tests can run them against `FakeActor` and `BufferUi`.

mod login;
mod logout;
mod logs;
mod restart;
mod target;

pub use login::{LoginArgs, cmd_login};
pub use logout::cmd_logout;
pub use logs::{LogsArgs, cmd_logs};
pub use restart::{RestartArgs, cmd_restart};

use skyport_core::{Actor, ActorError, CommandError, ConfigStore, Ui};

/// Shared dependencies handed to every command
pub struct CommandContext<'a> {
    pub actor: &'a dyn Actor,
    pub ui: &'a dyn Ui,
    pub config: &'a ConfigStore,
    /// Name the CLI was invoked as, used in hints ("sky login")
    pub binary_name: &'a str,
    pub quiet: bool,
}

impl CommandContext<'_> {
    fn translate(&self, err: ActorError) -> CommandError {
        CommandError::translate(err, self.binary_name)
    }

    fn save_config(&self) -> Result<(), CommandError> {
        self.config
            .save()
            .map_err(|e| CommandError::ConfigWrite(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::CommandContext;
    use skyport_core::config::token::encode_test_token;
    use skyport_core::testing::{BufferUi, FakeActor};
    use skyport_core::{Config, ConfigStore};

    /// Config for a logged-in user with org and space targeted
    pub fn targeted_config(user: &str) -> Config {
        let token = encode_test_token(&serde_json::json!({ "user_name": user }));
        let mut config = Config {
            target: Some("https://api.example.com".to_string()),
            api_version: Some("2.150.0".to_string()),
            access_token: Some(format!("bearer {token}")),
            refresh_token: Some("refresh".to_string()),
            ..Config::default()
        };
        config.set_organization("org-guid", "some-org");
        config.set_space("space-guid", "some-space");
        config
    }

    pub fn context<'a>(
        actor: &'a FakeActor,
        ui: &'a BufferUi,
        config: &'a ConfigStore,
    ) -> CommandContext<'a> {
        CommandContext {
            actor,
            ui,
            config,
            binary_name: "sky",
            quiet: true,
        }
    }
}

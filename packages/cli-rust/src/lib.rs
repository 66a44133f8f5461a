//! skyport CLI - log in to a cloud application platform and operate apps
//!
//! This module contains the shared CLI implementation used by all binaries.

mod commands;
mod output;
mod ui;

use crate::commands::CommandContext;
use crate::output::errors::{show_config_error, show_validation_error};
use crate::output::show_command_error;
use crate::ui::TerminalUi;
use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use skyport_core::config::{self, ConfigError, ConfigStore, validate_config};
use skyport_core::CloudClient;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Log in to a cloud application platform and operate apps
#[derive(Parser)]
#[command(name = "skyport")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Log in to a cloud application platform and operate apps", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase verbosity level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and target an org and space
    Login(commands::LoginArgs),
    /// Log out of the current session
    Logout,
    /// Stop, restage if needed, and start an app
    Restart(commands::RestartArgs),
    /// Show recent logs or tail an app's logs
    Logs(commands::LogsArgs),
}

/// Name the CLI was invoked as ("skyport" or "sky")
fn binary_name() -> String {
    std::env::args_os()
        .next()
        .as_deref()
        .map(Path::new)
        .and_then(Path::file_stem)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "skyport".to_string())
}

/// Log to stderr; `RUST_LOG` wins, otherwise `-v` raises the level
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "skyport=debug,skyport_core=debug",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Cancelled on the first Ctrl+C; later ones fall back to the default
/// handler once the runtime shuts down
fn interrupt_on_ctrl_c() -> CancellationToken {
    let interrupt = CancellationToken::new();
    let trigger = interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received");
            trigger.cancel();
        }
    });
    interrupt
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Configure color output
    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let config_path = config::paths::get_config_path().ok_or(ConfigError::NoConfigDir)?;
    let store = match ConfigStore::load(config_path.clone()) {
        Ok(store) => store,
        Err(e) => {
            show_config_error(&e, &config_path);
            std::process::exit(1);
        }
    };
    if cli.verbose > 0 {
        eprintln!(
            "{} skyport {}",
            style("[info]").cyan(),
            skyport_core::get_version()
        );
        eprintln!(
            "{} Config: {}",
            style("[info]").cyan(),
            config_path.display()
        );
    }

    match validate_config(&store.snapshot()) {
        Ok(warnings) => {
            if !cli.quiet {
                for warning in warnings {
                    eprintln!(
                        "{} {} ({})",
                        style("Warning:").yellow().bold(),
                        warning.message,
                        warning.fix_command
                    );
                }
            }
        }
        Err(e) => {
            show_validation_error(&e);
            std::process::exit(1);
        }
    }

    let client = CloudClient::new(store.clone())?;
    let terminal = TerminalUi::new(cli.quiet);
    let binary_name = binary_name();
    let ctx = CommandContext {
        actor: &client,
        ui: &terminal,
        config: &store,
        binary_name: &binary_name,
        quiet: cli.quiet,
    };

    let rt = tokio::runtime::Runtime::new()?;
    let result = match &cli.command {
        Commands::Login(args) => rt.block_on(commands::cmd_login(&ctx, args)),
        Commands::Logout => rt.block_on(commands::cmd_logout(&ctx)),
        Commands::Restart(args) => rt.block_on(commands::cmd_restart(&ctx, args)),
        Commands::Logs(args) => rt.block_on(async {
            commands::cmd_logs(&ctx, args, interrupt_on_ctrl_c()).await
        }),
    };

    if let Err(e) = result {
        show_command_error(&e);
        std::process::exit(1);
    }
    Ok(())
}

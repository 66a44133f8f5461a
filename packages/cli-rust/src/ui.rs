//! Terminal implementation of the core `Ui` seam
//!
//! Text, tables and log lines go to stdout; warnings go to stderr. Prompts
//! use dialoguer and read from the controlling terminal.

use crate::output::{log_type_style, state_color};
use comfy_table::{Attribute, Cell, Table};
use console::style;
use dialoguer::{Confirm, Input, Password, Select};
use skyport_core::{LogMessage, Ui, UiError};
use std::io;

/// Choice appended to selection menus so the user can skip targeting
const SKIP_CHOICE: &str = "(skip)";

#[derive(Debug, Default)]
pub struct TerminalUi {
    quiet: bool,
}

impl TerminalUi {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

fn prompt_error(err: dialoguer::Error) -> UiError {
    let dialoguer::Error::IO(err) = err;
    match err.kind() {
        io::ErrorKind::Interrupted => UiError::Interrupted,
        io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe => UiError::Closed,
        _ => UiError::Io(err.to_string()),
    }
}

/// Table without borders, columns separated by whitespace
fn plain_table() -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::NOTHING);
    table
}

impl Ui for TerminalUi {
    fn display_text(&self, text: &str) {
        if !self.quiet {
            println!("{text}");
        }
    }

    fn display_newline(&self) {
        if !self.quiet {
            println!();
        }
    }

    fn display_ok(&self) {
        if !self.quiet {
            println!("{}", style("OK").green().bold());
        }
    }

    fn display_warning(&self, warning: &str) {
        eprintln!("{}", style(warning).yellow());
    }

    fn display_text_prompt(&self, label: &str) -> Result<String, UiError> {
        Input::<String>::new()
            .with_prompt(label)
            .allow_empty(true)
            .interact_text()
            .map_err(prompt_error)
    }

    fn display_password_prompt(&self, label: &str) -> Result<String, UiError> {
        Password::new()
            .with_prompt(label)
            .allow_empty_password(true)
            .interact()
            .map_err(prompt_error)
    }

    fn display_bool_prompt(&self, label: &str, default: bool) -> Result<bool, UiError> {
        Confirm::new()
            .with_prompt(label)
            .default(default)
            .interact()
            .map_err(prompt_error)
    }

    fn display_text_menu(&self, choices: &[String], label: &str) -> Result<Option<String>, UiError> {
        let mut items: Vec<&str> = choices.iter().map(String::as_str).collect();
        items.push(SKIP_CHOICE);
        let picked = Select::new()
            .with_prompt(label)
            .items(&items)
            .default(0)
            .interact_opt()
            .map_err(prompt_error)?;
        Ok(picked.and_then(|i| choices.get(i)).cloned())
    }

    fn display_key_value_table(&self, rows: &[(String, String)]) {
        if self.quiet {
            return;
        }
        let mut table = plain_table();
        for (key, value) in rows {
            table.add_row(vec![
                Cell::new(key).add_attribute(Attribute::Bold),
                Cell::new(value),
            ]);
        }
        println!("{table}");
    }

    fn display_table(&self, headers: &[&str], rows: &[Vec<String>]) {
        if self.quiet {
            return;
        }
        let state_column = headers.iter().position(|h| *h == "state");
        let mut table = plain_table();
        table.set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );
        for row in rows {
            table.add_row(row.iter().enumerate().map(|(i, cell)| {
                let styled = Cell::new(cell);
                match state_color(cell) {
                    Some(color) if Some(i) == state_column => styled.fg(color),
                    _ => styled,
                }
            }));
        }
        println!("{table}");
    }

    fn display_log_message(&self, message: &LogMessage) {
        let rendered = message.render();
        println!(
            "{}",
            log_type_style(&rendered, &message.message_type, message.is_staging())
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_on_prompt_means_closed_input() {
        let err = dialoguer::Error::IO(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert_eq!(prompt_error(err), UiError::Closed);
    }

    #[test]
    fn interrupted_prompt_is_reported() {
        let err = dialoguer::Error::IO(io::Error::new(io::ErrorKind::Interrupted, "ctrl-c"));
        assert_eq!(prompt_error(err), UiError::Interrupted);
    }

    #[test]
    fn other_prompt_failures_keep_their_message() {
        let err = dialoguer::Error::IO(io::Error::other("not a terminal"));
        assert_eq!(prompt_error(err), UiError::Io("not a terminal".to_string()));
    }
}

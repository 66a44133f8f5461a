//! Spinner for steps with no output of their own
//!
//! Hidden in quiet mode; indicatif also hides it when stderr is not a
//! terminal, so scripted output stays clean.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct CommandSpinner {
    bar: ProgressBar,
}

impl CommandSpinner {
    /// A spinner that draws nothing when `quiet` is set
    pub fn new_maybe(message: &str, quiet: bool) -> Self {
        if quiet {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Remove the spinner line without leaving a message
    pub fn clear(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_spinner_is_hidden() {
        let spinner = CommandSpinner::new_maybe("Connecting...", true);
        assert!(spinner.bar.is_hidden());
        spinner.clear();
        assert!(spinner.bar.is_finished());
    }
}

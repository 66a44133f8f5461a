//! Color utilities for CLI output
//!
//! Provides consistent color styling for app/instance states and log types.

use comfy_table::Color;
use console::{Style, StyledObject};

/// Table color for an app or instance state
///
/// - "running", "started" -> green
/// - "crashed", "down", "stopped" -> red
/// - "starting", "staging" -> yellow
/// - other -> none
pub fn state_color(state: &str) -> Option<Color> {
    match state.to_lowercase().as_str() {
        "running" | "started" => Some(Color::Green),
        "crashed" | "down" | "stopped" => Some(Color::Red),
        "starting" | "staging" => Some(Color::Yellow),
        _ => None,
    }
}

/// Style a rendered log line by its message type
///
/// - "ERR" -> red
/// - staging output -> cyan
/// - else -> unstyled
pub fn log_type_style<'a>(line: &'a str, message_type: &str, staging: bool) -> StyledObject<&'a str> {
    let style = if message_type.eq_ignore_ascii_case("ERR") {
        Style::new().red()
    } else if staging {
        Style::new().cyan()
    } else {
        Style::new()
    };
    style.apply_to(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_instances_are_green() {
        assert_eq!(state_color("running"), Some(Color::Green));
        assert_eq!(state_color("RUNNING"), Some(Color::Green));
    }

    #[test]
    fn crashed_instances_are_red() {
        assert_eq!(state_color("crashed"), Some(Color::Red));
    }

    #[test]
    fn unknown_state_is_uncolored() {
        assert_eq!(state_color("unknown"), None);
    }

    #[test]
    fn log_type_style_keeps_line() {
        console::set_colors_enabled(false);
        let styled = log_type_style("   2024-01-01 [APP/PROC/WEB/0] ERR boom", "ERR", false);
        assert_eq!(
            styled.to_string(),
            "   2024-01-01 [APP/PROC/WEB/0] ERR boom"
        );
    }
}

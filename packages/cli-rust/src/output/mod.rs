//! Output utilities
//!
//! Color helpers, error rendering and the progress spinner used by the
//! terminal commands.

pub mod colors;
pub mod errors;
pub mod spinner;

pub use colors::{log_type_style, state_color};
pub use errors::show_command_error;
pub use spinner::CommandSpinner;

//! Output formatting for CLI.

mod json;
mod text;

pub use json::{JsonFormatter, ProbeOutput, SessionOutput};
pub use text::TextFormatter;

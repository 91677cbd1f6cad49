//! Progress spinner for long-running network and toolkit steps

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::OutputFormat;

const TEMPLATE: &str = "{spinner:.cyan} {msg} [{elapsed}]";

const TICK: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ";

/// Start a spinner on stderr. Hidden for JSON output and when stderr is not
/// a terminal, so scripted runs stay clean.
pub fn start(message: impl Into<String>, format: OutputFormat) -> ProgressBar {
    if format == OutputFormat::Json || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    let style = match ProgressStyle::with_template(TEMPLATE) {
        Ok(style) => style.tick_chars(TICK),
        Err(_) => ProgressStyle::default_spinner(),
    };
    pb.set_style(style);
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

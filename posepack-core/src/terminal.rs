//! Terminal output styling for posepack.
//!
//! Output goes through the `log` facade so that the CLI's logger decides
//! where it ends up. Lines are indented by hierarchy level; color is used
//! unless `NO_COLOR` is set.

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::info;
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::time::Duration;
use unicode_width::UnicodeWidthStr;

const STATUS_LABEL_WIDTH: usize = 15;

/// Visual hierarchy levels of CLI output.
#[derive(Debug, Clone, Copy)]
pub enum OutputLevel {
    /// Main sections (===== SECTION =====)
    Section,
    /// Operations (» Converting ...)
    Subsection,
    /// Items below an operation
    Progress,
    /// Key-value status lines
    Status,
}

impl OutputLevel {
    fn indent(self) -> &'static str {
        match self {
            OutputLevel::Section => "",
            OutputLevel::Subsection => "  ",
            OutputLevel::Progress => "    ",
            OutputLevel::Status => "      ",
        }
    }
}

/// Check if color should be used (respects NO_COLOR environment variable)
fn should_use_color() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Print a section header for major workflow phases
pub fn print_section(title: &str) {
    info!("");
    if should_use_color() {
        info!("===== {} =====", title.to_uppercase().cyan());
    } else {
        info!("===== {} =====", title.to_uppercase());
    }
    info!("");
}

/// Print an item at the specified hierarchy level
pub fn print_item(level: OutputLevel, symbol: Option<&str>, text: &str, bold: bool) {
    let indent = level.indent();
    let prefix = match symbol {
        Some(sym) => format!("{indent}{sym} "),
        None => indent.to_string(),
    };

    if should_use_color() && bold {
        info!("{prefix}{}", style(text).bold());
    } else {
        info!("{prefix}{text}");
    }
}

/// Print a processing step
pub fn print_processing(message: &str) {
    info!("");
    print_item(OutputLevel::Subsection, Some("»"), message, true);
}

pub fn print_sub_item(message: &str) {
    print_item(OutputLevel::Progress, None, message, false);
}

/// Print a status line (key-value pair)
pub fn print_status(label: &str, value: &str, highlight: bool) {
    let padding = STATUS_LABEL_WIDTH.saturating_sub(label.width()).max(1);
    let indent = OutputLevel::Status.indent();

    if should_use_color() && highlight {
        info!("{indent}{label}:{} {}", " ".repeat(padding), value.bold());
    } else {
        info!("{indent}{label}:{} {value}", " ".repeat(padding));
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    info!("");
    if should_use_color() {
        info!("  ✓ {}", message.green());
    } else {
        info!("  ✓ {message}");
    }
}

/// Print a warning message
pub fn print_warning(message: &str) {
    if should_use_color() {
        info!("  ⚠ {}", message.yellow());
    } else {
        info!("  ⚠ {message}");
    }
}

/// Creates a spinner counting processed items.
///
/// The spinner is hidden when `visible` is false or stderr is not a terminal.
pub fn create_spinner(message: &str, visible: bool) -> ProgressBar {
    if !visible || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("  {spinner} {msg}: {pos} ({per_sec}, {elapsed})")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

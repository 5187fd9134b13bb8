// ============================================================================
// posepack-cli/src/logging.rs
// ============================================================================
//
// LOGGING SETUP: env_logger initialization for the posepack CLI
//
// Terminal output from posepack-core goes through the `log` facade. Info
// lines are printed as-is so that the hierarchical terminal layout stays
// intact; other levels get a level tag, and debug/trace a timestamp.
//
// RUST_LOG overrides the level chosen from --verbose.

use env_logger::{Builder, Env};
use log::Level;
use owo_colors::OwoColorize;
use std::io::Write;

/// Returns the current local timestamp formatted as "YYYYMMDD_HHMMSS".
pub fn get_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Default filter: info, or debug for the posepack crates when verbose.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "info,posepack_core=debug,posepack_cli=debug"
    } else {
        "info"
    }
}

/// Initializes the global logger. Output goes to stderr.
pub fn init_logging(verbose: bool) {
    let use_color = std::env::var("NO_COLOR").is_err();

    Builder::from_env(Env::default().default_filter_or(default_filter(verbose)))
        .format(move |buf, record| match record.level() {
            Level::Info => writeln!(buf, "{}", record.args()),
            level => {
                let tag = format!("[{level}]");
                let tag = match (use_color, level) {
                    (false, _) => tag,
                    (true, Level::Error) => tag.red().bold().to_string(),
                    (true, Level::Warn) => tag.yellow().to_string(),
                    (true, _) => tag.dimmed().to_string(),
                };
                if level >= Level::Debug {
                    writeln!(buf, "{} {tag} {}", get_timestamp(), record.args())
                } else {
                    writeln!(buf, "{tag} {}", record.args())
                }
            }
        })
        .init();
}

// posepack-cli/src/main.rs
//
// Entry point of the posepack binary: parses the command line, sets up
// logging, dispatches to the command implementations and maps failures to
// exit code 1.

use clap::Parser;
use owo_colors::OwoColorize;
use posepack_cli::logging::init_logging;
use posepack_cli::{run_convert, run_inspect, Cli, Commands};
use std::process;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Convert(args) => run_convert(args).map(|_| ()),
        Commands::Inspect(args) => run_inspect(args).map(|_| ()),
    };

    if let Err(e) = result {
        if std::env::var("NO_COLOR").is_ok() {
            eprintln!("Error: {e}");
        } else {
            eprintln!("{} {e}", "Error:".red().bold());
        }
        process::exit(1);
    }
}

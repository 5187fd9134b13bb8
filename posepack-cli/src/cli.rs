// posepack-cli/src/cli.rs
//
// Defines the command-line argument structures using clap.

use clap::{Parser, Subcommand};
use posepack_core::{parse_byte_size, OutputLayout};
use std::path::PathBuf;

// --- CLI Argument Definition ---

#[derive(Parser, Debug)]
#[command(
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "Posepack: OpenPose keypoint archive re-packaging",
    long_about = "Converts tar archives of OpenPose *_keypoints.json files into chunked tar \
                  archives of per-sample, per-region NPY arrays."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Converts keypoint archives into chunked NPY archives
    Convert(ConvertArgs),
    /// Lists the arrays stored in a converted archive
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
pub struct ConvertArgs {
    /// Input archive (.tar, .tar.gz, .tgz, .tar.bz2) or directory of archives
    #[arg(short = 'i', long = "input", required = true, value_name = "INPUT_PATH")]
    pub input_path: PathBuf,

    /// Output path template with a chunk number placeholder, e.g. out/poses-{:05}.tar
    #[arg(short = 'o', long = "output", required = true, value_name = "TEMPLATE")]
    pub output_template: String,

    /// Optional: JSON configuration file; command-line options take precedence
    #[arg(short = 'c', long = "config", value_name = "CONFIG_JSON")]
    pub config: Option<PathBuf>,

    /// Comma-separated body regions (pose, left_hand, right_hand, face)
    #[arg(long, value_name = "LIST", env = "POSEPACK_REGIONS")]
    pub regions: Option<String>,

    /// Values kept per landmark: 2 (x, y) or 3 (x, y, confidence)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u8).range(2..=3))]
    pub n_coords: Option<u8>,

    /// Output chunk threshold in bytes; accepts K, M and G suffixes
    #[arg(long, value_name = "SIZE", env = "POSEPACK_MAX_CHUNK_SIZE", value_parser = parse_chunk_size)]
    pub max_chunk_size: Option<u64>,

    /// Read detection files from the .tar.gz/.tgz/.tar.bz2/.tar members of the input
    #[arg(long)]
    pub sub_tars: bool,

    /// Show a spinner while reading
    #[arg(long)]
    pub progress: bool,

    /// Output entry naming: by-region or webdataset
    #[arg(long, value_name = "LAYOUT")]
    pub layout: Option<OutputLayout>,

    /// Also write the per-frame detection status of every sample
    #[arg(long)]
    pub write_statuses: bool,
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Converted archive to list
    #[arg(required = true, value_name = "ARCHIVE")]
    pub archive: PathBuf,
}

fn parse_chunk_size(value: &str) -> Result<u64, String> {
    match parse_byte_size(value) {
        Some(0) => Err("chunk size must be greater than zero".to_string()),
        Some(bytes) => Ok(bytes),
        None => Err(format!("'{value}' is not a byte size (e.g. 1048576, 512M, 1G)")),
    }
}

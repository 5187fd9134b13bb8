//! Implementation of the 'convert' subcommand.
//!
//! Resolves the input archives, builds the core configuration from the
//! command line (optionally on top of a JSON file) and hands off to
//! posepack-core.

use crate::cli::ConvertArgs;
use crate::error::{CliErrorContext, CliResult};

use posepack_core::terminal;
use posepack_core::{
    convert_archives, format_bytes, format_duration, parse_region_list, ConversionSummary,
    CoreConfig, CoreError,
};

use log::{debug, info};
use std::fs;
use std::path::PathBuf;

/// Resolves the input path to the archives to convert.
///
/// A directory yields every archive at its top level; a file is taken as is.
pub fn discover_input_archives(args: &ConvertArgs) -> CliResult<Vec<PathBuf>> {
    let metadata = fs::metadata(&args.input_path).map_err(|e| {
        CoreError::OperationFailed(format!(
            "Invalid input path '{}': {e}",
            args.input_path.display()
        ))
    })?;

    if metadata.is_dir() {
        posepack_core::find_keypoint_archives(&args.input_path).map_err(|e| match e {
            CoreError::NoArchivesFound => CoreError::OperationFailed(format!(
                "No .tar, .tar.gz, .tgz or .tar.bz2 files found in '{}'",
                args.input_path.display()
            )),
            other => other,
        })
    } else if metadata.is_file() {
        Ok(vec![args.input_path.clone()])
    } else {
        Err(CoreError::OperationFailed(format!(
            "Input path '{}' is neither a file nor a directory",
            args.input_path.display()
        )))
    }
}

/// Creates and configures CoreConfig from CLI arguments.
pub fn create_core_config(args: &ConvertArgs) -> CliResult<CoreConfig> {
    let mut config = match &args.config {
        Some(path) => CoreConfig::from_json_file(path)
            .cli_with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => CoreConfig::default(),
    };

    if let Some(regions) = &args.regions {
        config.body_regions = parse_region_list(regions)?;
    }
    if let Some(n_coords) = args.n_coords {
        config.n_coords = usize::from(n_coords);
    }
    if let Some(bytes) = args.max_chunk_size {
        config.max_chunk_size = bytes;
    }
    if let Some(layout) = args.layout {
        config.layout = layout;
    }
    config.sub_tars |= args.sub_tars;
    config.show_progress |= args.progress;
    config.write_frame_statuses |= args.write_statuses;

    config.validate()?;
    debug!("Effective configuration: {config:?}");
    Ok(config)
}

fn display_configuration(config: &CoreConfig, archives: &[PathBuf], template: &str) {
    terminal::print_section("CONFIGURATION");
    match archives {
        [single] => terminal::print_status("Input", &single.display().to_string(), false),
        many => terminal::print_status("Input", &format!("{} archives", many.len()), false),
    }
    terminal::print_status("Output", template, false);

    let regions: Vec<&str> = config.body_regions.iter().map(|r| r.as_str()).collect();
    terminal::print_status("Regions", &regions.join(", "), false);
    terminal::print_status("Coordinates", &config.n_coords.to_string(), false);
    terminal::print_status("Chunk size", &format_bytes(config.max_chunk_size), false);
    terminal::print_status("Nested", if config.sub_tars { "yes" } else { "no" }, false);
}

fn display_summary(summary: &ConversionSummary) {
    terminal::print_section("CONVERSION COMPLETE");
    terminal::print_success(&format!(
        "Converted {} sample(s) from {} archive(s)",
        summary.samples, summary.archives
    ));
    info!("");
    terminal::print_status("Samples", &summary.samples.to_string(), true);
    terminal::print_status("Frames", &summary.frames.to_string(), false);
    terminal::print_status("Detected", &summary.ok_frames.to_string(), false);
    terminal::print_status("No person", &summary.missing_person_frames.to_string(), false);
    terminal::print_status("Several people", &summary.multiple_people_frames.to_string(), false);
    terminal::print_status("Chunks", &summary.chunks.len().to_string(), false);
    terminal::print_status("Written", &format_bytes(summary.bytes_written()), true);
    terminal::print_status("Time", &format_duration(summary.duration), false);

    for chunk in &summary.chunks {
        terminal::print_sub_item(&chunk.path.display().to_string());
    }

    if summary.samples == 0 {
        terminal::print_warning("No detection files found; output holds no samples");
    }
}

/// Runs the convert command.
pub fn run_convert(args: ConvertArgs) -> CliResult<ConversionSummary> {
    let archives = discover_input_archives(&args)?;
    let config = create_core_config(&args)?;
    display_configuration(&config, &archives, &args.output_template);

    terminal::print_processing(&format!("Converting {} archive(s)", archives.len()));
    let summary = convert_archives(&config, &archives, &args.output_template)?;
    display_summary(&summary);
    Ok(summary)
}

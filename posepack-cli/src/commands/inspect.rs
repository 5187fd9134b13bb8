//! Implementation of the 'inspect' subcommand.

use crate::cli::InspectArgs;
use crate::error::{CliErrorContext, CliResult};

use posepack_core::terminal;
use posepack_core::{format_bytes, inspect_archive, ArrayEntry};

/// One line per array: name, dtype and shape.
pub fn describe_entry(entry: &ArrayEntry) -> String {
    let shape: Vec<String> = entry.shape.iter().map(ToString::to_string).collect();
    format!("{}  {} [{}]", entry.name, entry.dtype, shape.join(", "))
}

/// Runs the inspect command.
pub fn run_inspect(args: InspectArgs) -> CliResult<Vec<ArrayEntry>> {
    let entries = inspect_archive(&args.archive)
        .cli_with_context(|| format!("Failed to inspect '{}'", args.archive.display()))?;

    terminal::print_section("ARCHIVE CONTENTS");
    terminal::print_status("Archive", &args.archive.display().to_string(), false);
    terminal::print_status("Arrays", &entries.len().to_string(), true);
    let total: u64 = entries.iter().map(|e| e.size).sum();
    terminal::print_status("Array bytes", &format_bytes(total), false);

    terminal::print_processing("Entries");
    for entry in &entries {
        terminal::print_sub_item(&describe_entry(entry));
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use posepack_core::Dtype;

    #[test]
    fn test_describe_entry() {
        let entry = ArrayEntry {
            name: "poses/pose/a.npy".to_string(),
            dtype: Dtype::F16,
            shape: vec![12, 25, 3],
            size: 1000,
        };
        assert_eq!(describe_entry(&entry), "poses/pose/a.npy  float16 [12, 25, 3]");
    }
}

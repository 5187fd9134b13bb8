//! Discovery of keypoint archives to convert.
//!
//! Only the top level of the given directory is searched.

use crate::archive::is_archive_name;
use crate::error::{CoreError, CoreResult};

use std::path::{Path, PathBuf};

/// Finds `.tar`, `.tar.gz`, `.tgz` and `.tar.bz2` files (case-insensitive) in `input_dir`.
///
/// The result is sorted by path so that runs over the same directory produce
/// the same output.
///
/// # Errors
///
/// * `CoreError::Io` - the directory cannot be read
/// * `CoreError::NoArchivesFound` - no archive is present
///
/// # Examples
///
/// ```rust,no_run
/// use posepack_core::find_keypoint_archives;
/// use std::path::Path;
///
/// for archive in find_keypoint_archives(Path::new("/data/openpose")).unwrap() {
///     println!("{}", archive.display());
/// }
/// ```
pub fn find_keypoint_archives(input_dir: &Path) -> CoreResult<Vec<PathBuf>> {
    let read_dir = std::fs::read_dir(input_dir)?;
    let mut files: Vec<PathBuf> = read_dir
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            if !path.is_file() {
                return None;
            }
            path.file_name()
                .and_then(|name| name.to_str())
                .filter(|name| is_archive_name(name))
                .map(|_| path.clone())
        })
        .collect();

    if files.is_empty() {
        return Err(CoreError::NoArchivesFound);
    }
    files.sort();
    Ok(files)
}

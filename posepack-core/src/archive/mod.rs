//! Tar archive input and output.
//!
//! - [`reader`]: forward-only reading of detection files, including files
//!   inside nested sub-archives.
//! - [`writer`]: in-memory tar assembly and size-bounded chunked output.

pub mod reader;
pub mod writer;

pub use reader::{
    open_detection_members, ArchiveDecoder, DetectionMember, DetectionMembers, MemberHeader,
    TarStream,
};
pub use writer::{ArchiveWriter, Blob, ChunkTemplate, ChunkedArchiveWriter, WrittenChunk};

use std::path::Path;

/// Suffix of the per-frame detection files produced by OpenPose.
pub const DETECTION_SUFFIX: &str = "_keypoints.json";

const GZIP_SUFFIXES: &[&str] = &[".tar.gz", ".tgz"];
const BZIP2_SUFFIXES: &[&str] = &[".tar.bz2", ".tbz2"];

/// Compression of an archive stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Bzip2,
}

impl Compression {
    /// Picks the compression from a file name: gzip for `.tar.gz` and `.tgz`,
    /// bzip2 for `.tar.bz2` and `.tbz2`.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        compression_of(&name).unwrap_or_default()
    }
}

fn compression_of(name: &str) -> Option<Compression> {
    let lower = name.to_lowercase();
    let has_suffix = |suffixes: &[&str]| suffixes.iter().any(|suffix| lower.ends_with(suffix));
    if has_suffix(GZIP_SUFFIXES) {
        Some(Compression::Gzip)
    } else if has_suffix(BZIP2_SUFFIXES) {
        Some(Compression::Bzip2)
    } else if lower.ends_with(".tar") {
        Some(Compression::None)
    } else {
        None
    }
}

/// Whether a member name denotes a per-frame detection file.
pub fn is_detection_file(name: &str) -> bool {
    name.ends_with(DETECTION_SUFFIX)
}

/// Compression of a member that is itself a tar archive, `None` for other members.
pub fn nested_archive_kind(name: &str) -> Option<Compression> {
    compression_of(name)
}

/// Whether a file name looks like a tar archive, compressed or not.
pub fn is_archive_name(name: &str) -> bool {
    nested_archive_kind(name).is_some()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_from_path() {
        assert_eq!(Compression::from_path(Path::new("a/b.tar.gz")), Compression::Gzip);
        assert_eq!(Compression::from_path(Path::new("b.TGZ")), Compression::Gzip);
        assert_eq!(Compression::from_path(Path::new("b.tar.bz2")), Compression::Bzip2);
        assert_eq!(Compression::from_path(Path::new("b.tar")), Compression::None);
        assert_eq!(Compression::from_path(Path::new("b")), Compression::None);
    }

    #[test]
    fn test_member_classification() {
        assert!(is_detection_file("x/vid_000000000001_keypoints.json"));
        assert!(!is_detection_file("x/vid_keypoints.json.bak"));
        assert_eq!(nested_archive_kind("a/b.tgz"), Some(Compression::Gzip));
        assert_eq!(nested_archive_kind("a/b.tar"), Some(Compression::None));
        assert_eq!(nested_archive_kind("a/b.TAR.BZ2"), Some(Compression::Bzip2));
        assert_eq!(nested_archive_kind("a/b.zip"), None);
        assert!(is_archive_name("poses.tar.gz"));
        assert!(!is_archive_name("poses.json"));
    }
}

//! Listing of the arrays stored in a converted archive.

use crate::archive::{ArchiveDecoder, Compression, TarStream};
use crate::error::{CoreError, CoreResult};
use crate::npy::{Dtype, NpyArray};

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// One `.npy` entry of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayEntry {
    pub name: String,
    pub dtype: Dtype,
    pub shape: Vec<usize>,
    /// Entry size in the archive, header included.
    pub size: u64,
}

impl ArrayEntry {
    /// Number of frames, i.e. the length of the leading axis.
    pub fn frames(&self) -> Option<usize> {
        self.shape.first().copied()
    }
}

/// Decodes the header of every `.npy` entry of the archive at `path`.
pub fn inspect_archive(path: &Path) -> CoreResult<Vec<ArrayEntry>> {
    let name = path.display().to_string();
    let file = File::open(path).map_err(|e| CoreError::archive_read(&name, e))?;
    let decoder = ArchiveDecoder::new(BufReader::new(file), Compression::from_path(path));
    inspect_stream(decoder, &name)
}

/// Like [`inspect_archive`], over an uncompressed tar stream.
pub fn inspect_stream<R: Read>(reader: R, archive_name: &str) -> CoreResult<Vec<ArrayEntry>> {
    let mut stream = TarStream::new(reader);
    let mut entries = Vec::new();

    while let Some(header) = stream
        .next_member()
        .map_err(|e| CoreError::archive_read(archive_name, e))?
    {
        if !header.is_file || !header.name.ends_with(".npy") {
            continue;
        }
        let data = stream
            .read_payload()
            .map_err(|e| CoreError::archive_read(&header.name, e))?;
        let array = NpyArray::decode(&data)
            .map_err(|e| CoreError::archive_read(&header.name, e))?;
        entries.push(ArrayEntry {
            name: header.name,
            dtype: array.dtype(),
            shape: array.shape().to_vec(),
            size: header.size,
        });
    }

    Ok(entries)
}

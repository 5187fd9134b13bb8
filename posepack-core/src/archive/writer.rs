//! Tar output: an in-memory archive buffer and a size-bounded chunker on top of it.

use crate::error::{CoreError, CoreResult};
use crate::npy::NpyArray;

use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Permission bits of every written entry.
const ENTRY_MODE: u32 = 0o644;

/// Content of one archive entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Blob {
    Bytes(Vec<u8>),
    /// UTF-8 text, stored as its bytes.
    Text(String),
    /// An array, stored in NPY v1.0 format.
    Array(NpyArray),
}

impl Blob {
    /// Serialized entry payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Blob::Bytes(bytes) => bytes.clone(),
            Blob::Text(text) => text.as_bytes().to_vec(),
            Blob::Array(array) => array.encode(),
        }
    }
}

impl From<NpyArray> for Blob {
    fn from(array: NpyArray) -> Self {
        Blob::Array(array)
    }
}

impl From<String> for Blob {
    fn from(text: String) -> Self {
        Blob::Text(text)
    }
}

/// A tar archive assembled in memory and written out in one go.
///
/// [`ArchiveWriter::flush_to`] consumes the writer, so no entry can be added
/// to an archive that has already been written.
pub struct ArchiveWriter {
    builder: tar::Builder<Vec<u8>>,
    entries: usize,
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self {
            builder: tar::Builder::new(Vec::new()),
            entries: 0,
        }
    }

    /// Appends one regular-file entry.
    pub fn add(&mut self, name: &str, blob: &Blob) -> CoreResult<()> {
        let data = blob.to_bytes();
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(ENTRY_MODE);
        header.set_mtime(current_mtime());
        self.builder
            .append_data(&mut header, name, data.as_slice())
            .map_err(|e| CoreError::OperationFailed(format!("cannot add '{name}': {e}")))?;
        self.entries += 1;
        Ok(())
    }

    /// Bytes buffered so far, headers and padding included.
    pub fn buffered_size(&self) -> u64 {
        self.builder.get_ref().len() as u64
    }

    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Terminates the archive and writes it to `path`, creating parent
    /// directories. Returns the number of bytes written.
    pub fn flush_to(self, path: &Path) -> CoreResult<u64> {
        let bytes = self.builder.into_inner()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &bytes)?;
        debug!(
            "Wrote {} ({} entries, {} bytes)",
            path.display(),
            self.entries,
            bytes.len()
        );
        Ok(bytes.len() as u64)
    }
}

fn current_mtime() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// Output path pattern with a chunk-number placeholder.
///
/// The placeholder is `{}` (plain number) or `{:0N}` (zero-padded to `N`
/// digits), e.g. `out/poses-{:05}.tar`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkTemplate {
    prefix: String,
    width: usize,
    suffix: String,
}

impl ChunkTemplate {
    pub fn parse(template: &str) -> CoreResult<Self> {
        let missing = || {
            CoreError::Config(format!(
                "output template '{template}' needs one chunk placeholder ({{}} or {{:0N}})"
            ))
        };

        let start = template.find('{').ok_or_else(missing)?;
        let close = template[start..].find('}').ok_or_else(missing)? + start;
        let spec = &template[start + 1..close];
        let width = match spec {
            "" => 0,
            _ => spec
                .strip_prefix(":0")
                .and_then(|digits| digits.parse::<usize>().ok())
                .ok_or_else(missing)?,
        };

        let suffix = &template[close + 1..];
        if suffix.contains('{') || suffix.contains('}') {
            return Err(missing());
        }

        Ok(Self {
            prefix: template[..start].to_string(),
            width,
            suffix: suffix.to_string(),
        })
    }

    /// Path of chunk `number`.
    pub fn render(&self, number: usize) -> PathBuf {
        PathBuf::from(format!(
            "{}{:0width$}{}",
            self.prefix,
            number,
            self.suffix,
            width = self.width
        ))
    }
}

/// A chunk that has been written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenChunk {
    pub path: PathBuf,
    pub bytes: u64,
    pub entries: usize,
}

/// Splits output across numbered tar files of bounded size.
///
/// After every [`add`](ChunkedArchiveWriter::add) the buffered chunk is
/// flushed once it has reached the threshold. Chunks are numbered from 1.
/// [`finish`](ChunkedArchiveWriter::finish) always writes the last chunk, even
/// when it holds no entries, so every run produces at least one file.
pub struct ChunkedArchiveWriter {
    template: ChunkTemplate,
    max_chunk_size: u64,
    current: ArchiveWriter,
    chunk_number: usize,
    written: Vec<WrittenChunk>,
}

impl ChunkedArchiveWriter {
    pub fn new(template: ChunkTemplate, max_chunk_size: u64) -> Self {
        Self {
            template,
            max_chunk_size,
            current: ArchiveWriter::new(),
            chunk_number: 1,
            written: Vec::new(),
        }
    }

    pub fn add(&mut self, name: &str, blob: &Blob) -> CoreResult<()> {
        self.current.add(name, blob)?;
        if self.current.buffered_size() >= self.max_chunk_size {
            self.flush_current()?;
        }
        Ok(())
    }

    /// Chunks written so far.
    pub fn written(&self) -> &[WrittenChunk] {
        &self.written
    }

    /// Writes the final chunk and returns every chunk of the run.
    pub fn finish(mut self) -> CoreResult<Vec<WrittenChunk>> {
        self.flush_current()?;
        Ok(self.written)
    }

    fn flush_current(&mut self) -> CoreResult<()> {
        let writer = std::mem::take(&mut self.current);
        let entries = writer.entry_count();
        let path = self.template.render(self.chunk_number);
        let bytes = writer.flush_to(&path)?;
        info!("Chunk {} written: {}", self.chunk_number, path.display());
        self.written.push(WrittenChunk {
            path,
            bytes,
            entries,
        });
        self.chunk_number += 1;
        Ok(())
    }
}

//! Forward-only tar readers.
//!
//! [`TarStream`] walks the headers of a tar stream one member at a time and
//! owns its underlying reader, so a member's payload can be handed off as a
//! reader in its own right ([`Payload`]) and later turned back into the
//! stream. That is what lets [`DetectionMembers`] descend into a compressed
//! sub-archive without buffering it and without borrowing across iterator
//! calls.

use super::{is_detection_file, nested_archive_kind, Compression};
use crate::error::{CoreError, CoreResult};

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use log::debug;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

const BLOCK_SIZE: u64 = 512;

/// Payloads larger than this are not preallocated up front.
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// Header information of one tar member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberHeader {
    /// Full member path, with GNU long-name and PAX `path` overrides applied.
    pub name: String,
    pub size: u64,
    /// Regular file (as opposed to directory, link, device, ...).
    pub is_file: bool,
}

/// A single-pass reader over the members of a tar stream.
///
/// Call [`TarStream::next_member`] to advance; the payload of the current
/// member can then be read with [`TarStream::read_payload`] or handed off with
/// [`TarStream::into_payload`]. Unread payload bytes are skipped on the next
/// advance.
#[derive(Debug)]
pub struct TarStream<R> {
    reader: R,
    remaining: u64,
    padding: u64,
    finished: bool,
}

impl<R: Read> TarStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            remaining: 0,
            padding: 0,
            finished: false,
        }
    }

    /// Advances to the next member, or returns `None` at the end of the archive.
    ///
    /// GNU long-name records and PAX `path`/`size` records are applied to the
    /// member that follows them.
    pub fn next_member(&mut self) -> io::Result<Option<MemberHeader>> {
        let mut long_name: Option<String> = None;
        let mut pax: Option<Vec<u8>> = None;

        loop {
            self.skip_current()?;
            if self.finished {
                return Ok(None);
            }

            let Some(block) = self.read_block()? else {
                self.finished = true;
                return Ok(None);
            };
            if block.iter().all(|b| *b == 0) {
                self.finished = true;
                return Ok(None);
            }

            let header = tar::Header::from_byte_slice(&block);
            verify_checksum(header)?;

            let entry_type = header.entry_type();
            if entry_type.is_gnu_longname() {
                self.begin_member(header.entry_size()?);
                long_name = Some(trim_nul(&self.read_payload()?));
                continue;
            }
            if entry_type.is_pax_local_extensions() {
                self.begin_member(header.entry_size()?);
                pax = Some(self.read_payload()?);
                continue;
            }
            if entry_type.is_pax_global_extensions() || entry_type.is_gnu_longlink() {
                self.begin_member(header.entry_size()?);
                continue;
            }

            let mut name = match long_name.take() {
                Some(name) => name,
                None => String::from_utf8_lossy(&header.path_bytes()).into_owned(),
            };
            let mut size = header.entry_size()?;
            if let Some(data) = pax.take() {
                apply_pax_records(&data, &mut name, &mut size)?;
            }
            self.begin_member(size);

            return Ok(Some(MemberHeader {
                name,
                size,
                is_file: entry_type.is_file(),
            }));
        }
    }

    /// Reads the whole payload of the current member.
    pub fn read_payload(&mut self) -> io::Result<Vec<u8>> {
        let expected = self.remaining;
        let mut data = Vec::with_capacity(expected.min(MAX_PREALLOC) as usize);
        (&mut self.reader).take(expected).read_to_end(&mut data)?;
        self.remaining = 0;
        if (data.len() as u64) < expected {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("member truncated: {} of {expected} bytes", data.len()),
            ));
        }
        Ok(data)
    }

    /// Hands the payload of the current member off as a reader.
    pub fn into_payload(self) -> Payload<R> {
        Payload { stream: self }
    }

    /// Returns the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn begin_member(&mut self, size: u64) {
        self.remaining = size;
        self.padding = (BLOCK_SIZE - size % BLOCK_SIZE) % BLOCK_SIZE;
    }

    fn skip_current(&mut self) -> io::Result<()> {
        let skip = self.remaining + self.padding;
        if skip > 0 {
            let skipped = io::copy(&mut (&mut self.reader).take(skip), &mut io::sink())?;
            if skipped < skip {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "archive ends inside a member",
                ));
            }
        }
        self.remaining = 0;
        self.padding = 0;
        Ok(())
    }

    /// Reads one header block. `None` on a clean end of stream.
    fn read_block(&mut self) -> io::Result<Option<[u8; BLOCK_SIZE as usize]>> {
        let mut block = [0u8; BLOCK_SIZE as usize];
        let mut filled = 0;
        while filled < block.len() {
            match self.reader.read(&mut block[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        match filled {
            0 => Ok(None),
            n if n == block.len() => Ok(Some(block)),
            n => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("truncated tar header ({n} bytes)"),
            )),
        }
    }
}

/// The payload of one member, readable on its own.
///
/// [`Payload::finish`] returns the stream it came from; any unread payload is
/// skipped when that stream advances.
#[derive(Debug)]
pub struct Payload<R> {
    stream: TarStream<R>,
}

impl<R: Read> Payload<R> {
    pub fn finish(self) -> TarStream<R> {
        self.stream
    }
}

impl<R: Read> Read for Payload<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let stream = &mut self.stream;
        if stream.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = buf.len().min(stream.remaining.min(usize::MAX as u64) as usize);
        let n = stream.reader.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "archive ends inside a member",
            ));
        }
        stream.remaining -= n as u64;
        Ok(n)
    }
}

/// A byte stream that may be gzip- or bzip2-compressed.
///
/// Concatenated compressed members are read through to the end of the stream.
pub enum ArchiveDecoder<R: Read> {
    Plain(R),
    Gzip(MultiGzDecoder<R>),
    Bzip2(MultiBzDecoder<R>),
}

impl<R: Read> ArchiveDecoder<R> {
    pub fn new(reader: R, compression: Compression) -> Self {
        match compression {
            Compression::None => ArchiveDecoder::Plain(reader),
            Compression::Gzip => ArchiveDecoder::Gzip(MultiGzDecoder::new(reader)),
            Compression::Bzip2 => ArchiveDecoder::Bzip2(MultiBzDecoder::new(reader)),
        }
    }

    pub fn into_inner(self) -> R {
        match self {
            ArchiveDecoder::Plain(reader) => reader,
            ArchiveDecoder::Gzip(decoder) => decoder.into_inner(),
            ArchiveDecoder::Bzip2(decoder) => decoder.into_inner(),
        }
    }
}

impl<R: Read> Read for ArchiveDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ArchiveDecoder::Plain(reader) => reader.read(buf),
            ArchiveDecoder::Gzip(decoder) => decoder.read(buf),
            ArchiveDecoder::Bzip2(decoder) => decoder.read(buf),
        }
    }
}

/// One detection file read from an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionMember {
    /// Member path; for nested archives `<sub-archive member>/<inner member>`.
    pub name: String,
    pub data: Vec<u8>,
}

type NestedStream<R> = TarStream<ArchiveDecoder<Payload<R>>>;

enum Level<R: Read> {
    Outer(TarStream<R>),
    Nested { name: String, stream: NestedStream<R> },
    Done,
}

/// Pull iterator over the detection files (`*_keypoints.json`) of an archive.
///
/// With nested traversal enabled, detection files are taken from the
/// sub-archives (`.tar.gz`, `.tgz`, `.tar.bz2`, `.tbz2`, `.tar` members) of
/// the outer archive, one level deep. The first error ends the iteration.
pub struct DetectionMembers<R: Read> {
    archive_name: String,
    nested: bool,
    level: Level<R>,
}

/// Detection members of an archive file on disk.
pub type FileDetectionMembers = DetectionMembers<ArchiveDecoder<BufReader<File>>>;

impl<R: Read> DetectionMembers<R> {
    /// Iterates the tar stream `reader`. `archive_name` names the archive in errors.
    pub fn new(reader: R, archive_name: impl Into<String>, nested: bool) -> Self {
        Self {
            archive_name: archive_name.into(),
            nested,
            level: Level::Outer(TarStream::new(reader)),
        }
    }

    fn advance(&mut self) -> CoreResult<Option<DetectionMember>> {
        loop {
            match std::mem::replace(&mut self.level, Level::Done) {
                Level::Done => return Ok(None),
                Level::Outer(mut outer) => {
                    let Some(header) = outer
                        .next_member()
                        .map_err(|e| CoreError::archive_read(&self.archive_name, e))?
                    else {
                        return Ok(None);
                    };

                    if !header.is_file {
                        self.level = Level::Outer(outer);
                        continue;
                    }

                    if self.nested {
                        match nested_archive_kind(&header.name) {
                            Some(compression) => {
                                debug!("Descending into sub-archive {}", header.name);
                                let decoder = ArchiveDecoder::new(outer.into_payload(), compression);
                                self.level = Level::Nested {
                                    name: header.name,
                                    stream: TarStream::new(decoder),
                                };
                            }
                            None => self.level = Level::Outer(outer),
                        }
                        continue;
                    }

                    if is_detection_file(&header.name) {
                        let data = outer
                            .read_payload()
                            .map_err(|e| CoreError::archive_read(&header.name, e))?;
                        self.level = Level::Outer(outer);
                        return Ok(Some(DetectionMember {
                            name: header.name,
                            data,
                        }));
                    }
                    self.level = Level::Outer(outer);
                }
                Level::Nested { name, mut stream } => {
                    let next = stream
                        .next_member()
                        .map_err(|e| CoreError::archive_read(&name, e))?;
                    match next {
                        None => {
                            let outer = stream.into_inner().into_inner().finish();
                            self.level = Level::Outer(outer);
                        }
                        Some(header) if header.is_file && is_detection_file(&header.name) => {
                            let full_name = format!("{name}/{}", header.name);
                            let data = stream
                                .read_payload()
                                .map_err(|e| CoreError::archive_read(&full_name, e))?;
                            self.level = Level::Nested { name, stream };
                            return Ok(Some(DetectionMember {
                                name: full_name,
                                data,
                            }));
                        }
                        Some(_) => self.level = Level::Nested { name, stream },
                    }
                }
            }
        }
    }
}

impl<R: Read> Iterator for DetectionMembers<R> {
    type Item = CoreResult<DetectionMember>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().transpose()
    }
}

/// Opens an archive file, decompressing it according to its name (see [`Compression::from_path`]).
pub fn open_detection_members(path: &Path, nested: bool) -> CoreResult<FileDetectionMembers> {
    let name = path.display().to_string();
    let file = File::open(path).map_err(|e| CoreError::archive_read(&name, e))?;
    let compression = Compression::from_path(path);
    debug!("Opening {name} ({compression:?})");
    let decoder = ArchiveDecoder::new(BufReader::new(file), compression);
    Ok(DetectionMembers::new(decoder, name, nested))
}

fn verify_checksum(header: &tar::Header) -> io::Result<()> {
    let stored = header.cksum()?;
    let mut recomputed = header.clone();
    recomputed.set_cksum();
    let computed = recomputed.cksum()?;
    if stored != computed {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("tar header checksum mismatch (stored {stored}, computed {computed})"),
        ));
    }
    Ok(())
}

fn trim_nul(data: &[u8]) -> String {
    let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

/// Applies the `path` and `size` records of a PAX extended header.
fn apply_pax_records(data: &[u8], name: &mut String, size: &mut u64) -> io::Result<()> {
    for extension in tar::PaxExtensions::new(data) {
        let extension = extension?;
        match extension.key() {
            Ok("path") => *name = String::from_utf8_lossy(extension.value_bytes()).into_owned(),
            Ok("size") => {
                *size = extension
                    .value()
                    .ok()
                    .and_then(|value| value.parse().ok())
                    .ok_or_else(|| {
                        io::Error::new(io::ErrorKind::InvalidData, "malformed pax size record")
                    })?;
            }
            _ => {}
        }
    }
    Ok(())
}

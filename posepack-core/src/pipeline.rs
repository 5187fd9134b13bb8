//! Conversion pipeline: detection files in, chunked NPY archives out.
//!
//! [`SampleStream`] pulls detection files from an archive, decodes them and
//! yields completed samples one at a time. [`convert_archives`] drains one or
//! more streams into a [`ChunkedArchiveWriter`].

use crate::archive::{
    open_detection_members, ArchiveDecoder, Blob, ChunkTemplate, ChunkedArchiveWriter,
    DetectionMember, DetectionMembers, WrittenChunk,
};
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::frame::{decode_frame, DetectionRecord, FrameLayout, FrameStatus};
use crate::npy::NpyArray;
use crate::sample::{Sample, SampleAggregator};
use crate::terminal;

use indicatif::ProgressBar;
use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Splits a detection member name into `(sample_id, frame_index)`.
///
/// Only the basename is considered. It is split on its last two underscores,
/// so sample ids may themselves contain underscores:
/// `clips/signer_07_000000000012_keypoints.json` gives `("signer_07", 12)`.
pub fn parse_member_name(name: &str) -> CoreResult<(String, u64)> {
    let basename = name.rsplit('/').next().unwrap_or(name);
    let mut parts = basename.rsplitn(3, '_');
    let (Some(_suffix), Some(frame), Some(sample_id)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(CoreError::MalformedMemberName(name.to_string()));
    };

    let frame_index = frame
        .parse::<u64>()
        .map_err(|_| CoreError::MalformedMemberName(name.to_string()))?;
    Ok((sample_id.to_string(), frame_index))
}

/// Pull iterator over the samples of one archive.
///
/// Each call to `next` reads detection files until a sample is complete. The
/// first error ends the stream.
pub struct SampleStream<R: Read> {
    members: DetectionMembers<R>,
    layout: FrameLayout,
    aggregator: SampleAggregator,
    progress: ProgressBar,
    members_read: u64,
    finished: bool,
}

/// Samples of an archive file on disk.
pub type FileSampleStream = SampleStream<ArchiveDecoder<BufReader<File>>>;

impl<R: Read> SampleStream<R> {
    pub fn new(members: DetectionMembers<R>, layout: FrameLayout, progress: ProgressBar) -> Self {
        let aggregator = SampleAggregator::new(layout.n_coords());
        Self {
            members,
            layout,
            aggregator,
            progress,
            members_read: 0,
            finished: false,
        }
    }

    /// Detection files consumed so far.
    pub fn members_read(&self) -> u64 {
        self.members_read
    }

    fn pull(&mut self) -> CoreResult<Option<Sample>> {
        while let Some(member) = self.members.next() {
            let member = member?;
            self.members_read += 1;
            self.progress.inc(1);
            if let Some(sample) = self.ingest(member)? {
                return Ok(Some(sample));
            }
        }
        self.progress.finish_and_clear();
        self.finished = true;
        self.aggregator.flush_final()
    }

    fn ingest(&mut self, member: DetectionMember) -> CoreResult<Option<Sample>> {
        let (sample_id, frame_index) = parse_member_name(&member.name)?;
        let record = DetectionRecord::from_slice(&member.data).map_err(|source| {
            CoreError::InvalidDetection {
                member: member.name.clone(),
                source,
            }
        })?;
        let frame = decode_frame(&record, &self.layout)?;
        self.aggregator.ingest(&sample_id, frame_index, frame)
    }
}

impl FileSampleStream {
    /// Opens an archive file with the traversal and layout options of `config`.
    pub fn open(path: &Path, config: &CoreConfig) -> CoreResult<Self> {
        info!("Reading {}", path.display());
        let members = open_detection_members(path, config.sub_tars)?;
        let progress = terminal::create_spinner("Detection files read", config.show_progress);
        Ok(Self::new(members, config.frame_layout(), progress))
    }
}

impl<R: Read> Iterator for SampleStream<R> {
    type Item = CoreResult<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.pull() {
            Ok(sample) => sample.map(Ok),
            Err(e) => {
                self.finished = true;
                self.progress.abandon();
                Some(Err(e))
            }
        }
    }
}

/// Totals of a conversion run.
#[derive(Debug, Clone, Default)]
pub struct ConversionSummary {
    pub archives: usize,
    pub detection_files: u64,
    pub samples: usize,
    pub frames: usize,
    pub ok_frames: usize,
    pub missing_person_frames: usize,
    pub multiple_people_frames: usize,
    pub chunks: Vec<WrittenChunk>,
    pub duration: Duration,
}

impl ConversionSummary {
    fn record(&mut self, sample: &Sample) {
        self.samples += 1;
        self.frames += sample.frame_count;
        self.ok_frames += sample.count_status(FrameStatus::Ok);
        self.missing_person_frames += sample.count_status(FrameStatus::MissingPerson);
        self.multiple_people_frames += sample.count_status(FrameStatus::MultiplePeople);
    }

    /// Total size of all written chunks.
    pub fn bytes_written(&self) -> u64 {
        self.chunks.iter().map(|chunk| chunk.bytes).sum()
    }

    pub fn chunk_paths(&self) -> Vec<&Path> {
        self.chunks.iter().map(|chunk| chunk.path.as_path()).collect()
    }
}

/// Converts one archive. See [`convert_archives`].
pub fn convert_archive(
    config: &CoreConfig,
    source: &Path,
    dest_template: &str,
) -> CoreResult<ConversionSummary> {
    convert_archives(config, &[source.to_path_buf()], dest_template)
}

/// Converts archives in order into one chunked output.
///
/// `dest_template` names the output chunks and must hold a chunk-number
/// placeholder (`{}` or `{:0N}`). Chunks flushed before an error stay on disk.
pub fn convert_archives(
    config: &CoreConfig,
    sources: &[PathBuf],
    dest_template: &str,
) -> CoreResult<ConversionSummary> {
    config.validate()?;
    let template = ChunkTemplate::parse(dest_template)?;
    let start = Instant::now();

    let mut writer = ChunkedArchiveWriter::new(template, config.max_chunk_size);
    let mut summary = ConversionSummary::default();

    for source in sources {
        let mut stream = FileSampleStream::open(source, config)?;
        for sample in stream.by_ref() {
            let sample = sample?;
            write_sample(&mut writer, &sample, config)?;
            summary.record(&sample);
        }
        summary.archives += 1;
        summary.detection_files += stream.members_read();
    }

    summary.chunks = writer.finish()?;
    summary.duration = start.elapsed();
    info!(
        "Converted {} samples ({} frames) into {} chunk(s)",
        summary.samples,
        summary.frames,
        summary.chunks.len()
    );
    Ok(summary)
}

/// Adds the region arrays (and optionally the status sidecar) of one sample.
///
/// Arrays are added in the order of `config.body_regions`.
pub fn write_sample(
    writer: &mut ChunkedArchiveWriter,
    sample: &Sample,
    config: &CoreConfig,
) -> CoreResult<()> {
    for &region in &config.body_regions {
        let Some(tensor) = sample.regions.get(&region) else {
            continue;
        };
        let name = config.layout.array_entry(region, &sample.id);
        writer.add(&name, &Blob::Array(NpyArray::from_array(tensor)))?;
    }

    if config.write_frame_statuses {
        let statuses = serde_json::to_string(&sample.frame_statuses).map_err(|e| {
            CoreError::OperationFailed(format!("cannot serialize statuses of '{}': {e}", sample.id))
        })?;
        writer.add(&config.layout.statuses_entry(&sample.id), &Blob::Text(statuses))?;
    }

    debug!(
        "Wrote sample '{}' ({} frames, {} regions)",
        sample.id,
        sample.frame_count,
        sample.regions.len()
    );
    Ok(())
}

//! Core library for re-packaging OpenPose keypoint archives.
//!
//! OpenPose writes one `<sample_id>_<frame_index>_keypoints.json` file per
//! video frame. This crate streams those files out of a tar archive, decodes
//! the keypoints of the configured body regions, merges the frames of each
//! recording into `[frames, landmarks, n_coords]` half-precision arrays and
//! writes them as `.npy` entries into size-bounded tar chunks.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use posepack_core::{convert_archive, BodyRegion, CoreConfigBuilder};
//! use std::path::Path;
//!
//! let config = CoreConfigBuilder::new()
//!     .body_regions([BodyRegion::Pose, BodyRegion::LeftHand, BodyRegion::RightHand])
//!     .n_coords(2)
//!     .max_chunk_size(512 * 1024 * 1024)
//!     .build();
//!
//! let summary = convert_archive(
//!     &config,
//!     Path::new("/data/openpose/train.tar.gz"),
//!     "/data/poses/train-{:05}.tar",
//! )
//! .unwrap();
//! println!("{} samples in {} chunk(s)", summary.samples, summary.chunks.len());
//! ```
//!
//! Library callers that want the samples themselves can iterate a
//! [`SampleStream`] instead.

pub mod archive;
pub mod config;
pub mod discovery;
pub mod error;
pub mod frame;
pub mod inspect;
pub mod islr;
pub mod npy;
pub mod pipeline;
pub mod region;
pub mod sample;
pub mod terminal;
pub mod utils;

// Re-exports for public API
pub use config::{CoreConfig, CoreConfigBuilder, OutputLayout};
pub use discovery::find_keypoint_archives;
pub use error::{CoreError, CoreResult};
pub use frame::{decode_frame, DecodedFrame, DetectionRecord, FrameLayout, FrameStatus};
pub use inspect::{inspect_archive, ArrayEntry};
pub use islr::{write_islr_shard, LabeledSample};
pub use npy::{Dtype, NpyArray};
pub use pipeline::{
    convert_archive, convert_archives, parse_member_name, ConversionSummary, FileSampleStream,
    SampleStream,
};
pub use region::{parse_region_list, BodyRegion, LandmarkTable};
pub use sample::{Sample, SampleAggregator};
pub use utils::{format_bytes, format_duration, parse_byte_size};

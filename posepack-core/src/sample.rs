//! Assembly of decoded frames into per-sample time series.
//!
//! Frames arrive one at a time in archive order. The [`SampleAggregator`]
//! buffers the frames of the sample currently being read and emits a
//! [`Sample`] as soon as a frame of a different sample shows up, so only one
//! sample is ever held in memory.

use crate::error::{CoreError, CoreResult};
use crate::frame::{DecodedFrame, FrameStatus};
use crate::region::BodyRegion;

use half::f16;
use log::debug;
use ndarray::{Array3, ArrayView2, Axis};
use std::collections::BTreeMap;

/// Keypoints of one region over a whole sample, shape `[frames, landmarks, n_coords]`.
pub type RegionTensor = Array3<f16>;

/// The merged time series of one recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub id: String,
    /// Number of distinct frame indices seen. Gaps in the indices are not filled.
    pub frame_count: usize,
    pub n_coords: usize,
    pub regions: BTreeMap<BodyRegion, RegionTensor>,
    /// Status of every frame, in the order of the time axis.
    pub frame_statuses: Vec<FrameStatus>,
}

impl Sample {
    /// Number of frames with the given status.
    #[must_use]
    pub fn count_status(&self, status: FrameStatus) -> usize {
        self.frame_statuses.iter().filter(|s| **s == status).count()
    }
}

/// Buffers frames of the current sample and emits completed samples.
///
/// A sample ends when a frame with a different sample id is ingested or when
/// [`SampleAggregator::flush_final`] is called. A sample id that reappears
/// after another sample's frames starts a new, separate sample.
#[derive(Debug)]
pub struct SampleAggregator {
    n_coords: usize,
    current_sample_id: Option<String>,
    current_frames: BTreeMap<u64, DecodedFrame>,
}

impl SampleAggregator {
    pub fn new(n_coords: usize) -> Self {
        Self {
            n_coords,
            current_sample_id: None,
            current_frames: BTreeMap::new(),
        }
    }

    /// Id of the sample currently being buffered.
    pub fn current_sample_id(&self) -> Option<&str> {
        self.current_sample_id.as_deref()
    }

    /// Number of frames currently buffered.
    pub fn buffered_frames(&self) -> usize {
        self.current_frames.len()
    }

    /// Adds one frame, returning the previous sample if this frame starts a new one.
    ///
    /// A repeated `frame_index` within the same sample replaces the earlier frame.
    pub fn ingest(
        &mut self,
        sample_id: &str,
        frame_index: u64,
        frame: DecodedFrame,
    ) -> CoreResult<Option<Sample>> {
        let same_sample = self.current_sample_id.as_deref() == Some(sample_id);
        let emitted = if same_sample {
            None
        } else {
            let previous = self.take_sample()?;
            self.current_sample_id = Some(sample_id.to_string());
            previous
        };

        if self.current_frames.insert(frame_index, frame).is_some() {
            debug!("Frame {frame_index} of sample '{sample_id}' seen twice, keeping the last one");
        }

        Ok(emitted)
    }

    /// Emits whatever is still buffered and resets the aggregator.
    ///
    /// Returns `None` when nothing is buffered.
    pub fn flush_final(&mut self) -> CoreResult<Option<Sample>> {
        let sample = self.take_sample()?;
        self.current_sample_id = None;
        Ok(sample)
    }

    fn take_sample(&mut self) -> CoreResult<Option<Sample>> {
        let frames = std::mem::take(&mut self.current_frames);
        let Some(id) = self.current_sample_id.clone() else {
            return Ok(None);
        };
        if frames.is_empty() {
            return Ok(None);
        }
        merge_frames(id, self.n_coords, frames).map(Some)
    }
}

/// Stacks frames (already ordered by index) along a new leading time axis.
fn merge_frames(
    id: String,
    n_coords: usize,
    frames: BTreeMap<u64, DecodedFrame>,
) -> CoreResult<Sample> {
    let Some(first) = frames.values().next() else {
        return Err(CoreError::OperationFailed(format!(
            "sample '{id}' has no frames to merge"
        )));
    };
    let region_names: Vec<BodyRegion> = first.regions.keys().copied().collect();

    let mut regions = BTreeMap::new();
    for region in region_names {
        let views = frames
            .iter()
            .map(|(index, frame)| {
                frame.regions.get(&region).map(|a| a.view()).ok_or_else(|| {
                    CoreError::OperationFailed(format!(
                        "frame {index} of sample '{id}' lacks region '{region}'"
                    ))
                })
            })
            .collect::<CoreResult<Vec<ArrayView2<f16>>>>()?;

        let stacked = ndarray::stack(Axis(0), &views).map_err(|e| {
            CoreError::OperationFailed(format!(
                "cannot stack region '{region}' of sample '{id}': {e}"
            ))
        })?;
        regions.insert(region, stacked);
    }

    let frame_statuses: Vec<FrameStatus> = frames.values().map(|frame| frame.status).collect();
    debug!("Merged sample '{id}' ({} frames)", frame_statuses.len());

    Ok(Sample {
        id,
        frame_count: frame_statuses.len(),
        n_coords,
        regions,
        frame_statuses,
    })
}

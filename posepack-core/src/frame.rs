//! Decoding of single OpenPose detection records.
//!
//! A detection record is the JSON written by OpenPose for one video frame. It
//! holds a `people` list; each person carries flat keypoint lists of
//! `x, y, confidence` triplets per body region. Decoding turns one record into
//! a fixed-shape `[landmarks, n_coords]` array per requested region plus a
//! [`FrameStatus`]. Frames without exactly one person decode to all-NaN arrays
//! of the same shape, so downstream code never special-cases shapes.

use crate::error::{CoreError, CoreResult};
use crate::region::{BodyRegion, LandmarkTable};

use half::f16;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Keypoints of one region in one frame, shape `[landmarks, n_coords]`.
pub type Keypoints = Array2<f16>;

/// Detection outcome of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameStatus {
    Ok,
    MissingPerson,
    MultiplePeople,
}

impl FrameStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameStatus::Ok => "ok",
            FrameStatus::MissingPerson => "missing-person",
            FrameStatus::MultiplePeople => "multiple-people",
        }
    }
}

impl fmt::Display for FrameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One OpenPose `*_keypoints.json` document.
///
/// Fields OpenPose writes besides `people` (version, 3D keypoints, ...) are
/// ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionRecord {
    #[serde(default)]
    pub people: Vec<Person>,
}

impl DetectionRecord {
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// One detected person with flat per-region keypoint lists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Person {
    #[serde(default)]
    pose_keypoints_2d: Vec<f32>,
    #[serde(default)]
    face_keypoints_2d: Vec<f32>,
    #[serde(default)]
    hand_left_keypoints_2d: Vec<f32>,
    #[serde(default)]
    hand_right_keypoints_2d: Vec<f32>,
}

impl Person {
    /// Flat keypoint list of `region` (`pose_keypoints_2d`, `hand_left_keypoints_2d`, ...).
    pub fn keypoints(&self, region: BodyRegion) -> &[f32] {
        match region {
            BodyRegion::Pose => &self.pose_keypoints_2d,
            BodyRegion::Face => &self.face_keypoints_2d,
            BodyRegion::LeftHand => &self.hand_left_keypoints_2d,
            BodyRegion::RightHand => &self.hand_right_keypoints_2d,
        }
    }
}

/// Requested regions and array shapes for decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLayout {
    regions: Vec<BodyRegion>,
    n_coords: usize,
    landmarks: LandmarkTable,
}

impl FrameLayout {
    pub fn new(regions: Vec<BodyRegion>, n_coords: usize, landmarks: LandmarkTable) -> Self {
        Self {
            regions,
            n_coords,
            landmarks,
        }
    }

    /// Layout with the default landmark table.
    pub fn with_regions<I>(regions: I, n_coords: usize) -> Self
    where
        I: IntoIterator<Item = BodyRegion>,
    {
        Self::new(regions.into_iter().collect(), n_coords, LandmarkTable::default())
    }

    pub fn regions(&self) -> &[BodyRegion] {
        &self.regions
    }

    pub fn n_coords(&self) -> usize {
        self.n_coords
    }

    /// `(landmarks, n_coords)` for `region`.
    pub fn shape(&self, region: BodyRegion) -> (usize, usize) {
        (self.landmarks.count(region), self.n_coords)
    }
}

/// Result of decoding one detection record.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub status: FrameStatus,
    pub regions: BTreeMap<BodyRegion, Keypoints>,
}

/// Decodes one detection record into per-region keypoint arrays.
pub fn decode_frame(record: &DetectionRecord, layout: &FrameLayout) -> CoreResult<DecodedFrame> {
    let person = match record.people.as_slice() {
        [] => return Ok(empty_frame(FrameStatus::MissingPerson, layout)),
        [person] => person,
        _ => return Ok(empty_frame(FrameStatus::MultiplePeople, layout)),
    };

    let mut regions = BTreeMap::new();
    for &region in layout.regions() {
        let (landmarks, n_coords) = layout.shape(region);
        let keypoints = reshape_keypoints(region, person.keypoints(region), landmarks, n_coords)?;
        regions.insert(region, keypoints);
    }

    Ok(DecodedFrame {
        status: FrameStatus::Ok,
        regions,
    })
}

fn empty_frame(status: FrameStatus, layout: &FrameLayout) -> DecodedFrame {
    let regions = layout
        .regions()
        .iter()
        .map(|&region| (region, nan_keypoints(layout.shape(region))))
        .collect();
    DecodedFrame { status, regions }
}

fn nan_keypoints(shape: (usize, usize)) -> Keypoints {
    Array2::from_elem(shape, f16::NAN)
}

/// Reshapes a flat keypoint list into `[landmarks, n_coords]`.
///
/// The per-landmark stride is inferred from the list length and must be at
/// least `n_coords`; extra trailing values per landmark (the confidence when
/// `n_coords == 2`) are dropped. An empty list means the sub-detector for the
/// region was disabled and yields NaN.
fn reshape_keypoints(
    region: BodyRegion,
    flat: &[f32],
    landmarks: usize,
    n_coords: usize,
) -> CoreResult<Keypoints> {
    if flat.is_empty() {
        return Ok(nan_keypoints((landmarks, n_coords)));
    }

    if landmarks == 0 {
        return Err(CoreError::MalformedFrame {
            region: region.to_string(),
            message: format!("{} values for a region with no landmarks", flat.len()),
        });
    }

    if flat.len() % landmarks != 0 {
        return Err(CoreError::MalformedFrame {
            region: region.to_string(),
            message: format!("{} values do not split into {landmarks} landmarks", flat.len()),
        });
    }

    let stride = flat.len() / landmarks;
    if stride < n_coords {
        return Err(CoreError::MalformedFrame {
            region: region.to_string(),
            message: format!("{stride} values per landmark, {n_coords} requested"),
        });
    }

    let values: Vec<f16> = flat
        .chunks_exact(stride)
        .flat_map(|landmark| landmark[..n_coords].iter().copied().map(f16::from_f32))
        .collect();

    Array2::from_shape_vec((landmarks, n_coords), values).map_err(|e| CoreError::MalformedFrame {
        region: region.to_string(),
        message: e.to_string(),
    })
}

//! Body regions and their landmark counts.
//!
//! OpenPose reports keypoints for up to four body regions per person. Each
//! region has a fixed number of landmarks; the counts live in a
//! [`LandmarkTable`] that is passed explicitly to the frame decoder so that
//! callers (and tests) can vary them without touching global state.

use crate::error::{CoreError, CoreResult};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Landmarks in the BODY_25 pose model.
pub const POSE_LANDMARKS: usize = 25;

/// Landmarks per hand.
pub const HAND_LANDMARKS: usize = 21;

/// Landmarks in the face model.
pub const FACE_LANDMARKS: usize = 70;

/// A named group of keypoints reported by the pose estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BodyRegion {
    Pose,
    LeftHand,
    RightHand,
    Face,
}

impl BodyRegion {
    /// All regions, in the order OpenPose lists them.
    pub const ALL: [BodyRegion; 4] = [
        BodyRegion::Pose,
        BodyRegion::LeftHand,
        BodyRegion::RightHand,
        BodyRegion::Face,
    ];

    /// Name used in configuration and output paths.
    pub fn as_str(self) -> &'static str {
        match self {
            BodyRegion::Pose => "pose",
            BodyRegion::LeftHand => "left_hand",
            BodyRegion::RightHand => "right_hand",
            BodyRegion::Face => "face",
        }
    }
}

impl fmt::Display for BodyRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BodyRegion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pose" => Ok(BodyRegion::Pose),
            "left_hand" => Ok(BodyRegion::LeftHand),
            "right_hand" => Ok(BodyRegion::RightHand),
            "face" => Ok(BodyRegion::Face),
            other => Err(CoreError::UnknownRegion(other.to_string())),
        }
    }
}

impl TryFrom<String> for BodyRegion {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BodyRegion> for String {
    fn from(region: BodyRegion) -> Self {
        region.as_str().to_string()
    }
}

/// Parses a comma-separated region list such as `"pose,left_hand"`.
///
/// Duplicates are dropped while keeping first-seen order. Fails with
/// [`CoreError::UnknownRegion`] on the first unrecognized name.
pub fn parse_region_list(list: &str) -> CoreResult<Vec<BodyRegion>> {
    let mut regions = Vec::new();
    for name in list.split(',').filter(|name| !name.trim().is_empty()) {
        let region: BodyRegion = name.parse()?;
        if !regions.contains(&region) {
            regions.push(region);
        }
    }
    Ok(regions)
}

/// Number of landmarks per body region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkTable {
    pub pose: usize,
    pub left_hand: usize,
    pub right_hand: usize,
    pub face: usize,
}

impl Default for LandmarkTable {
    fn default() -> Self {
        Self {
            pose: POSE_LANDMARKS,
            left_hand: HAND_LANDMARKS,
            right_hand: HAND_LANDMARKS,
            face: FACE_LANDMARKS,
        }
    }
}

impl LandmarkTable {
    #[must_use]
    pub fn count(&self, region: BodyRegion) -> usize {
        match region {
            BodyRegion::Pose => self.pose,
            BodyRegion::LeftHand => self.left_hand,
            BodyRegion::RightHand => self.right_hand,
            BodyRegion::Face => self.face,
        }
    }

    /// Returns a copy of the table with `region` set to `count` landmarks.
    #[must_use]
    pub fn with_count(mut self, region: BodyRegion, count: usize) -> Self {
        match region {
            BodyRegion::Pose => self.pose = count,
            BodyRegion::LeftHand => self.left_hand = count,
            BodyRegion::RightHand => self.right_hand = count,
            BodyRegion::Face => self.face = count,
        }
        self
    }
}

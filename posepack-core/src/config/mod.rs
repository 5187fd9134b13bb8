//! Configuration structures and constants for the posepack-core library.
//!
//! This module provides the configuration for a conversion run: which body
//! regions to extract, the coordinate width, the output chunk threshold and
//! archive traversal options.

mod builder;

use crate::error::{CoreError, CoreResult};
use crate::frame::FrameLayout;
use crate::region::{BodyRegion, LandmarkTable};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use builder::CoreConfigBuilder;

// Default constants

/// Regions extracted when none are requested explicitly.
pub const DEFAULT_BODY_REGIONS: [BodyRegion; 3] =
    [BodyRegion::Pose, BodyRegion::LeftHand, BodyRegion::RightHand];

/// Default coordinate width: x, y and detection confidence.
pub const DEFAULT_N_COORDS: usize = 3;

/// Default output chunk threshold (1 GiB).
pub const DEFAULT_MAX_CHUNK_SIZE: u64 = 1024 * 1024 * 1024;

/// Naming scheme for entries in the output archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputLayout {
    /// `poses/<region>/<sample_id>.npy`
    #[default]
    ByRegion,
    /// `<sample_id>.pose.<region>.npy`, grouped per sample for webdataset readers
    Webdataset,
}

impl OutputLayout {
    /// Entry name for one region tensor of a sample.
    #[must_use]
    pub fn array_entry(self, region: BodyRegion, sample_id: &str) -> String {
        match self {
            OutputLayout::ByRegion => format!("poses/{region}/{sample_id}.npy"),
            OutputLayout::Webdataset => format!("{sample_id}.pose.{region}.npy"),
        }
    }

    /// Entry name for the per-frame status sidecar of a sample.
    #[must_use]
    pub fn statuses_entry(self, sample_id: &str) -> String {
        match self {
            OutputLayout::ByRegion => format!("statuses/{sample_id}.json"),
            OutputLayout::Webdataset => format!("{sample_id}.statuses.json"),
        }
    }
}

impl std::str::FromStr for OutputLayout {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "by-region" => Ok(OutputLayout::ByRegion),
            "webdataset" => Ok(OutputLayout::Webdataset),
            other => Err(CoreError::Config(format!(
                "unknown output layout '{other}' (expected 'by-region' or 'webdataset')"
            ))),
        }
    }
}

/// Main configuration structure for a conversion run.
///
/// Created by the consumer of the library (e.g., posepack-cli), optionally
/// loaded from a JSON file, and passed to [`crate::convert_archive`].
///
/// # Examples
///
/// ```rust
/// use posepack_core::config::CoreConfigBuilder;
/// use posepack_core::BodyRegion;
///
/// let config = CoreConfigBuilder::new()
///     .body_regions([BodyRegion::Pose, BodyRegion::Face])
///     .n_coords(2)
///     .max_chunk_size(64 * 1024 * 1024)
///     .sub_tars(true)
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Regions to extract from every frame; arrays are written in this order
    pub body_regions: Vec<BodyRegion>,

    /// Values kept per landmark (2: x, y; 3: x, y, confidence)
    pub n_coords: usize,

    /// Byte threshold after which the current output chunk is closed
    pub max_chunk_size: u64,

    /// Descend into `.tar.gz`/`.tgz`/`.tar.bz2`/`.tar` members instead of reading
    /// detection files from the outer archive
    pub sub_tars: bool,

    /// Show a spinner while reading. Cosmetic only.
    pub show_progress: bool,

    /// Landmark count per region
    pub landmarks: LandmarkTable,

    /// Output entry naming
    pub layout: OutputLayout,

    /// Also write the per-frame status list of every sample as JSON
    pub write_frame_statuses: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            body_regions: DEFAULT_BODY_REGIONS.to_vec(),
            n_coords: DEFAULT_N_COORDS,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            sub_tars: false,
            show_progress: false,
            landmarks: LandmarkTable::default(),
            layout: OutputLayout::default(),
            write_frame_statuses: false,
        }
    }
}

impl CoreConfig {
    /// Loads a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> CoreResult<Self> {
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| {
            CoreError::Config(format!("failed to parse '{}': {e}", path.display()))
        })
    }

    /// Checks the configuration before any input is touched.
    pub fn validate(&self) -> CoreResult<()> {
        if self.body_regions.is_empty() {
            return Err(CoreError::Config(
                "at least one body region must be requested".to_string(),
            ));
        }

        if !(2..=3).contains(&self.n_coords) {
            return Err(CoreError::Config(format!(
                "n_coords must be 2 or 3, got {}",
                self.n_coords
            )));
        }

        if self.max_chunk_size == 0 {
            return Err(CoreError::Config(
                "max_chunk_size must be greater than zero".to_string(),
            ));
        }

        for (i, region) in self.body_regions.iter().enumerate() {
            if self.body_regions[..i].contains(region) {
                return Err(CoreError::Config(format!(
                    "region '{region}' is requested more than once"
                )));
            }
            if self.landmarks.count(*region) == 0 {
                return Err(CoreError::Config(format!(
                    "region '{region}' has no landmarks"
                )));
            }
        }

        Ok(())
    }

    /// Shape information handed to the frame decoder.
    #[must_use]
    pub fn frame_layout(&self) -> FrameLayout {
        FrameLayout::new(self.body_regions.clone(), self.n_coords, self.landmarks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.n_coords, 3);
        assert_eq!(config.body_regions, DEFAULT_BODY_REGIONS.to_vec());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = CoreConfig::default();
        config.n_coords = 4;
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));

        let mut config = CoreConfig::default();
        config.body_regions.clear();
        assert!(config.validate().is_err());

        let mut config = CoreConfig::default();
        config.max_chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = CoreConfig::default();
        config.landmarks = config.landmarks.with_count(BodyRegion::Pose, 0);
        assert!(config.validate().is_err());

        let mut config = CoreConfig::default();
        config.body_regions = vec![BodyRegion::Face, BodyRegion::Pose, BodyRegion::Face];
        assert!(matches!(config.validate(), Err(CoreError::Config(msg)) if msg.contains("more than once")));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CoreConfig =
            serde_json::from_str(r#"{"body_regions": ["face"], "n_coords": 2}"#).unwrap();
        assert_eq!(config.body_regions, vec![BodyRegion::Face]);
        assert_eq!(config.n_coords, 2);
        assert_eq!(config.max_chunk_size, DEFAULT_MAX_CHUNK_SIZE);
        assert_eq!(config.layout, OutputLayout::ByRegion);
    }

    #[test]
    fn test_output_layout_names() {
        assert_eq!(
            OutputLayout::ByRegion.array_entry(BodyRegion::LeftHand, "s1"),
            "poses/left_hand/s1.npy"
        );
        assert_eq!(
            OutputLayout::Webdataset.array_entry(BodyRegion::Pose, "s1"),
            "s1.pose.pose.npy"
        );
        assert_eq!(OutputLayout::ByRegion.statuses_entry("s1"), "statuses/s1.json");
        assert_eq!("webdataset".parse::<OutputLayout>().unwrap(), OutputLayout::Webdataset);
        assert!("flat".parse::<OutputLayout>().is_err());
    }
}

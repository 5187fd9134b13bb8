// ============================================================================
// posepack-core/src/config/builder.rs
// ============================================================================
//
// CONFIGURATION BUILDER: Builder Pattern for CoreConfig
//
// Fluent construction of CoreConfig instances starting from the library
// defaults. Validation is left to CoreConfig::validate so that the builder
// never fails.

// ---- Internal crate imports ----
use super::{CoreConfig, OutputLayout};
use crate::region::{BodyRegion, LandmarkTable};

/// Builder for creating CoreConfig instances.
///
/// # Examples
///
/// ```rust
/// use posepack_core::config::{CoreConfigBuilder, OutputLayout};
/// use posepack_core::BodyRegion;
///
/// let config = CoreConfigBuilder::new()
///     .body_regions([BodyRegion::Pose])
///     .n_coords(2)
///     .layout(OutputLayout::Webdataset)
///     .write_frame_statuses(true)
///     .build();
/// assert_eq!(config.n_coords, 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    /// Creates a new CoreConfigBuilder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the regions to extract, replacing the defaults.
    pub fn body_regions<I>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = BodyRegion>,
    {
        self.config.body_regions = regions.into_iter().collect();
        self
    }

    /// Sets the number of values kept per landmark (2 or 3).
    pub fn n_coords(mut self, n_coords: usize) -> Self {
        self.config.n_coords = n_coords;
        self
    }

    /// Sets the output chunk threshold in bytes.
    pub fn max_chunk_size(mut self, bytes: u64) -> Self {
        self.config.max_chunk_size = bytes;
        self
    }

    /// Enables traversal of nested sub-archives.
    pub fn sub_tars(mut self, enabled: bool) -> Self {
        self.config.sub_tars = enabled;
        self
    }

    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.config.show_progress = enabled;
        self
    }

    /// Replaces the landmark count table.
    pub fn landmarks(mut self, landmarks: LandmarkTable) -> Self {
        self.config.landmarks = landmarks;
        self
    }

    pub fn layout(mut self, layout: OutputLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn write_frame_statuses(mut self, enabled: bool) -> Self {
        self.config.write_frame_statuses = enabled;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> CoreConfig {
        self.config
    }
}

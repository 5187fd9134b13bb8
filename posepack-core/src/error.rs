use thiserror::Error;

/// Errors produced by posepack-core.
///
/// Every variant is fatal for the run that raised it: tar streams offer no
/// resynchronization point, so the pipeline aborts on the first failure.
/// Chunks that were already written to disk are left in place.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown body region: [{0}]")]
    UnknownRegion(String),

    #[error("Failed to read archive member '{member}': {message}")]
    ArchiveRead { member: String, message: String },

    #[error("Malformed member name '{0}': expected <sample_id>_<frame_index>_keypoints.json")]
    MalformedMemberName(String),

    #[error("Malformed keypoints for region '{region}': {message}")]
    MalformedFrame { region: String, message: String },

    #[error("Invalid detection record in '{member}': {source}")]
    InvalidDetection {
        member: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("NPY error: {0}")]
    Npy(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No keypoint archives found")]
    NoArchivesFound,

    #[error("{0}")]
    OperationFailed(String),
}

impl CoreError {
    /// Builds an [`CoreError::ArchiveRead`] for `member` from any displayable cause.
    pub fn archive_read(member: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        CoreError::ArchiveRead {
            member: member.into(),
            message: cause.to_string(),
        }
    }
}

/// Result type for posepack-core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoseError {
    #[error("Rose error: {0}")]
    Generic(String),
    #[error(transparent)]
    Expected(#[from] RoseExpectedError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors caused by bad input rather than by a bug or the environment. These are safe to show to
/// the user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoseExpectedError {
    #[error("{0}")]
    Generic(String),
    #[error("Invalid track position {position}: positions start at 1")]
    InvalidTrackPosition { position: u32 },
    #[error("Duplicate track position {position} in release {release}")]
    DuplicateTrackPosition { release: String, position: u32 },
    #[error("Track position {position} follows position {previous} in release {release}: positions must increase")]
    TrackPositionOutOfOrder { release: String, position: u32, previous: u32 },
    #[error("Duplicate local track id: {id}")]
    DuplicateTrackId { id: String },
    #[error("Unknown local track id: {id}")]
    UnknownTrack { id: String },
    #[error("Rating {value} is outside the range 0-10")]
    RatingOutOfRange { value: i64 },
    #[error("Invalid rating value: {value}")]
    InvalidRatingValue { value: String },
    #[error("Unknown tag field: {name}")]
    UnknownTagField { name: String },
    #[error("Unknown field policy: {name}")]
    UnknownFieldPolicy { name: String },
    #[error("Configuration file not found ({})", .path.display())]
    ConfigNotFound { path: PathBuf },
    #[error("Failed to decode configuration file: invalid TOML: {0}")]
    ConfigDecode(String),
    #[error("Invalid value for {key} in configuration file ({}): {message}", .path.display())]
    InvalidConfigValue { path: PathBuf, key: String, message: String },
    #[error("Remote rating store error: {0}")]
    RemoteStore(String),
}

pub type Result<T> = std::result::Result<T, RoseError>;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DuskError {
    #[error("Database not found: {0}")]
    NotFound(PathBuf),

    #[error("Database corrupt: {0}")]
    Corrupt(String),

    #[error("Database version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },

    #[error("Path not found in index: {0}")]
    PathNotFound(PathBuf),

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("String of {0} bytes is too long to encode (max 255)")]
    StringTooLong(usize),

    #[error("Seek offset {offset} out of range for {count} entries")]
    SeekOutOfRange { offset: usize, count: usize },

    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Cannot read mount table: {0}")]
    MountTable(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DuskError {
    /// Classify an IO error raised while touching `path`
    pub fn from_io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => DuskError::PathNotFound(path.into()),
            std::io::ErrorKind::PermissionDenied => DuskError::PermissionDenied(path.into()),
            _ => DuskError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, DuskError>;

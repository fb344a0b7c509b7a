//! Error types.

use thiserror::Error;

pub type MapSetResult<T> = Result<T, MapSetError>;

#[derive(Debug, Error)]
pub enum MapSetError {
    #[error("Invalid package header")]
    InvalidHeader,

    #[error("Unsupported package format {found} (supported {min}..={max})")]
    UnsupportedFormat { found: u64, min: u64, max: u64 },

    #[error("Package truncated: need {needed} bytes, file has {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("Section not found: {0}")]
    SectionNotFound(String),

    #[error("Section {tag} out of bounds ({offset}+{len} > {file_len})")]
    SectionOutOfBounds {
        tag: String,
        offset: u64,
        len: u64,
        file_len: usize,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Open failed: {0}")]
    OpenFailed(String),

    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    #[error("Package not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for MapSetError {
    fn from(e: std::io::Error) -> Self {
        MapSetError::Io(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for MapSetError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        MapSetError::LockPoisoned(e.to_string())
    }
}

impl MapSetError {
    pub fn open_failed(msg: impl Into<String>) -> Self {
        MapSetError::OpenFailed(msg.into())
    }

    /// Returns true when the package is readable but written in a format
    /// this build does not understand.
    pub fn is_unsupported_format(&self) -> bool {
        matches!(self, MapSetError::UnsupportedFormat { .. })
    }
}

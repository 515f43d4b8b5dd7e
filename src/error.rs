//! Error taxonomy for the charfinder library
//!
//! Dataset and cache errors are recoverable: malformed dataset lines are skipped
//! and counted, corrupt cache files fall back to a rebuild. Query errors are
//! surfaced to the caller immediately.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, CharFinderError>;

#[derive(Debug, thiserror::Error)]
pub enum CharFinderError {
    #[error("malformed dataset record at line {line}: {reason}")]
    DatasetFormat { line: usize, reason: String },

    #[error("dataset produced no usable entries ({skipped} malformed records skipped)")]
    EmptyIndex { skipped: usize },

    #[error("index cache at {} is unusable: {reason}", path.display())]
    CacheCorrupt { path: PathBuf, reason: String },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid settings file {}: {reason}", path.display())]
    Settings { path: PathBuf, reason: String },

    #[error("background task failed: {0}")]
    Task(String),
}

impl CharFinderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CacheCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that a caller should treat as a cache miss.
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Self::CacheCorrupt { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_cache_is_treated_as_miss() {
        let err = CharFinderError::corrupt("/tmp/index.json", "fingerprint mismatch");
        assert!(err.is_cache_miss());
        assert!(err.to_string().contains("fingerprint mismatch"));

        let err = CharFinderError::InvalidQuery("threshold out of range".to_string());
        assert!(!err.is_cache_miss());
    }

    #[test]
    fn test_io_error_names_the_path() {
        let err = CharFinderError::io(
            "/nonexistent/UnicodeData.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().contains("/nonexistent/UnicodeData.txt"));
    }
}

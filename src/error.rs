//! Error types for the fsarc library
//!
//! All fallible operations return [`Result<T>`]. Variants map onto the
//! behavioral categories of the archive format: plain I/O failures,
//! container (zip) failures, format corruption, broken snapshot chains and
//! patch failures. Argument problems surface as
//! [`ArchiveError::InvalidConfiguration`] before anything touches disk.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the fsarc library
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Main error type for all fsarc operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors raised while walking an input root
    #[error("scan error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Errors reported by the underlying zip container
    #[error("container error: {0}")]
    Container(#[from] zip::result::ZipError),

    /// Malformed archive contents (bad extra field, unknown entry kind, ...)
    #[error("format error: {0}")]
    Format(String),

    /// A member expected to be present in a snapshot is missing
    #[error("entry '{name}' not found in snapshot {archive}")]
    EntryNotFound {
        /// Basename of the snapshot that was searched
        archive: String,
        /// Member name that could not be resolved
        name: String,
    },

    /// A predecessor snapshot named by an `fs_prev` pointer does not exist
    #[error("predecessor snapshot '{name}' not found in archive directory")]
    MissingSnapshot {
        /// Basename of the missing snapshot
        name: String,
    },

    /// Chain walk exceeded the defensive recursion bound
    #[error("chain for '{name}' exceeds {depth} snapshots; archive is likely corrupt")]
    ChainTooDeep {
        /// Member name being rebuilt
        name: String,
        /// Depth at which the walk gave up
        depth: usize,
    },

    /// The binary diff/patch primitive failed
    #[error("patch error: {0}")]
    Patch(String),

    /// The archive directory is not a directory
    #[error("not a directory: {0:?}")]
    NotADirectory(PathBuf),

    /// Invalid option combination or argument value
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ArchiveError {
    /// Create a format error with a custom message
    pub fn format(msg: impl Into<String>) -> Self {
        ArchiveError::Format(msg.into())
    }

    /// Create a patch error with a custom message
    pub fn patch(msg: impl Into<String>) -> Self {
        ArchiveError::Patch(msg.into())
    }

    /// Create a configuration error with a custom message
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        ArchiveError::InvalidConfiguration(msg.into())
    }

    /// Check if this error indicates a corrupt archive or chain
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            ArchiveError::Format(_)
                | ArchiveError::EntryNotFound { .. }
                | ArchiveError::MissingSnapshot { .. }
                | ArchiveError::ChainTooDeep { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ArchiveError::MissingSnapshot {
            name: "fsarc_20240101-000000.zip".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "predecessor snapshot 'fsarc_20240101-000000.zip' not found in archive directory"
        );
    }

    #[test]
    fn test_error_corruption() {
        assert!(ArchiveError::format("truncated record").is_corruption());
        assert!(ArchiveError::ChainTooDeep {
            name: "/t/a".into(),
            depth: 4096
        }
        .is_corruption());
        assert!(!ArchiveError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone"
        ))
        .is_corruption());
    }
}

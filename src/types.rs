//! Operation summaries
//!
//! Lightweight counters returned by the two top-level operations so callers
//! can report what a run did without parsing log output.

use std::path::PathBuf;

/// Summary of one archive-mode run.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStats {
    /// Path of the snapshot that was created (`None` on dry runs)
    pub snapshot: Option<PathBuf>,
    /// Files stored with full contents
    pub new_files: usize,
    /// Files stored as patches against a predecessor
    pub modified: usize,
    /// Files stored as unchanged pointers
    pub unchanged: usize,
    /// Directory members
    pub directories: usize,
    /// Paths dropped by exclusion patterns
    pub excluded: usize,
    /// Regular files dropped by the size cutoff
    pub oversize: usize,
    /// Total original size of the scanned regular files, in bytes
    pub bytes_scanned: u64,
}

impl SnapshotStats {
    /// Total number of members written (or that would be written).
    pub fn members(&self) -> usize {
        self.new_files + self.modified + self.unchanged + self.directories
    }
}

/// Summary of one restore run.
#[derive(Debug, Clone, Default)]
pub struct RestoreStats {
    /// Files whose bytes were materialized
    pub files: usize,
    /// Directories created
    pub directories: usize,
    /// Bytes written to disk
    pub bytes_written: u64,
    /// Metadata-application failures that were logged and skipped
    pub metadata_warnings: usize,
}

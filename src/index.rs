//! Archive-directory index
//!
//! A snapshot lives in an archive directory as `fsarc_YYYYMMDD-HHMMSS.zip`.
//! The timestamp is fixed-width local time, so lexicographic filename order
//! equals creation order and the greatest name is the latest snapshot. The
//! index scans one directory, keeps only regular files carrying the prefix,
//! and exposes the sorted set.

use crate::error::{ArchiveError, Result};
use chrono::Local;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Filename prefix shared by every snapshot archive.
pub const SNAPSHOT_PREFIX: &str = "fsarc_";

/// Snapshot file extension.
pub const SNAPSHOT_SUFFIX: &str = ".zip";

/// Sorted view of the snapshots in one archive directory.
#[derive(Debug)]
pub struct SnapshotIndex {
    dir: PathBuf,
    names: BTreeSet<String>,
}

impl SnapshotIndex {
    /// Scan `dir` for snapshot files. Fails if `dir` does not exist or is
    /// not a directory.
    pub fn scan(dir: &Path) -> Result<SnapshotIndex> {
        let md = fs::metadata(dir)?;
        if !md.is_dir() {
            return Err(ArchiveError::NotADirectory(dir.to_path_buf()));
        }

        let mut names = BTreeSet::new();
        for item in fs::read_dir(dir)? {
            let item = item?;
            if !item.file_type()?.is_file() {
                continue;
            }
            let name = item.file_name().to_string_lossy().into_owned();
            if name.starts_with(SNAPSHOT_PREFIX) {
                names.insert(name);
            }
        }
        debug!("indexed {} snapshots in {:?}", names.len(), dir);
        Ok(SnapshotIndex {
            dir: dir.to_path_buf(),
            names,
        })
    }

    /// The archive directory this index describes.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the directory holds no snapshots yet.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All snapshot basenames in creation order.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Basename of the newest snapshot, if any.
    pub fn latest(&self) -> Option<&str> {
        self.names.iter().next_back().map(String::as_str)
    }

    /// Full path of a snapshot basename inside this directory.
    pub fn path_of(&self, basename: &str) -> PathBuf {
        self.dir.join(basename)
    }
}

/// Compute the basename for a snapshot created now:
/// `fsarc_YYYYMMDD-HHMMSS.zip` in local time.
pub fn next_snapshot_name() -> String {
    format!(
        "{}{}{}",
        SNAPSHOT_PREFIX,
        Local::now().format("%Y%m%d-%H%M%S"),
        SNAPSHOT_SUFFIX
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_scan_orders_by_name() {
        let dir = tempdir().unwrap();
        for name in [
            "fsarc_20240102-000000.zip",
            "fsarc_20240101-235959.zip",
            "fsarc_20240103-120000.zip",
            "unrelated.zip",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("fsarc_directory")).unwrap();

        let index = SnapshotIndex::scan(dir.path()).unwrap();
        let all: Vec<&str> = index.all().collect();
        assert_eq!(
            all,
            vec![
                "fsarc_20240101-235959.zip",
                "fsarc_20240102-000000.zip",
                "fsarc_20240103-120000.zip",
            ]
        );
        assert_eq!(index.latest(), Some("fsarc_20240103-120000.zip"));
    }

    #[test]
    fn test_scan_empty_dir() {
        let dir = tempdir().unwrap();
        let index = SnapshotIndex::scan(dir.path()).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.latest(), None);
    }

    #[test]
    fn test_scan_rejects_non_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plain");
        fs::write(&file, b"").unwrap();
        assert!(matches!(
            SnapshotIndex::scan(&file),
            Err(ArchiveError::NotADirectory(_))
        ));
        assert!(SnapshotIndex::scan(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_next_snapshot_name_shape() {
        let name = next_snapshot_name();
        assert!(name.starts_with(SNAPSHOT_PREFIX));
        assert!(name.ends_with(SNAPSHOT_SUFFIX));
        // fsarc_ + YYYYMMDD-HHMMSS + .zip
        assert_eq!(name.len(), SNAPSHOT_PREFIX.len() + 15 + SNAPSHOT_SUFFIX.len());
    }
}

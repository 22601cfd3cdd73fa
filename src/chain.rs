//! Chain rebuilder
//!
//! A file's bytes at a given snapshot are materialized by following its
//! `fs_prev` pointers: UNC entries forward to the predecessor's version,
//! MOD entries contribute a patch on top of it, and the walk ends at a NEW
//! entry holding full contents. The walk is iterative (collect patches on
//! the way down, apply them oldest-first on the way back) so chain length
//! never translates into stack depth.
//!
//! Opened predecessor archives are cached per batch in an [`ArchiveCache`];
//! one classification pass or one restore shares a single cache, which both
//! skips repeated zip index parsing and keeps the file handles alive for
//! the whole batch.

use crate::archive::SnapshotReader;
use crate::diff;
use crate::error::{ArchiveError, Result};
use crate::meta::EntryKind;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, trace};

/// Defensive bound on chain length. Valid chains cannot cycle, so hitting
/// this means the archive directory is corrupt.
pub const MAX_CHAIN_DEPTH: usize = 4096;

/// Cache of open read-only snapshot archives, keyed by basename.
///
/// Owned by one batch operation and dropped when the batch ends; archive
/// handles are never shared across batches.
#[derive(Debug)]
pub struct ArchiveCache {
    dir: PathBuf,
    open: HashMap<String, SnapshotReader>,
}

impl ArchiveCache {
    /// Create an empty cache over the given archive directory.
    pub fn new(dir: impl Into<PathBuf>) -> ArchiveCache {
        ArchiveCache {
            dir: dir.into(),
            open: HashMap::new(),
        }
    }

    /// Number of archives currently held open.
    pub fn len(&self) -> usize {
        self.open.len()
    }

    /// Whether the cache holds no archives.
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Fetch an open reader for `basename`, opening it on first use.
    pub fn get(&mut self, basename: &str) -> Result<&mut SnapshotReader> {
        match self.open.entry(basename.to_string()) {
            Entry::Occupied(slot) => Ok(slot.into_mut()),
            Entry::Vacant(slot) => {
                let path = self.dir.join(basename);
                if !path.is_file() {
                    return Err(ArchiveError::MissingSnapshot {
                        name: basename.to_string(),
                    });
                }
                trace!("caching snapshot {}", basename);
                Ok(slot.insert(SnapshotReader::open(&path)?))
            }
        }
    }
}

/// Materialize the current bytes of member `name` as seen from `start`.
///
/// `start` is the snapshot the caller already holds open (the one being
/// classified against, or the one being restored); predecessors named by
/// `fs_prev` pointers are resolved through `cache`.
pub fn rebuild(
    start: &mut SnapshotReader,
    name: &str,
    cache: &mut ArchiveCache,
) -> Result<Vec<u8>> {
    let (mut data, mut meta) = start.extract(name)?;
    let mut patches: Vec<(Vec<u8>, u64)> = Vec::new();
    let mut depth = 0usize;

    loop {
        match meta.kind()? {
            EntryKind::New => break,
            EntryKind::Unchanged => {
                trace!("'{}' unchanged, following {}", name, meta.prev_name());
            }
            EntryKind::Modified => {
                trace!("'{}' patched against {}", name, meta.prev_name());
                patches.push((std::mem::take(&mut data), meta.size));
            }
        }

        depth += 1;
        if depth > MAX_CHAIN_DEPTH {
            return Err(ArchiveError::ChainTooDeep {
                name: name.to_string(),
                depth,
            });
        }

        let prev = meta.prev_name();
        if prev.is_empty() {
            return Err(ArchiveError::format(format!(
                "entry '{name}' has no predecessor pointer but is not NEW"
            )));
        }
        let reader = cache.get(prev)?;
        let (next_data, next_meta) = reader.extract(name)?;
        data = next_data;
        meta = next_meta;
    }

    // `data` now holds the origin NEW bytes; patches were collected newest
    // first, so apply in reverse.
    for (patch, expected) in patches.iter().rev() {
        data = diff::bspatch(&data, patch, *expected)?;
    }
    debug!("rebuilt '{}' ({} bytes, {} hops)", name, data.len(), depth);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{Compression, SnapshotWriter};
    use crate::meta::EntryMeta;
    use std::fs;
    use tempfile::tempdir;

    fn meta_for(path: &std::path::Path) -> EntryMeta {
        EntryMeta::from_metadata(&fs::metadata(path).unwrap())
    }

    /// Chain: s1 NEW "hello\n" -> s2 MOD "hello world\n" -> s3 UNC.
    #[test]
    fn test_rebuild_across_new_mod_unc() {
        let arc = tempdir().unwrap();
        let work = tempdir().unwrap();
        let file = work.path().join("a.txt");
        let name = file.to_string_lossy().into_owned();

        fs::write(&file, b"hello\n").unwrap();
        let s1 = "fsarc_20240101-000000.zip";
        let mut w = SnapshotWriter::create(&arc.path().join(s1)).unwrap();
        w.add_file_new(&name, meta_for(&file), Compression::Stored);
        w.commit(|_| {}).unwrap();

        let old = fs::read(&file).unwrap();
        fs::write(&file, b"hello world\n").unwrap();
        let new = fs::read(&file).unwrap();
        let patch = diff::bsdiff(&old, &new).unwrap();
        let s2 = "fsarc_20240101-000001.zip";
        let mut w = SnapshotWriter::create(&arc.path().join(s2)).unwrap();
        w.add_file_bsdiff(&name, meta_for(&file), patch, s1, Compression::Stored);
        w.commit(|_| {}).unwrap();

        let s3 = "fsarc_20240101-000002.zip";
        let mut w = SnapshotWriter::create(&arc.path().join(s3)).unwrap();
        w.add_file_unchanged(&name, meta_for(&file), s2);
        w.commit(|_| {}).unwrap();

        let mut cache = ArchiveCache::new(arc.path());
        let mut latest = SnapshotReader::open(&arc.path().join(s3)).unwrap();
        let bytes = rebuild(&mut latest, &name, &mut cache).unwrap();
        assert_eq!(bytes, b"hello world\n");
        // s1 and s2 were both opened through the cache
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_missing_predecessor_is_fatal() {
        let arc = tempdir().unwrap();
        let work = tempdir().unwrap();
        let file = work.path().join("b.txt");
        fs::write(&file, b"x").unwrap();
        let name = file.to_string_lossy().into_owned();

        let s1 = "fsarc_20240101-000003.zip";
        let mut w = SnapshotWriter::create(&arc.path().join(s1)).unwrap();
        w.add_file_unchanged(&name, meta_for(&file), "fsarc_19990101-000000.zip");
        w.commit(|_| {}).unwrap();

        let mut cache = ArchiveCache::new(arc.path());
        let mut reader = SnapshotReader::open(&arc.path().join(s1)).unwrap();
        assert!(matches!(
            rebuild(&mut reader, &name, &mut cache),
            Err(ArchiveError::MissingSnapshot { .. })
        ));
    }

    #[test]
    fn test_missing_entry_is_fatal() {
        let arc = tempdir().unwrap();
        let s1 = "fsarc_20240101-000004.zip";
        let w = SnapshotWriter::create(&arc.path().join(s1)).unwrap();
        w.commit(|_| {}).unwrap();

        let mut cache = ArchiveCache::new(arc.path());
        let mut reader = SnapshotReader::open(&arc.path().join(s1)).unwrap();
        assert!(matches!(
            rebuild(&mut reader, "/no/such/member", &mut cache),
            Err(ArchiveError::EntryNotFound { .. })
        ));
    }
}

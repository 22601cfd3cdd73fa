//! Snapshot container adapter
//!
//! Hides the zip library behind two types: [`SnapshotReader`], an ordered
//! name → metadata index with byte extraction, and [`SnapshotWriter`], an
//! append-only builder whose adds are deferred until [`SnapshotWriter::commit`].
//!
//! Every member carries its [`EntryMeta`] record in an extra field
//! (id `0xE0E0`), written to both the local and central headers so either
//! side of the container round-trips it. Directory members are stored as
//! zero-byte entries with a trailing `/` in the name.

use crate::error::{ArchiveError, Result};
use crate::meta::{EntryKind, EntryMeta, PREV_LEN};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::read::ZipArchive;
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

/// Entries at or above this size are written in zip64 format.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// Per-entry compression choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No compression ("store")
    Stored,
    /// Deflate; `None` selects the library default level
    Deflated {
        /// Compression level 1..=9, or `None` for the default
        level: Option<i32>,
    },
}

/// Read-only view of an existing snapshot archive.
///
/// Opening enumerates every member and decodes its metadata record up
/// front, so a missing or mis-sized extra field is detected immediately.
pub struct SnapshotReader {
    basename: String,
    zip: ZipArchive<File>,
    entries: BTreeMap<String, EntryMeta>,
}

impl SnapshotReader {
    /// Open a snapshot read-only and index its members.
    pub fn open(path: &Path) -> Result<SnapshotReader> {
        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = File::open(path)?;
        let mut zip = ZipArchive::new(file)?;

        let mut entries = BTreeMap::new();
        for i in 0..zip.len() {
            let member = zip.by_index(i)?;
            let name = member.name().to_string();
            let meta = EntryMeta::from_extra_field(member.extra_data()).map_err(|e| {
                ArchiveError::format(format!("member '{name}' of {basename}: {e}"))
            })?;
            entries.insert(name, meta);
        }
        info!("opened snapshot {} ({} entries)", basename, entries.len());
        Ok(SnapshotReader {
            basename,
            zip,
            entries,
        })
    }

    /// Basename of the snapshot file this reader was opened from.
    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// Lazy view over the in-memory member index, in name order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &EntryMeta)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Metadata for a member, if present.
    pub fn get(&self, name: &str) -> Option<&EntryMeta> {
        self.entries.get(name)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot has no members.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Retrieve a member's stored bytes and metadata record.
    pub fn extract(&mut self, name: &str) -> Result<(Vec<u8>, EntryMeta)> {
        let meta = *self
            .entries
            .get(name)
            .ok_or_else(|| ArchiveError::EntryNotFound {
                archive: self.basename.clone(),
                name: name.to_string(),
            })?;
        let mut member = self.zip.by_name(name)?;
        let mut data = Vec::with_capacity(member.size() as usize);
        member.read_to_end(&mut data)?;
        debug!("extracted '{}' from {} ({} bytes)", name, self.basename, data.len());
        Ok((data, meta))
    }
}

impl std::fmt::Debug for SnapshotReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotReader")
            .field("basename", &self.basename)
            .field("entries", &self.entries.len())
            .finish()
    }
}

enum EntrySource {
    /// Bytes read from this filesystem path at commit time
    Disk(PathBuf),
    /// Bytes held in memory (patch payloads)
    Buffer(Vec<u8>),
    /// Zero-byte marker (unchanged entries)
    Empty,
    /// Directory member
    Directory,
}

struct PendingEntry {
    name: String,
    meta: EntryMeta,
    source: EntrySource,
    compression: Compression,
}

/// Write-side snapshot builder.
///
/// Created exclusively (the path must not exist). Adds are queued in call
/// order and written out by [`SnapshotWriter::commit`]; duplicate member
/// names are rejected with a warning so a bad caller cannot corrupt the
/// index.
pub struct SnapshotWriter {
    path: PathBuf,
    file: Option<File>,
    index: BTreeMap<String, EntryMeta>,
    pending: Vec<PendingEntry>,
}

impl SnapshotWriter {
    /// Create a new snapshot archive. Fails if the file already exists.
    pub fn create(path: &Path) -> Result<SnapshotWriter> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        info!("creating snapshot {:?}", path);
        Ok(SnapshotWriter {
            path: path.to_path_buf(),
            file: Some(file),
            index: BTreeMap::new(),
            pending: Vec::new(),
        })
    }

    /// Path of the snapshot being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of queued members.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no members are queued yet.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn push(&mut self, name: String, meta: EntryMeta, source: EntrySource, compression: Compression) -> bool {
        if self.index.contains_key(&name) {
            warn!("duplicate member '{}' skipped", name);
            return false;
        }
        self.index.insert(name.clone(), meta);
        self.pending.push(PendingEntry {
            name,
            meta,
            source,
            compression,
        });
        true
    }

    fn checked_prev(&self, name: &str, prev: &str) {
        if prev.len() >= PREV_LEN {
            warn!(
                "predecessor name '{}' for '{}' exceeds {} bytes and will be truncated",
                prev,
                name,
                PREV_LEN - 1
            );
        }
    }

    /// Queue a member whose bytes are read from the filesystem path `name`
    /// at commit time. The tag is forced to NEW and the predecessor cleared.
    pub fn add_file_new(&mut self, name: &str, mut meta: EntryMeta, compression: Compression) -> bool {
        meta.set_kind(EntryKind::New);
        meta.clear_prev();
        let source = EntrySource::Disk(PathBuf::from(name));
        self.push(name.to_string(), meta, source, compression)
    }

    /// Queue a member holding `patch` bytes. The tag is forced to MOD and
    /// the predecessor set to `prev`.
    pub fn add_file_bsdiff(
        &mut self,
        name: &str,
        mut meta: EntryMeta,
        patch: Vec<u8>,
        prev: &str,
        compression: Compression,
    ) -> bool {
        self.checked_prev(name, prev);
        meta.set_kind(EntryKind::Modified);
        meta.set_prev(prev);
        self.push(name.to_string(), meta, EntrySource::Buffer(patch), compression)
    }

    /// Queue a zero-byte member marking the file unchanged since `prev`.
    pub fn add_file_unchanged(&mut self, name: &str, mut meta: EntryMeta, prev: &str) -> bool {
        self.checked_prev(name, prev);
        meta.set_kind(EntryKind::Unchanged);
        meta.set_prev(prev);
        self.push(name.to_string(), meta, EntrySource::Empty, Compression::Stored)
    }

    /// Queue a directory member. The record is stored unchanged.
    pub fn add_directory(&mut self, name: &str, meta: EntryMeta) -> bool {
        let member = if name.ends_with('/') {
            name.to_string()
        } else {
            format!("{name}/")
        };
        self.push(member, meta, EntrySource::Directory, Compression::Stored)
    }

    /// Commit all queued members and finish the container. `progress`
    /// receives a fraction in [0, 1], once per written member and once at
    /// completion. On failure, member names whose disk sources are no
    /// longer readable are reported to help diagnose concurrent
    /// filesystem changes.
    pub fn commit(mut self, mut progress: impl FnMut(f64)) -> Result<()> {
        let file = self
            .file
            .take()
            .ok_or_else(|| ArchiveError::format("snapshot already committed".to_string()))?;
        let mut zip = ZipWriter::new(file);

        match Self::write_pending(&mut zip, &self.pending, &mut progress) {
            Ok(()) => {
                zip.finish()?;
                progress(1.0);
                info!("committed snapshot {:?} ({} entries)", self.path, self.pending.len());
                Ok(())
            }
            Err(e) => {
                let unreadable: Vec<&str> = self
                    .pending
                    .iter()
                    .filter_map(|p| match &p.source {
                        EntrySource::Disk(src) if fs::metadata(src).is_err() => {
                            Some(p.name.as_str())
                        }
                        _ => None,
                    })
                    .collect();
                if !unreadable.is_empty() {
                    warn!(
                        "commit of {:?} failed; source files no longer readable: {}",
                        self.path,
                        unreadable.join(", ")
                    );
                }
                Err(e)
            }
        }
    }

    fn write_pending(
        zip: &mut ZipWriter<File>,
        pending: &[PendingEntry],
        progress: &mut impl FnMut(f64),
    ) -> Result<()> {
        let total = pending.len();
        for (i, entry) in pending.iter().enumerate() {
            let method = match entry.compression {
                Compression::Stored => CompressionMethod::Stored,
                Compression::Deflated { .. } => CompressionMethod::Deflated,
            };
            let level = match entry.compression {
                Compression::Deflated { level } => level,
                Compression::Stored => None,
            };
            let large = entry.meta.size >= ZIP64_THRESHOLD
                || matches!(&entry.source, EntrySource::Buffer(b) if b.len() as u64 >= ZIP64_THRESHOLD);
            let options = FileOptions::default()
                .compression_method(method)
                .compression_level(level)
                .unix_permissions(entry.meta.mode & 0o7777)
                .large_file(large);

            // The record goes into both the local and the central extra
            // field, so readers see it whichever header they parse.
            let field = entry.meta.to_extra_field();
            zip.start_file_with_extra_data(&*entry.name, options)?;
            zip.write_all(&field)?;
            zip.end_local_start_central_extra_data()?;
            zip.write_all(&field)?;
            zip.end_extra_data()?;

            match &entry.source {
                EntrySource::Disk(src) => {
                    let mut input = File::open(src)?;
                    io::copy(&mut input, zip)?;
                }
                EntrySource::Buffer(bytes) => zip.write_all(bytes)?,
                EntrySource::Empty | EntrySource::Directory => {}
            }
            progress((i + 1) as f64 / total as f64);
        }
        Ok(())
    }
}

impl std::fmt::Debug for SnapshotWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotWriter")
            .field("path", &self.path)
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn file_meta(path: &Path) -> EntryMeta {
        EntryMeta::from_metadata(&fs::metadata(path).unwrap())
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("payload.txt");
        fs::write(&src, b"hello\n").unwrap();
        let src_name = src.to_string_lossy().into_owned();
        let dir_name = dir.path().to_string_lossy().into_owned();

        let archive = dir.path().join("fsarc_20240101-000000.zip");
        let mut writer = SnapshotWriter::create(&archive).unwrap();
        assert!(writer.add_directory(&dir_name, file_meta(dir.path())));
        assert!(writer.add_file_new(&src_name, file_meta(&src), Compression::Deflated { level: None }));
        assert!(writer.add_file_unchanged("/virtual/unchanged", file_meta(&src), "fsarc_x.zip"));
        assert!(writer.add_file_bsdiff(
            "/virtual/patched",
            file_meta(&src),
            vec![1, 2, 3],
            "fsarc_y.zip",
            Compression::Stored,
        ));
        writer.commit(|_| {}).unwrap();

        let mut reader = SnapshotReader::open(&archive).unwrap();
        assert_eq!(reader.len(), 4);

        let (bytes, meta) = reader.extract(&src_name).unwrap();
        assert_eq!(bytes, b"hello\n");
        assert_eq!(meta.kind().unwrap(), EntryKind::New);
        assert_eq!(meta.prev_name(), "");
        assert_eq!(meta.size, 6);

        let (bytes, meta) = reader.extract("/virtual/unchanged").unwrap();
        assert!(bytes.is_empty());
        assert_eq!(meta.kind().unwrap(), EntryKind::Unchanged);
        assert_eq!(meta.prev_name(), "fsarc_x.zip");

        let (bytes, meta) = reader.extract("/virtual/patched").unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(meta.kind().unwrap(), EntryKind::Modified);
        assert_eq!(meta.prev_name(), "fsarc_y.zip");

        let dir_member = format!("{dir_name}/");
        assert!(reader.get(&dir_member).unwrap().is_dir());
    }

    #[test]
    fn test_duplicate_member_is_skipped() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a");
        fs::write(&src, b"x").unwrap();
        let name = src.to_string_lossy().into_owned();

        let archive = dir.path().join("fsarc_20240101-000001.zip");
        let mut writer = SnapshotWriter::create(&archive).unwrap();
        assert!(writer.add_file_new(&name, file_meta(&src), Compression::Stored));
        assert!(!writer.add_file_new(&name, file_meta(&src), Compression::Stored));
        assert_eq!(writer.len(), 1);
    }

    #[test]
    fn test_create_is_exclusive() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("fsarc_20240101-000002.zip");
        fs::write(&archive, b"").unwrap();
        assert!(SnapshotWriter::create(&archive).is_err());
    }

    #[test]
    fn test_open_missing_is_io_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            SnapshotReader::open(&dir.path().join("absent.zip")),
            Err(ArchiveError::Io(_))
        ));
    }

    #[test]
    fn test_open_rejects_member_without_record() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("plain.zip");
        let mut zip = ZipWriter::new(File::create(&archive).unwrap());
        zip.start_file("naked", FileOptions::default()).unwrap();
        zip.write_all(b"data").unwrap();
        zip.finish().unwrap();

        assert!(matches!(
            SnapshotReader::open(&archive),
            Err(ArchiveError::Format(_))
        ));
    }
}

//! Snapshot classifier and writer
//!
//! Archive mode: scan the input roots, compare every path against the
//! newest snapshot in the archive directory, and emit the next snapshot in
//! the chain. Each regular file becomes one of:
//!
//! - NEW: not present before (or diffing unavailable); full contents
//! - MOD: mtime or size changed; a binary patch against the rebuilt
//!   predecessor version
//! - UNC: unchanged; a zero-byte pointer at the predecessor, shortened to
//!   the predecessor's own ancestor when the predecessor entry was itself
//!   unchanged
//!
//! Deletions are not tracked: a path absent from the scan simply does not
//! appear in the new snapshot. The first snapshot (or any run with the
//! force-new flag) contains only NEW entries and directories.

use crate::archive::{SnapshotReader, SnapshotWriter};
use crate::chain::{self, ArchiveCache};
use crate::config::Config;
use crate::diff;
use crate::error::{ArchiveError, Result};
use crate::index::{self, SnapshotIndex};
use crate::meta::EntryKind;
use crate::scanner::{ScannedEntry, Scanner};
use crate::types::SnapshotStats;
use crate::utils;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Create the next snapshot of `roots` in `archive_dir`.
///
/// `progress` receives commit progress as a fraction in [0, 1]; pass a
/// no-op closure when rendering is not needed. On a dry run nothing is
/// created and `stats.snapshot` stays `None`.
#[instrument(skip_all, fields(dir = %archive_dir.display()))]
pub fn create_snapshot(
    config: &Config,
    archive_dir: &Path,
    roots: &[PathBuf],
    progress: impl FnMut(f64),
) -> Result<SnapshotStats> {
    let index = SnapshotIndex::scan(archive_dir)?;
    let next_name = index::next_snapshot_name();
    let next_path = archive_dir.join(&next_name);
    let mut stats = SnapshotStats::default();

    if config.dry_run {
        info!("dry run: no snapshot will be created");
    }

    // Scan every root up front; first visit of a path wins.
    let scanner = Scanner::new(config.excludes.clone(), config.size_filter);
    let mut scanned: Vec<ScannedEntry> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for root in roots {
        let root = root.to_string_lossy().into_owned();
        let report = scanner.scan(&root, &mut |entry| {
            if seen.insert(entry.path.clone()) {
                scanned.push(entry);
            }
            Ok(())
        })?;
        stats.excluded += report.excluded;
        stats.oversize += report.oversize;
    }

    let latest = if config.force_new {
        None
    } else {
        index.latest().map(str::to_owned)
    };

    match latest {
        None => {
            if index.latest().is_some() {
                info!("forcing a full snapshot: {}", next_name);
            } else {
                info!("building an archive from scratch: {}", next_name);
            }
            write_full(config, &next_path, &scanned, &mut stats, progress)?;
        }
        Some(latest_name) => {
            info!("building a delta snapshot: {} -> {}", latest_name, next_name);
            write_delta(
                config,
                &index,
                &latest_name,
                &next_path,
                &scanned,
                &mut stats,
                progress,
            )?;
        }
    }

    if !config.dry_run {
        stats.snapshot = Some(next_path);
    }
    info!(
        "snapshot pass finished: {} new, {} modified, {} unchanged, {} directories ({})",
        stats.new_files,
        stats.modified,
        stats.unchanged,
        stats.directories,
        utils::format_bytes(stats.bytes_scanned)
    );
    Ok(stats)
}

/// Write a snapshot holding only NEW entries and directories.
fn write_full(
    config: &Config,
    next_path: &Path,
    scanned: &[ScannedEntry],
    stats: &mut SnapshotStats,
    progress: impl FnMut(f64),
) -> Result<()> {
    let mut writer = if config.dry_run {
        None
    } else {
        Some(SnapshotWriter::create(next_path)?)
    };

    for entry in scanned {
        if entry.meta.is_dir() {
            stats.directories += 1;
            info!("directory '{}' added", entry.path);
            if let Some(w) = writer.as_mut() {
                w.add_directory(&entry.path, entry.meta);
            }
        } else {
            stats.new_files += 1;
            stats.bytes_scanned += entry.meta.size;
            info!("file '{}' added as new (NEW)", entry.path);
            if let Some(w) = writer.as_mut() {
                w.add_file_new(&entry.path, entry.meta, config.compression_for(&entry.path));
            }
        }
    }

    if let Some(w) = writer {
        w.commit(progress)?;
    }
    Ok(())
}

/// Write a delta snapshot classified against `latest_name`.
fn write_delta(
    config: &Config,
    index: &SnapshotIndex,
    latest_name: &str,
    next_path: &Path,
    scanned: &[ScannedEntry],
    stats: &mut SnapshotStats,
    progress: impl FnMut(f64),
) -> Result<()> {
    let mut latest = SnapshotReader::open(&index.path_of(latest_name))?;
    let mut cache = ArchiveCache::new(index.dir());
    let mut writer = if config.dry_run {
        None
    } else {
        Some(SnapshotWriter::create(next_path)?)
    };

    for entry in scanned {
        if entry.meta.is_dir() {
            stats.directories += 1;
            info!("directory '{}' added", entry.path);
            if let Some(w) = writer.as_mut() {
                w.add_directory(&entry.path, entry.meta);
            }
            continue;
        }
        stats.bytes_scanned += entry.meta.size;

        match latest.get(&entry.path).copied() {
            None => {
                stats.new_files += 1;
                info!("file '{}' added as new (NEW)", entry.path);
                if let Some(w) = writer.as_mut() {
                    w.add_file_new(&entry.path, entry.meta, config.compression_for(&entry.path));
                }
            }
            Some(prev) if prev.mtime != entry.meta.mtime || prev.size != entry.meta.size => {
                if !config.diff_allowed(&entry.path) {
                    // Patches against stored-uncompressed entries waste
                    // space; fall back to a full copy.
                    stats.new_files += 1;
                    info!("file '{}' changed, stored as full copy (NEW)", entry.path);
                    if let Some(w) = writer.as_mut() {
                        w.add_file_new(&entry.path, entry.meta, config.compression_for(&entry.path));
                    }
                } else {
                    stats.modified += 1;
                    info!(
                        "file '{}' added as changed (MOD) -> {}",
                        entry.path, latest_name
                    );
                    if let Some(w) = writer.as_mut() {
                        let old = chain::rebuild(&mut latest, &entry.path, &mut cache)?;
                        let new = utils::read_file(Path::new(&entry.path))?;
                        // The stored record declares the scan-time size; a
                        // file that changed again since the scan would make
                        // the patch reconstruct different bytes than the
                        // record promises.
                        if new.len() as u64 != entry.meta.size {
                            return Err(ArchiveError::format(format!(
                                "file '{}' changed during the run: scanned {} bytes, read {}",
                                entry.path,
                                entry.meta.size,
                                new.len()
                            )));
                        }
                        let patch = diff::bsdiff(&old, &new)?;
                        w.add_file_bsdiff(
                            &entry.path,
                            entry.meta,
                            patch,
                            latest_name,
                            config.compression_for(&entry.path),
                        );
                    }
                }
            }
            Some(prev) => {
                // Unchanged. If the predecessor entry was itself UNC, point
                // straight at its ancestor so rebuild chains stay short.
                let target = if prev.kind()? == EntryKind::Unchanged {
                    prev.prev_name().to_string()
                } else {
                    latest_name.to_string()
                };
                stats.unchanged += 1;
                info!("file '{}' added as unchanged (UNC) -> {}", entry.path, target);
                if let Some(w) = writer.as_mut() {
                    w.add_file_unchanged(&entry.path, entry.meta, &target);
                }
            }
        }
    }

    if let Some(w) = writer {
        w.commit(progress)?;
    }
    Ok(())
}

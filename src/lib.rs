//! # fsarc - incremental filesystem archiver
//!
//! fsarc turns one or more source directories into a chain of time-stamped
//! zip snapshots. The first snapshot stores full file contents; every later
//! snapshot stores, per file, either the full contents (NEW), a binary
//! patch against a named predecessor snapshot (MOD), or a zero-byte marker
//! meaning "unchanged since that predecessor" (UNC). Restoring any snapshot
//! walks the pointers backward and materializes every file in full.
//!
//! ## Overview
//!
//! - Snapshots are plain zip files named `fsarc_YYYYMMDD-HHMMSS.zip`;
//!   filename order is creation order.
//! - Each member carries an 80-byte metadata record (mode, ownership,
//!   timestamps, size, entry kind, predecessor name) in a zip extra field.
//! - Change detection compares mtime and size against the newest existing
//!   snapshot; contents are never hashed.
//! - Deletions are not tracked. A file missing from a scan is simply absent
//!   from the new snapshot; older snapshots still restore it.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use fsarc::{create_snapshot, restore_snapshot, Config};
//! use std::path::{Path, PathBuf};
//!
//! # fn main() -> fsarc::Result<()> {
//! // Archive /home/user/docs into /backups, chaining onto any existing
//! // snapshots found there.
//! let config = Config {
//!     use_bsdiff: true,
//!     ..Config::default()
//! };
//! let stats = create_snapshot(
//!     &config,
//!     Path::new("/backups"),
//!     &[PathBuf::from("/home/user/docs")],
//!     |_| {},
//! )?;
//! println!("wrote {:?}", stats.snapshot);
//!
//! // Later: restore the snapshot somewhere else.
//! let snapshot = stats.snapshot.unwrap();
//! restore_snapshot(&config, &snapshot, Some(Path::new("/tmp/out")))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module organization
//!
//! - [`meta`]: the per-entry metadata record and its codec
//! - [`archive`]: snapshot container adapter (reader/writer over zip)
//! - [`scanner`]: recursive filesystem walk with exclusion patterns
//! - [`snapshot`]: the NEW/MOD/UNC classifier and snapshot writer
//! - [`chain`]: predecessor-chain rebuilder and archive cache
//! - [`restore`]: restore with optional output redirection and metadata
//! - [`index`]: snapshot discovery and ordering in an archive directory
//! - [`config`]: run options threaded explicitly through the engine
//! - [`error`]: error types
//!
//! The engine is single-threaded and sequential by design; the only
//! mutual-exclusion guarantee between concurrent runs is the exclusive
//! create of the next snapshot file.

pub mod archive;
pub mod chain;
pub mod config;
pub mod diff;
pub mod error;
pub mod index;
pub mod meta;
pub mod restore;
pub mod scanner;
pub mod snapshot;
pub mod types;
pub mod utils;

// Re-export the types most callers need.
pub use archive::{Compression, SnapshotReader, SnapshotWriter};
pub use config::{Config, BUILTIN_EXCLUDES};
pub use error::{ArchiveError, Result};
pub use index::{SnapshotIndex, SNAPSHOT_PREFIX};
pub use meta::{EntryKind, EntryMeta};
pub use restore::restore_snapshot;
pub use snapshot::create_snapshot;
pub use types::{RestoreStats, SnapshotStats};

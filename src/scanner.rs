//! Filesystem scanner
//!
//! Pre-order depth-first walk over input roots, yielding directories before
//! their children. Only regular files and directories are reported; other
//! file types are skipped silently. A root may itself be a regular file.
//!
//! Exclusion patterns use the archive format's own two-wildcard dialect,
//! checked against the full path at every descent step:
//!
//! - `*` matches any run of characters, including `/`
//! - `?` matches one or more characters, excluding `/`
//!
//! A pattern match on a directory prunes the whole subtree. An unreadable
//! directory aborts the scan; partial scans would silently produce snapshots
//! missing files.

use crate::error::Result;
use crate::meta::EntryMeta;
use tracing::{debug, trace};
use walkdir::WalkDir;

/// One path yielded by the scanner, already converted to the record the
/// classifier stores.
#[derive(Debug, Clone)]
pub struct ScannedEntry {
    /// Path exactly as it will be used for the archive member name
    pub path: String,
    /// Scan-time metadata record (tagged NEW, no predecessor)
    pub meta: EntryMeta,
}

/// Per-scan counters for skipped paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanReport {
    /// Paths dropped by exclusion patterns (subtree roots count once)
    pub excluded: usize,
    /// Regular files dropped by the size cutoff
    pub oversize: usize,
}

/// Recursive scanner over one or more input roots.
#[derive(Debug, Clone)]
pub struct Scanner {
    excludes: Vec<String>,
    /// Maximum regular-file size in bytes; `None` means no cutoff
    size_cutoff: Option<u64>,
}

impl Scanner {
    /// Create a scanner with the given exclusion patterns and size cutoff.
    pub fn new(excludes: Vec<String>, size_cutoff: Option<u64>) -> Scanner {
        Scanner {
            excludes,
            size_cutoff,
        }
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.excludes.iter().any(|p| wildcard_match(p, path))
    }

    /// Walk `root`, invoking `visit` for every directory and regular file in
    /// pre-order. Directory entries arrive before their children.
    pub fn scan(
        &self,
        root: &str,
        visit: &mut dyn FnMut(ScannedEntry) -> Result<()>,
    ) -> Result<ScanReport> {
        let mut report = ScanReport::default();
        let mut walk = WalkDir::new(root).follow_links(false).into_iter();

        while let Some(item) = walk.next() {
            let entry = item?;
            let path = entry.path().to_string_lossy().into_owned();
            let file_type = entry.file_type();

            if self.is_excluded(&path) {
                debug!("excluded '{}'", path);
                report.excluded += 1;
                if file_type.is_dir() {
                    walk.skip_current_dir();
                }
                continue;
            }

            if file_type.is_dir() {
                let meta = EntryMeta::from_metadata(&entry.metadata()?);
                visit(ScannedEntry { path, meta })?;
            } else if file_type.is_file() {
                let meta = EntryMeta::from_metadata(&entry.metadata()?);
                if let Some(cutoff) = self.size_cutoff {
                    if meta.size > cutoff {
                        debug!("skipped '{}' ({} bytes over cutoff)", path, meta.size);
                        report.oversize += 1;
                        continue;
                    }
                }
                visit(ScannedEntry { path, meta })?;
            } else {
                trace!("skipped non-regular '{}'", path);
            }
        }
        Ok(report)
    }
}

/// Match `path` against `pattern` with the two-wildcard dialect.
pub fn wildcard_match(pattern: &str, path: &str) -> bool {
    match_bytes(pattern.as_bytes(), path.as_bytes())
}

fn match_bytes(pat: &[u8], s: &[u8]) -> bool {
    let Some(&head) = pat.first() else {
        return s.is_empty();
    };
    match head {
        b'*' => {
            if pat.len() == 1 {
                return true;
            }
            (0..=s.len()).any(|i| match_bytes(&pat[1..], &s[i..]))
        }
        b'?' => {
            // one or more characters, none of them '/'
            for i in 1..=s.len() {
                if s[i - 1] == b'/' {
                    return false;
                }
                if match_bytes(&pat[1..], &s[i..]) {
                    return true;
                }
            }
            false
        }
        c => !s.is_empty() && s[0] == c && match_bytes(&pat[1..], &s[1..]),
    }
}

//! Run configuration
//!
//! One [`Config`] value is built by the caller (the CLI, or a library user)
//! and threaded explicitly into the classifier and the restorer. Nothing in
//! the engine reads process-wide state.

use crate::archive::Compression;
use crate::scanner::wildcard_match;

/// Built-in exclusion patterns enabled by `-X` / `--builtin-excl`.
pub const BUILTIN_EXCLUDES: [&str; 5] = [
    "/home/?/.cache/*",
    "/home/?/snap/firefox/common/.cache/*",
    "/tmp/*",
    "/dev/*",
    "/proc/*",
];

/// Options for one archive or restore run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Deflate level 1..=9; 0 selects the library default
    pub comp_level: u32,
    /// Store everything uncompressed
    pub no_compression: bool,
    /// Patterns excluded from both compression and diffing
    pub comp_filter: Vec<String>,
    /// Emit a full NEW-only snapshot even when predecessors exist
    pub force_new: bool,
    /// Enable MOD entries; without it changed files are stored as NEW
    pub use_bsdiff: bool,
    /// Scanner exclusion patterns
    pub excludes: Vec<String>,
    /// Regular files above this many bytes are skipped
    pub size_filter: Option<u64>,
    /// Apply mode/ownership/timestamps after restoring bytes
    pub apply_metadata: bool,
    /// Classify and log, but write nothing
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            comp_level: 0,
            no_compression: false,
            comp_filter: Vec::new(),
            force_new: false,
            use_bsdiff: false,
            excludes: Vec::new(),
            size_filter: None,
            apply_metadata: true,
            dry_run: false,
        }
    }
}

impl Config {
    /// Whether a path matches the compression filter.
    pub fn compression_filtered(&self, path: &str) -> bool {
        self.comp_filter.iter().any(|p| wildcard_match(p, path))
    }

    /// Compression to use for a member at `path`.
    pub fn compression_for(&self, path: &str) -> Compression {
        if self.no_compression || self.compression_filtered(path) {
            Compression::Stored
        } else {
            Compression::Deflated {
                level: if self.comp_level == 0 {
                    None
                } else {
                    Some(self.comp_level as i32)
                },
            }
        }
    }

    /// Whether a changed file at `path` may be stored as a patch. Diffing
    /// is pointless where the entry is stored uncompressed, so the
    /// compression filter and `--no-comp` also disable it.
    pub fn diff_allowed(&self, path: &str) -> bool {
        self.use_bsdiff && !self.no_compression && !self.compression_filtered(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_for() {
        let mut cfg = Config {
            comp_level: 6,
            ..Config::default()
        };
        assert_eq!(
            cfg.compression_for("/t/a.txt"),
            Compression::Deflated { level: Some(6) }
        );
        cfg.comp_level = 0;
        assert_eq!(
            cfg.compression_for("/t/a.txt"),
            Compression::Deflated { level: None }
        );
        cfg.no_compression = true;
        assert_eq!(cfg.compression_for("/t/a.txt"), Compression::Stored);
    }

    #[test]
    fn test_filter_disables_compression_and_diff() {
        let cfg = Config {
            use_bsdiff: true,
            comp_filter: vec!["*.iso".to_string()],
            ..Config::default()
        };
        assert_eq!(cfg.compression_for("/media/disk.iso"), Compression::Stored);
        assert!(!cfg.diff_allowed("/media/disk.iso"));
        assert!(cfg.diff_allowed("/media/readme.txt"));
    }

    #[test]
    fn test_diff_requires_opt_in() {
        let cfg = Config::default();
        assert!(!cfg.diff_allowed("/t/a.txt"));
    }
}

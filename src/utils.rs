//! Utility functions for fsarc
//!
//! Path joining with single-slash normalization, recursive directory
//! creation, byte-exact file IO, metadata application helpers and the
//! size-suffix parser used by the CLI. Metadata application is Unix-only;
//! other platforms get no-op stubs so the archive format stays usable
//! everywhere.

use crate::error::Result;
use std::fs;
use std::path::Path;

/// Join two path fragments with exactly one `/` between them.
///
/// Mirrors the member-name arithmetic of the archive format, which works on
/// strings rather than platform paths: `a` may or may not end in a slash,
/// and an empty `a` yields `b` unchanged.
pub fn join_paths(a: &str, b: &str) -> String {
    if a.is_empty() {
        return b.to_string();
    }
    if a.ends_with('/') {
        format!("{a}{b}")
    } else {
        format!("{a}/{b}")
    }
}

/// Create `path` and any missing ancestors with permissions 0755.
pub fn ensure_dir_tree(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true).mode(0o755);
        builder.create(path)?;
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Read a file's entire contents.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    Ok(fs::read(path)?)
}

/// Write `data` to `path`, truncating any existing file.
pub fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data)?;
    Ok(())
}

/// Set permission bits (mode & 07777) on a file or directory.
#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))?;
    Ok(())
}

/// Set access and modification times (whole seconds).
#[cfg(unix)]
pub fn set_times(path: &Path, atime: i64, mtime: i64) -> Result<()> {
    use nix::sys::time::{TimeVal, TimeValLike};
    nix::sys::stat::utimes(path, &TimeVal::seconds(atime), &TimeVal::seconds(mtime))
        .map_err(std::io::Error::from)?;
    Ok(())
}

/// Set owner user and group ids.
#[cfg(unix)]
pub fn set_owner(path: &Path, uid: u32, gid: u32) -> Result<()> {
    use nix::unistd::{chown, Gid, Uid};
    chown(path, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid)))
        .map_err(std::io::Error::from)?;
    Ok(())
}

#[cfg(not(unix))]
pub fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(not(unix))]
pub fn set_times(_path: &Path, _atime: i64, _mtime: i64) -> Result<()> {
    Ok(())
}

#[cfg(not(unix))]
pub fn set_owner(_path: &Path, _uid: u32, _gid: u32) -> Result<()> {
    Ok(())
}

/// Parse a size argument: a positive integer, optionally suffixed with
/// `k`, `m` or `g` (powers of 1024). Used as a clap value parser, so the
/// error type is `String`.
pub fn parse_size(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size".to_string());
    }
    let (digits, multiplier) = match s.as_bytes()[s.len() - 1].to_ascii_lowercase() {
        b'k' => (&s[..s.len() - 1], 1u64 << 10),
        b'm' => (&s[..s.len() - 1], 1u64 << 20),
        b'g' => (&s[..s.len() - 1], 1u64 << 30),
        b if b.is_ascii_digit() => (s, 1u64),
        other => return Err(format!("unknown size suffix '{}'", other as char)),
    };
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid size '{s}'"))?;
    if value == 0 {
        return Err("size filter must be positive".to_string());
    }
    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size '{s}' overflows"))
}

/// Format a byte count for human-readable log output.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/a/b", "c"), "/a/b/c");
        assert_eq!(join_paths("/a/b/", "c"), "/a/b/c");
        assert_eq!(join_paths("", "c"), "c");
        assert_eq!(join_paths("a", "b/c"), "a/b/c");
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("10"), Ok(10));
        assert_eq!(parse_size("4k"), Ok(4096));
        assert_eq!(parse_size("2M"), Ok(2 * 1024 * 1024));
        assert_eq!(parse_size("1g"), Ok(1024 * 1024 * 1024));
        assert!(parse_size("0").is_err());
        assert!(parse_size("").is_err());
        assert!(parse_size("abc").is_err());
        assert!(parse_size("5t").is_err());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        write_file(&path, b"exact bytes").unwrap();
        assert_eq!(read_file(&path).unwrap(), b"exact bytes");
        // truncate-and-write semantics
        write_file(&path, b"x").unwrap();
        assert_eq!(read_file(&path).unwrap(), b"x");
    }
}

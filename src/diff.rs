//! Binary diff/patch primitive
//!
//! Thin wrappers over the bsdiff 4.x implementation in `qbsdiff`. The rest
//! of the crate treats patches as opaque byte streams: [`bsdiff`] produces
//! one from (old, new) and [`bspatch`] reconstructs new from (old, patch,
//! expected size). A patch that does not reproduce exactly the expected
//! number of bytes is treated as corruption, not truncated output.

use crate::error::{ArchiveError, Result};
use qbsdiff::{Bsdiff, Bspatch};
use std::io::Cursor;
use tracing::trace;

/// Produce a patch byte stream transforming `old` into `new`.
pub fn bsdiff(old: &[u8], new: &[u8]) -> Result<Vec<u8>> {
    let mut patch = Vec::new();
    Bsdiff::new(old, new)
        .compare(Cursor::new(&mut patch))
        .map_err(|e| ArchiveError::patch(format!("bsdiff failed: {e}")))?;
    trace!(
        old_len = old.len(),
        new_len = new.len(),
        patch_len = patch.len(),
        "computed patch"
    );
    Ok(patch)
}

/// Apply `patch` to `old`, producing exactly `expected_len` bytes.
pub fn bspatch(old: &[u8], patch: &[u8], expected_len: u64) -> Result<Vec<u8>> {
    let mut new = Vec::with_capacity(expected_len as usize);
    Bspatch::new(patch)
        .map_err(|e| ArchiveError::patch(format!("malformed patch: {e}")))?
        .apply(old, Cursor::new(&mut new))
        .map_err(|e| ArchiveError::patch(format!("bspatch failed: {e}")))?;
    if new.len() as u64 != expected_len {
        return Err(ArchiveError::patch(format!(
            "patched output is {} bytes, expected {}",
            new.len(),
            expected_len
        )));
    }
    Ok(new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_patch_round_trip() {
        let old = b"hello\n".to_vec();
        let new = b"hello world\n".to_vec();
        let patch = bsdiff(&old, &new).unwrap();
        let rebuilt = bspatch(&old, &patch, new.len() as u64).unwrap();
        assert_eq!(rebuilt, new);
    }

    #[test]
    fn test_patch_from_empty_origin() {
        let old = Vec::new();
        let new = b"fresh content".to_vec();
        let patch = bsdiff(&old, &new).unwrap();
        let rebuilt = bspatch(&old, &patch, new.len() as u64).unwrap();
        assert_eq!(rebuilt, new);
    }

    #[test]
    fn test_wrong_expected_size_is_an_error() {
        let old = b"aaaa".to_vec();
        let new = b"aaab".to_vec();
        let patch = bsdiff(&old, &new).unwrap();
        assert!(bspatch(&old, &patch, 99).is_err());
    }

    #[test]
    fn test_garbage_patch_is_an_error() {
        assert!(bspatch(b"old", b"not a bsdiff stream", 3).is_err());
    }
}

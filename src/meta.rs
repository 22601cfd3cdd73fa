//! Entry metadata record and codec
//!
//! Every member of a snapshot archive carries an 80-byte record in a zip
//! extra field with id [`EXTRA_FIELD_ID`]. The record binds POSIX stat data
//! and the snapshot-chain pointer to the member:
//!
//! ```text
//! offset  size  field
//!      0     4  fs_mode   (POSIX mode bits, including the file-type bits)
//!      4     4  fs_uid
//!      8     4  fs_gid
//!     12     4  fs_type   (1 = NEW, 2 = MOD, 3 = UNC)
//!     16     8  fs_atime  (seconds since epoch)
//!     24     8  fs_mtime
//!     32     8  fs_ctime
//!     40     8  fs_size   (original file size, pre-patch-applied)
//!     48    32  fs_prev   (NUL-terminated predecessor snapshot basename)
//! ```
//!
//! All integers are little-endian regardless of host, so archives are
//! byte-identical across platforms. Directories carry whatever tag they were
//! scanned with; consumers identify them through `fs_mode` only.

use crate::error::{ArchiveError, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::fs;

/// Extra-field id under which the metadata record is stored.
pub const EXTRA_FIELD_ID: u16 = 0xE0E0;

/// Exact encoded size of the record in bytes.
pub const RECORD_LEN: usize = 80;

/// Size of the `fs_prev` slot, including the terminating NUL.
pub const PREV_LEN: usize = 32;

// Field widths must add up to the record size; the format is frozen.
const _: () = assert!(4 * 4 + 8 * 4 + PREV_LEN == RECORD_LEN);

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;

/// Kind of a snapshot member, stored in the `fs_type` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EntryKind {
    /// Content bytes are the file's full contents; origin of a chain.
    New = 1,
    /// Content bytes are a binary patch against the predecessor's version.
    Modified = 2,
    /// No content bytes; the file equals the predecessor's version.
    Unchanged = 3,
}

impl EntryKind {
    /// Decode a raw `fs_type` value.
    pub fn from_raw(raw: u32) -> Option<EntryKind> {
        match raw {
            1 => Some(EntryKind::New),
            2 => Some(EntryKind::Modified),
            3 => Some(EntryKind::Unchanged),
            _ => None,
        }
    }

    /// Short uppercase tag used in log lines.
    pub fn tag(&self) -> &'static str {
        match self {
            EntryKind::New => "NEW",
            EntryKind::Modified => "MOD",
            EntryKind::Unchanged => "UNC",
        }
    }
}

/// Per-entry metadata record
///
/// Round-trips losslessly through [`EntryMeta::encode`] / [`EntryMeta::decode`].
/// The record is plain data: snapshots are written once and immutable, so an
/// `EntryMeta` is never updated after the classifier emits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    /// POSIX mode bits including file-type bits
    pub mode: u32,
    /// Owner user id
    pub uid: u32,
    /// Owner group id
    pub gid: u32,
    /// Raw entry-kind tag; use [`EntryMeta::kind`] to interpret
    kind: u32,
    /// Access time, seconds since epoch
    pub atime: i64,
    /// Modification time, seconds since epoch
    pub mtime: i64,
    /// Change time, seconds since epoch
    pub ctime: i64,
    /// Original (uncompressed, pre-patch-applied) file size
    pub size: u64,
    /// NUL-terminated predecessor snapshot basename
    prev: [u8; PREV_LEN],
}

impl EntryMeta {
    /// Capture a record from filesystem metadata, tagged NEW with no
    /// predecessor.
    #[cfg(unix)]
    pub fn from_metadata(md: &fs::Metadata) -> EntryMeta {
        use std::os::unix::fs::MetadataExt;
        EntryMeta {
            mode: md.mode(),
            uid: md.uid(),
            gid: md.gid(),
            kind: EntryKind::New as u32,
            atime: md.atime(),
            mtime: md.mtime(),
            ctime: md.ctime(),
            size: md.size(),
            prev: [0u8; PREV_LEN],
        }
    }

    /// Capture a record from filesystem metadata, tagged NEW with no
    /// predecessor. Ownership is not available on this platform; the mode is
    /// synthesized from the file type.
    #[cfg(not(unix))]
    pub fn from_metadata(md: &fs::Metadata) -> EntryMeta {
        let mode = if md.is_dir() { 0o040755 } else { 0o100644 };
        let mtime = md
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        EntryMeta {
            mode,
            uid: 0,
            gid: 0,
            kind: EntryKind::New as u32,
            atime: mtime,
            mtime,
            ctime: mtime,
            size: md.len(),
            prev: [0u8; PREV_LEN],
        }
    }

    /// Interpret the kind tag, failing on unknown values.
    pub fn kind(&self) -> Result<EntryKind> {
        EntryKind::from_raw(self.kind)
            .ok_or_else(|| ArchiveError::format(format!("unknown entry kind tag {}", self.kind)))
    }

    /// Force the kind tag.
    pub fn set_kind(&mut self, kind: EntryKind) {
        self.kind = kind as u32;
    }

    /// Whether the record describes a directory, judged by `fs_mode` only.
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    /// Predecessor snapshot basename, or the empty string for NEW entries
    /// and directories.
    pub fn prev_name(&self) -> &str {
        let end = self
            .prev
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(PREV_LEN);
        std::str::from_utf8(&self.prev[..end]).unwrap_or("")
    }

    /// Set the predecessor basename. Names longer than 31 bytes are
    /// truncated; the slot always stays NUL-terminated.
    pub fn set_prev(&mut self, name: &str) {
        self.prev = [0u8; PREV_LEN];
        let bytes = name.as_bytes();
        let n = bytes.len().min(PREV_LEN - 1);
        self.prev[..n].copy_from_slice(&bytes[..n]);
    }

    /// Clear the predecessor pointer.
    pub fn clear_prev(&mut self) {
        self.prev = [0u8; PREV_LEN];
    }

    /// Encode the record into its fixed 80-byte wire form.
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        LittleEndian::write_u32(&mut buf[0..4], self.mode);
        LittleEndian::write_u32(&mut buf[4..8], self.uid);
        LittleEndian::write_u32(&mut buf[8..12], self.gid);
        LittleEndian::write_u32(&mut buf[12..16], self.kind);
        LittleEndian::write_i64(&mut buf[16..24], self.atime);
        LittleEndian::write_i64(&mut buf[24..32], self.mtime);
        LittleEndian::write_i64(&mut buf[32..40], self.ctime);
        LittleEndian::write_u64(&mut buf[40..48], self.size);
        buf[48..RECORD_LEN].copy_from_slice(&self.prev);
        buf
    }

    /// Decode a record from exactly [`RECORD_LEN`] bytes. Any other length
    /// means the archive is corrupt.
    pub fn decode(raw: &[u8]) -> Result<EntryMeta> {
        if raw.len() != RECORD_LEN {
            return Err(ArchiveError::format(format!(
                "metadata record has {} bytes, expected {}",
                raw.len(),
                RECORD_LEN
            )));
        }
        let mut prev = [0u8; PREV_LEN];
        prev.copy_from_slice(&raw[48..RECORD_LEN]);
        Ok(EntryMeta {
            mode: LittleEndian::read_u32(&raw[0..4]),
            uid: LittleEndian::read_u32(&raw[4..8]),
            gid: LittleEndian::read_u32(&raw[8..12]),
            kind: LittleEndian::read_u32(&raw[12..16]),
            atime: LittleEndian::read_i64(&raw[16..24]),
            mtime: LittleEndian::read_i64(&raw[24..32]),
            ctime: LittleEndian::read_i64(&raw[32..40]),
            size: LittleEndian::read_u64(&raw[40..48]),
            prev,
        })
    }

    /// Encode the record framed as a zip extra-field sub-block
    /// (id, length, payload).
    pub fn to_extra_field(&self) -> [u8; RECORD_LEN + 4] {
        let mut buf = [0u8; RECORD_LEN + 4];
        LittleEndian::write_u16(&mut buf[0..2], EXTRA_FIELD_ID);
        LittleEndian::write_u16(&mut buf[2..4], RECORD_LEN as u16);
        buf[4..].copy_from_slice(&self.encode());
        buf
    }

    /// Locate and decode the record inside a raw zip extra field. The field
    /// may carry other sub-blocks (zip64 and friends); they are skipped.
    pub fn from_extra_field(raw: &[u8]) -> Result<EntryMeta> {
        let mut rest = raw;
        while rest.len() >= 4 {
            let id = LittleEndian::read_u16(&rest[0..2]);
            let len = LittleEndian::read_u16(&rest[2..4]) as usize;
            let body = rest.get(4..4 + len).ok_or_else(|| {
                ArchiveError::format("truncated extra-field sub-block".to_string())
            })?;
            if id == EXTRA_FIELD_ID {
                if len != RECORD_LEN {
                    return Err(ArchiveError::format(format!(
                        "metadata extra field has length {}, expected {}",
                        len, RECORD_LEN
                    )));
                }
                return EntryMeta::decode(body);
            }
            rest = &rest[4 + len..];
        }
        Err(ArchiveError::format(
            "metadata extra field missing".to_string(),
        ))
    }
}

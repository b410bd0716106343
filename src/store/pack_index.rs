//! On-disk pack index: sorted id table with pack-relative offsets.
//!
//! Each pack file is paired with exactly one index. The index alone
//! answers "which objects does this pack hold" - cardinality, ordered id
//! access, and binary-search lookup - without touching the pack body,
//! which is what lets garbage collection triage packs cheaply.
//!
//! # Layout (version 1)
//! ```text
//! +------------------+
//! | Magic (4B)       |  "VIDX"
//! | Version (4B BE)  |  1
//! | Format tag (1B)  |  id format discriminant
//! | Reserved (3B)    |  zero
//! | Count (4B BE)    |  number of entries
//! +------------------+
//! | Entries          |  count * (id_len + 8) bytes
//! |   id (id_len)    |  sorted ascending, unique
//! |   offset (8B BE) |  pack-relative entry offset
//! +------------------+
//! ```
//!
//! # Invariants
//! - Entry ids are sorted ascending; the writer sorts before emitting.
//! - File size exactly matches header + count * entry size.
//! - The view is backed by a shared mmap and performs no per-call I/O.
//!
//! # Complexity
//! - `object_count()` is O(1) from the cached header value.
//! - `id_at()` / `offset_at()` are O(1) slices into the entry table.
//! - `lookup()` is O(log N) binary search.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use memmap2::Mmap;

use super::api::{PackIndex, StoreError};
use super::object_id::{IdFormat, ObjectId};

/// Index magic bytes.
const IDX_MAGIC: [u8; 4] = *b"VIDX";
/// Only supported index version.
const IDX_VERSION: u32 = 1;
/// Header size: magic + version + format tag + reserved + count.
const IDX_HEADER_SIZE: usize = 16;

/// Writes a sorted index file for one pack segment.
///
/// Entries are sorted by id before writing; the pack writer collects them
/// in append order. The file is flushed and synced before returning, since
/// finalize events downstream license deletions.
///
/// # Errors
/// Any file I/O failure.
pub fn write_index(
    path: &Path,
    format: IdFormat,
    entries: &mut Vec<(ObjectId, u64)>,
) -> Result<(), StoreError> {
    entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));

    let mut out = Vec::with_capacity(
        IDX_HEADER_SIZE + entries.len() * (format.id_len() as usize + 8),
    );
    out.extend_from_slice(&IDX_MAGIC);
    out.extend_from_slice(&IDX_VERSION.to_be_bytes());
    out.push(format as u8);
    out.extend_from_slice(&[0u8; 3]);
    out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for (id, offset) in entries.iter() {
        out.extend_from_slice(id.as_slice());
        out.extend_from_slice(&offset.to_be_bytes());
    }

    let mut file = File::create(path)?;
    file.write_all(&out)?;
    file.sync_all()?;
    Ok(())
}

/// Validated mmap view over one index file.
#[derive(Debug)]
pub struct IdxFile {
    mmap: Mmap,
    id_len: usize,
    count: u64,
}

impl IdxFile {
    /// Opens and validates an index file.
    ///
    /// # Errors
    /// - `Corrupt` on bad magic, reserved bytes, or size mismatch.
    /// - `UnsupportedVersion` on any version other than 1.
    /// - `IdLengthMismatch` when the format tag disagrees with `format`.
    pub fn open(path: &Path, format: IdFormat) -> Result<Self, StoreError> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let data: &[u8] = &mmap;

        if data.len() < IDX_HEADER_SIZE {
            return Err(StoreError::corrupt("index file too small"));
        }
        if data[0..4] != IDX_MAGIC {
            return Err(StoreError::corrupt("index has invalid magic"));
        }
        let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if version != IDX_VERSION {
            return Err(StoreError::UnsupportedVersion { version });
        }
        let tag = data[8];
        match IdFormat::from_tag(tag) {
            Some(found) if found == format => {}
            Some(found) => {
                return Err(StoreError::IdLengthMismatch {
                    found: found.id_len() as usize,
                    expected: format.id_len() as usize,
                })
            }
            None => return Err(StoreError::corrupt("index format tag is unknown")),
        }
        if data[9..12] != [0u8; 3] {
            return Err(StoreError::corrupt("index reserved bytes are nonzero"));
        }
        let count = u32::from_be_bytes([data[12], data[13], data[14], data[15]]) as u64;

        let id_len = format.id_len() as usize;
        let entry_size = id_len + 8;
        let expected = IDX_HEADER_SIZE as u64 + count * entry_size as u64;
        if data.len() as u64 != expected {
            return Err(StoreError::corrupt("index size does not match count"));
        }

        Ok(Self {
            mmap,
            id_len,
            count,
        })
    }

    #[inline]
    fn entry(&self, pos: u64) -> &[u8] {
        debug_assert!(pos < self.count, "index position out of range");
        let entry_size = self.id_len + 8;
        let start = IDX_HEADER_SIZE + pos as usize * entry_size;
        &self.mmap[start..start + entry_size]
    }
}

impl PackIndex for IdxFile {
    #[inline]
    fn object_count(&self) -> u64 {
        self.count
    }

    #[inline]
    fn id_at(&self, pos: u64) -> ObjectId {
        ObjectId::from_slice(&self.entry(pos)[..self.id_len])
    }

    #[inline]
    fn offset_at(&self, pos: u64) -> u64 {
        let entry = self.entry(pos);
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&entry[self.id_len..]);
        u64::from_be_bytes(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn id(byte: u8) -> ObjectId {
        ObjectId::sha1([byte; 20])
    }

    #[test]
    fn round_trips_sorted_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.idx");
        let mut entries = vec![(id(0x30), 300), (id(0x10), 100), (id(0x20), 200)];
        write_index(&path, IdFormat::Sha1, &mut entries).unwrap();

        let idx = IdxFile::open(&path, IdFormat::Sha1).unwrap();
        assert_eq!(idx.object_count(), 3);
        assert_eq!(idx.id_at(0), id(0x10));
        assert_eq!(idx.id_at(2), id(0x30));
        assert_eq!(idx.offset_at(1), 200);
        assert_eq!(idx.lookup(&id(0x30)), Some(300));
        assert_eq!(idx.lookup(&id(0x40)), None);
    }

    #[test]
    fn empty_index_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.idx");
        write_index(&path, IdFormat::Sha1, &mut Vec::new()).unwrap();
        let idx = IdxFile::open(&path, IdFormat::Sha1).unwrap();
        assert_eq!(idx.object_count(), 0);
        assert_eq!(idx.lookup(&id(0x01)), None);
    }

    #[test]
    fn rejects_truncated_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.idx");
        let mut entries = vec![(id(0x10), 100)];
        write_index(&path, IdFormat::Sha1, &mut entries).unwrap();
        let data = std::fs::read(&path).unwrap();
        std::fs::write(&path, &data[..data.len() - 4]).unwrap();

        let err = IdxFile::open(&path, IdFormat::Sha1).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn rejects_wrong_version_and_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("v.idx");
        write_index(&path, IdFormat::Sha1, &mut Vec::new()).unwrap();

        let mut data = std::fs::read(&path).unwrap();
        data[7] = 9;
        std::fs::write(&path, &data).unwrap();
        assert!(matches!(
            IdxFile::open(&path, IdFormat::Sha1).unwrap_err(),
            StoreError::UnsupportedVersion { version: 9 }
        ));

        write_index(&path, IdFormat::Sha256, &mut Vec::new()).unwrap();
        assert!(matches!(
            IdxFile::open(&path, IdFormat::Sha1).unwrap_err(),
            StoreError::IdLengthMismatch { .. }
        ));
    }
}

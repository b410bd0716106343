//! Pack segments: append-only object containers.
//!
//! A pack holds many objects back to back, each zlib-compressed. Packs are
//! immutable once finalized; space is reclaimed by garbage collection
//! rewriting live objects into replacement segments and deleting the
//! originals, never by editing a pack in place.
//!
//! # Layout (version 1)
//! ```text
//! +------------------+
//! | Magic (4B)       |  "VPCK"
//! | Version (4B BE)  |  1
//! +------------------+
//! | Entry*           |
//! |   kind (1B)      |  object kind tag
//! |   len (4B BE)    |  decompressed payload length
//! |   zlib payload   |  self-terminating stream
//! +------------------+
//! ```
//! Index offsets address the first byte of an entry (its kind tag).
//!
//! # Durability protocol
//! The writer appends into a `tmp-` named file. Finalizing a segment syncs
//! the pack bytes, renames them into place, and only then writes the index
//! file. Pack discovery enumerates `.idx` files, so a crash mid-finalize
//! leaves at worst an invisible orphan pack that the next writer setup
//! sweeps away; it can never surface a half-written segment.
//!
//! # Invariants
//! - An entry's `len` is the exact decompressed size; mismatch is corruption.
//! - `FinalizedPack` is returned only after both files are durable.

use std::fs;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::api::{FinalizedPack, PackWriter, StoreError};
use super::object_id::{IdFormat, ObjectId};
use super::object_kind::ObjectKind;
use super::pack_index::write_index;

/// Pack magic bytes.
const PACK_MAGIC: [u8; 4] = *b"VPCK";
/// Only supported pack version.
const PACK_VERSION: u32 = 1;
/// Pack header size.
pub(crate) const PACK_HEADER_SIZE: usize = 8;
/// Entry header size: kind tag + payload length.
const ENTRY_HEADER_SIZE: usize = 5;
/// Maximum accepted decompressed payload size (1 GiB).
const MAX_PAYLOAD_SIZE: u32 = 1 << 30;

/// Prefix of in-flight segment files, skipped by discovery and removed by
/// the next writer setup.
pub(crate) const TMP_PREFIX: &str = "tmp-";

/// Validates the pack file header.
pub(crate) fn check_pack_header(pack: &[u8]) -> Result<(), StoreError> {
    if pack.len() < PACK_HEADER_SIZE {
        return Err(StoreError::corrupt("pack file too small"));
    }
    if pack[0..4] != PACK_MAGIC {
        return Err(StoreError::corrupt("pack has invalid magic"));
    }
    let version = u32::from_be_bytes([pack[4], pack[5], pack[6], pack[7]]);
    if version != PACK_VERSION {
        return Err(StoreError::UnsupportedVersion { version });
    }
    Ok(())
}

fn entry_header(pack: &[u8], offset: u64) -> Result<(ObjectKind, u32, usize), StoreError> {
    let start = offset as usize;
    if start < PACK_HEADER_SIZE || start + ENTRY_HEADER_SIZE > pack.len() {
        return Err(StoreError::corrupt("pack entry offset out of range"));
    }
    let tag = pack[start];
    let kind = ObjectKind::from_tag(tag).ok_or(StoreError::UnknownKind { tag })?;
    let len = u32::from_be_bytes([
        pack[start + 1],
        pack[start + 2],
        pack[start + 3],
        pack[start + 4],
    ]);
    if len > MAX_PAYLOAD_SIZE {
        return Err(StoreError::corrupt("pack entry payload too large"));
    }
    Ok((kind, len, start + ENTRY_HEADER_SIZE))
}

/// Reads an entry's kind from its header without inflating the payload.
pub(crate) fn entry_kind_at(pack: &[u8], offset: u64) -> Result<ObjectKind, StoreError> {
    let (kind, _, _) = entry_header(pack, offset)?;
    Ok(kind)
}

/// Inflates one entry's payload.
pub(crate) fn entry_at(pack: &[u8], offset: u64) -> Result<(ObjectKind, Vec<u8>), StoreError> {
    let (kind, len, body_start) = entry_header(pack, offset)?;
    let mut payload = Vec::with_capacity(len as usize);
    let mut decoder = ZlibDecoder::new(&pack[body_start..]);
    decoder
        .read_to_end(&mut payload)
        .map_err(|_| StoreError::corrupt("pack entry payload fails to inflate"))?;
    if payload.len() != len as usize {
        return Err(StoreError::corrupt("pack entry length mismatch"));
    }
    Ok((kind, payload))
}

/// In-flight replacement segment state.
struct Segment {
    file: File,
    tmp_path: PathBuf,
    bytes: u64,
    entries: Vec<(ObjectId, u64)>,
}

/// Filesystem pack writer with size-based segment rollover.
///
/// One instance serves a whole sweep; see [`PackWriter`] for the finalize
/// event contract.
pub struct FsPackWriter {
    pack_dir: PathBuf,
    format: IdFormat,
    compression: Compression,
    max_segment_bytes: u64,
    seq: u32,
    current: Option<Segment>,
}

impl FsPackWriter {
    /// Creates a writer appending segments into `pack_dir`.
    ///
    /// Leftover `tmp-*.pack` segments from an interrupted earlier run are
    /// removed here; finalized packs and other scratch files (the live
    /// set's bloom backing shares this directory) are never touched.
    pub fn new(
        pack_dir: &Path,
        format: IdFormat,
        compression_level: u32,
        max_segment_bytes: u64,
    ) -> Result<Self, StoreError> {
        for entry in fs::read_dir(pack_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(TMP_PREFIX) && name.ends_with(".pack") {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(Self {
            pack_dir: pack_dir.to_path_buf(),
            format,
            compression: Compression::new(compression_level),
            max_segment_bytes,
            seq: 0,
            current: None,
        })
    }

    fn open_segment(&mut self) -> Result<&mut Segment, StoreError> {
        if self.current.is_none() {
            let tmp_path = self.pack_dir.join(format!("{TMP_PREFIX}{}.pack", self.seq));
            self.seq += 1;
            let mut file = File::create(&tmp_path)?;
            file.write_all(&PACK_MAGIC)?;
            file.write_all(&PACK_VERSION.to_be_bytes())?;
            self.current = Some(Segment {
                file,
                tmp_path,
                bytes: PACK_HEADER_SIZE as u64,
                entries: Vec::new(),
            });
        }
        match self.current.as_mut() {
            Some(segment) => Ok(segment),
            // Assigned just above whenever it was empty.
            None => unreachable!(),
        }
    }

    /// Syncs, renames, and indexes the in-flight segment.
    fn finalize_segment(&mut self) -> Result<Option<FinalizedPack>, StoreError> {
        let Some(mut segment) = self.current.take() else {
            return Ok(None);
        };
        segment.file.flush()?;
        segment.file.sync_all()?;
        drop(segment.file);

        // Segment name derives from its lowest id. A replacement segment
        // can share that id with the very pack it supersedes (the source
        // still exists at this point), so probe for an unused name rather
        // than ever renaming over a live file.
        segment.entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        let base = segment.entries[0].0.to_hex();
        let (pack_path, index_path) = {
            let mut n = 0u32;
            loop {
                let stem = if n == 0 {
                    format!("pack-{base}")
                } else {
                    format!("pack-{base}.{n}")
                };
                let pack = self.pack_dir.join(format!("{stem}.pack"));
                let index = self.pack_dir.join(format!("{stem}.idx"));
                if !pack.exists() && !index.exists() {
                    break (pack, index);
                }
                n += 1;
            }
        };

        fs::rename(&segment.tmp_path, &pack_path)?;
        write_index(&index_path, self.format, &mut segment.entries)?;

        Ok(Some(FinalizedPack {
            index_path,
            pack_path,
            object_count: segment.entries.len() as u64,
        }))
    }
}

impl PackWriter for FsPackWriter {
    fn append(
        &mut self,
        id: &ObjectId,
        kind: ObjectKind,
        payload: &[u8],
    ) -> Result<Option<FinalizedPack>, StoreError> {
        if payload.len() as u64 > u64::from(MAX_PAYLOAD_SIZE) {
            return Err(StoreError::corrupt("payload exceeds pack entry limit"));
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), self.compression);
        encoder.write_all(payload)?;
        let compressed = encoder.finish()?;

        let max = self.max_segment_bytes;
        let segment = self.open_segment()?;
        let offset = segment.bytes;
        segment.file.write_all(&[kind.tag()])?;
        segment
            .file
            .write_all(&(payload.len() as u32).to_be_bytes())?;
        segment.file.write_all(&compressed)?;
        segment.bytes += (ENTRY_HEADER_SIZE + compressed.len()) as u64;
        segment.entries.push((*id, offset));

        if segment.bytes >= max {
            return self.finalize_segment();
        }
        Ok(None)
    }

    fn close(mut self: Box<Self>) -> Result<Option<FinalizedPack>, StoreError> {
        self.finalize_segment()
    }
}

//! Store-facing contract consumed by garbage collection.
//!
//! The GC core never touches pack bytes directly: it reads refs, objects,
//! and pack indexes through these traits, and writes surviving objects
//! through a [`PackWriter`]. Keeping the seam here lets tests drive the GC
//! against an in-memory store while production runs against the
//! filesystem-backed [`crate::store::FsStore`].
//!
//! # Finalize events
//! Pack writers report each durably completed segment as a typed
//! [`FinalizedPack`] value returned from `append` (on size rollover) and
//! `close` (final segment). Sweep keys its stale-file deletion on these
//! values; nothing else in the system may delete a superseded pack.
//!
//! # Invariants
//! - `open_object` returns the fully decoded payload; ids are byte-exact.
//! - Pack indexes expose their id tables in sorted order.
//! - A `FinalizedPack` is only returned after the segment's index and pack
//!   files are fully written and flushed.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use super::object_id::{IdFormat, ObjectId};
use super::object_kind::ObjectKind;

/// Errors from store access and on-disk decoding.
#[derive(Debug)]
#[non_exhaustive]
pub enum StoreError {
    /// Object does not exist in any pack.
    NotFound { id: ObjectId },
    /// Stored data is corrupt or malformed.
    Corrupt { detail: &'static str },
    /// A pack entry carries a kind tag outside the known set.
    UnknownKind { tag: u8 },
    /// On-disk format version is not supported.
    UnsupportedVersion { version: u32 },
    /// Id length does not match the store's configured format.
    IdLengthMismatch { found: usize, expected: usize },
    /// Underlying file I/O failed.
    Io(io::Error),
}

impl StoreError {
    /// Constructs a corruption error with a static detail string.
    #[inline]
    pub const fn corrupt(detail: &'static str) -> Self {
        Self::Corrupt { detail }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "object not found: {id}"),
            Self::Corrupt { detail } => write!(f, "corrupt store data: {detail}"),
            Self::UnknownKind { tag } => {
                write!(f, "unknown object kind tag: 0x{tag:02x}")
            }
            Self::UnsupportedVersion { version } => {
                write!(f, "unsupported store format version: {version}")
            }
            Self::IdLengthMismatch { found, expected } => {
                write!(f, "id length mismatch: found {found}, expected {expected}")
            }
            Self::Io(err) => write!(f, "store I/O error: {err}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// A fully decoded object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectRecord {
    /// Content hash of the object.
    pub id: ObjectId,
    /// Kind tag, already validated against the closed set.
    pub kind: ObjectKind,
    /// Decompressed payload bytes.
    pub payload: Vec<u8>,
}

/// A named root pointer into the commit graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ref {
    /// Ref name (branch or tag style, no path separator semantics here).
    pub name: String,
    /// Commit the ref points at.
    pub commit: ObjectId,
}

/// A durably completed pack segment.
///
/// Returned by [`PackWriter::append`] on rollover and [`PackWriter::close`]
/// for the final segment. Receipt of this value is the only license to
/// delete packs whose live objects were copied into the segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinalizedPack {
    /// Path of the segment's index file.
    pub index_path: PathBuf,
    /// Path of the segment's pack file.
    pub pack_path: PathBuf,
    /// Number of objects written into the segment.
    pub object_count: u64,
}

/// Sorted id → offset table for exactly one pack file.
///
/// Cardinality and id access must not require reading the pack body.
pub trait PackIndex {
    /// Number of objects in the associated pack.
    fn object_count(&self) -> u64;

    /// Returns the id at sorted position `pos`.
    ///
    /// # Panics
    /// May panic when `pos >= object_count()`; callers iterate in range.
    fn id_at(&self, pos: u64) -> ObjectId;

    /// Returns the pack-relative offset of the object at `pos`.
    fn offset_at(&self, pos: u64) -> u64;

    /// Binary-searches the sorted table for `id`.
    fn lookup(&self, id: &ObjectId) -> Option<u64> {
        let mut lo = 0u64;
        let mut hi = self.object_count();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.id_at(mid).cmp(id) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return Some(self.offset_at(mid)),
            }
        }
        None
    }
}

/// Appends objects into replacement pack segments.
///
/// One writer instance is shared across an entire sweep. Implementations
/// roll over to a new segment when the current one reaches its size limit;
/// the completed segment is finalized (index written, data flushed) before
/// the rollover returns.
pub trait PackWriter {
    /// Appends one object, returning a finalize event when this append
    /// filled the current segment and it was durably finalized.
    fn append(
        &mut self,
        id: &ObjectId,
        kind: ObjectKind,
        payload: &[u8],
    ) -> Result<Option<FinalizedPack>, StoreError>;

    /// Finalizes and closes the in-flight segment, if it holds any objects.
    fn close(self: Box<Self>) -> Result<Option<FinalizedPack>, StoreError>;
}

/// Read/write surface of the snapshot object store.
///
/// The GC assumes exclusive access to the store for the duration of a run;
/// this is a documented requirement, not enforced by locking.
pub trait ObjectStore {
    /// Pack index representation this store opens.
    type Index: PackIndex;

    /// Id format every object in this store uses.
    fn id_format(&self) -> IdFormat;

    /// Enumerates all refs (the GC root set) in stable order.
    fn refs(&self) -> Result<Vec<Ref>, StoreError>;

    /// Opens and fully decodes one object.
    ///
    /// # Errors
    /// `NotFound` if no pack holds the id; decode failures surface as
    /// `Corrupt`/`UnknownKind`.
    fn open_object(&mut self, id: &ObjectId) -> Result<ObjectRecord, StoreError>;

    /// Returns the kind of one object from its entry header alone.
    ///
    /// Traversal uses this to classify leaves without inflating their
    /// payloads; implementations must not buffer the object body.
    fn object_kind(&mut self, id: &ObjectId) -> Result<ObjectKind, StoreError>;

    /// Lists the index file path of every pack, in stable order.
    fn pack_index_paths(&self) -> Result<Vec<PathBuf>, StoreError>;

    /// Opens the index at `path`.
    fn open_pack_index(&self, path: &Path) -> Result<Self::Index, StoreError>;

    /// Starts a replacement pack writer at the given zlib level (0-9).
    fn begin_pack(&mut self, compression_level: u32) -> Result<Box<dyn PackWriter>, StoreError>;

    /// Deletes any derived multi-pack index files.
    fn clear_multi_pack_index(&mut self) -> Result<(), StoreError>;

    /// Deletes any derived bloom cache file.
    fn clear_bloom_cache(&mut self) -> Result<(), StoreError>;

    /// Expires the historical reference log.
    fn expire_ref_log(&mut self) -> Result<(), StoreError>;

    /// Directory where per-run scratch files (live-set backing) belong.
    fn scratch_dir(&self) -> PathBuf;
}

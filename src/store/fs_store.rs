//! Directory-backed snapshot object store.
//!
//! Layout under the store root:
//! ```text
//! refs/<name>       one hex commit id per file (the GC root set)
//! logs/<name>       reference log, one "old new" line per update
//! packs/*.pack      immutable object segments
//! packs/*.idx       per-pack sorted indexes (discovery key)
//! packs/*.midx      derived multi-pack index (rebuilt lazily, cleared by GC)
//! packs/store.bloom derived object-presence cache (same lifecycle)
//! ```
//!
//! Pack discovery enumerates `.idx` files only; a pack without its index
//! does not exist as far as readers are concerned. Opened indexes and pack
//! mappings are cached per path for the life of the store handle; lookups
//! always iterate the *current* directory listing, so packs deleted by a
//! sweep drop out of every subsequent decision even while their mappings
//! linger in cache.
//!
//! # Invariants
//! - Exclusive access is assumed while a GC run is active (documented,
//!   not enforced by locking).
//! - `open_object` never returns bytes whose inflated length disagrees
//!   with the entry header.

use std::collections::HashMap;
use std::fs;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use super::api::{ObjectRecord, ObjectStore, PackIndex, PackWriter, Ref, StoreError};
use super::object_id::{IdFormat, ObjectId};
use super::object_kind::ObjectKind;
use super::pack_file::{check_pack_header, entry_at, entry_kind_at, FsPackWriter, TMP_PREFIX};
use super::pack_index::IdxFile;

/// Default replacement segment rollover size (64 MiB).
const DEFAULT_MAX_SEGMENT_BYTES: u64 = 64 * 1024 * 1024;
/// File name of the derived bloom cache.
const BLOOM_CACHE_NAME: &str = "store.bloom";
/// Extension of derived multi-pack index files.
const MIDX_EXT: &str = "midx";

/// Filesystem-backed [`ObjectStore`].
pub struct FsStore {
    root: PathBuf,
    format: IdFormat,
    max_segment_bytes: u64,
    indexes: HashMap<PathBuf, IdxFile>,
    packs: HashMap<PathBuf, Mmap>,
}

impl FsStore {
    /// Initializes a fresh store directory tree.
    ///
    /// # Errors
    /// Any directory creation failure.
    pub fn create(root: &Path, format: IdFormat) -> Result<Self, StoreError> {
        fs::create_dir_all(root.join("refs"))?;
        fs::create_dir_all(root.join("logs"))?;
        fs::create_dir_all(root.join("packs"))?;
        Ok(Self::handle(root, format))
    }

    /// Opens an existing store directory.
    ///
    /// # Errors
    /// `Corrupt` when the expected subdirectories are missing.
    pub fn open(root: &Path, format: IdFormat) -> Result<Self, StoreError> {
        for sub in ["refs", "logs", "packs"] {
            if !root.join(sub).is_dir() {
                return Err(StoreError::corrupt("store layout is incomplete"));
            }
        }
        Ok(Self::handle(root, format))
    }

    fn handle(root: &Path, format: IdFormat) -> Self {
        Self {
            root: root.to_path_buf(),
            format,
            max_segment_bytes: DEFAULT_MAX_SEGMENT_BYTES,
            indexes: HashMap::new(),
            packs: HashMap::new(),
        }
    }

    /// Overrides the replacement segment rollover size.
    ///
    /// Small values force rollover per object, which sweep tests use to
    /// exercise incremental stale-file deletion.
    #[must_use]
    pub fn with_max_segment_bytes(mut self, bytes: u64) -> Self {
        self.max_segment_bytes = bytes;
        self
    }

    /// Directory holding pack and index files.
    #[must_use]
    pub fn packs_dir(&self) -> PathBuf {
        self.root.join("packs")
    }

    /// Points `name` at `commit`, recording the transition in the ref log.
    ///
    /// # Errors
    /// Any file I/O failure.
    pub fn update_ref(&mut self, name: &str, commit: &ObjectId) -> Result<(), StoreError> {
        let ref_path = self.root.join("refs").join(name);
        let old = match fs::read_to_string(&ref_path) {
            Ok(text) => text.trim().to_string(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                "0".repeat(self.format.hex_len() as usize)
            }
            Err(err) => return Err(err.into()),
        };

        let mut file = File::create(&ref_path)?;
        writeln!(file, "{commit}")?;
        file.sync_all()?;

        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join("logs").join(name))?;
        writeln!(log, "{old} {commit}")?;
        Ok(())
    }

    /// Returns the ref log contents, for inspection in tests.
    pub fn ref_log(&self, name: &str) -> Result<String, StoreError> {
        Ok(fs::read_to_string(self.root.join("logs").join(name))?)
    }

    fn index_for(&mut self, path: &Path) -> Result<&IdxFile, StoreError> {
        if !self.indexes.contains_key(path) {
            let idx = IdxFile::open(path, self.format)?;
            self.indexes.insert(path.to_path_buf(), idx);
        }
        Ok(&self.indexes[path])
    }

    fn pack_for(&mut self, idx_path: &Path) -> Result<&Mmap, StoreError> {
        let pack_path = idx_path.with_extension("pack");
        if !self.packs.contains_key(&pack_path) {
            let file = File::open(&pack_path)?;
            let mmap = unsafe { Mmap::map(&file)? };
            check_pack_header(&mmap)?;
            self.packs.insert(pack_path.clone(), mmap);
        }
        Ok(&self.packs[&pack_path])
    }

    /// Locates `id`, returning the owning index path and entry offset.
    fn locate(&mut self, id: &ObjectId) -> Result<Option<(PathBuf, u64)>, StoreError> {
        if id.len() != self.format.id_len() {
            return Err(StoreError::IdLengthMismatch {
                found: id.len() as usize,
                expected: self.format.id_len() as usize,
            });
        }
        for idx_path in self.pack_index_paths()? {
            let idx = self.index_for(&idx_path)?;
            if let Some(offset) = idx.lookup(id) {
                return Ok(Some((idx_path, offset)));
            }
        }
        Ok(None)
    }
}

impl ObjectStore for FsStore {
    type Index = IdxFile;

    fn id_format(&self) -> IdFormat {
        self.format
    }

    fn refs(&self) -> Result<Vec<Ref>, StoreError> {
        let mut refs = Vec::new();
        for entry in fs::read_dir(self.root.join("refs"))? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let text = fs::read_to_string(entry.path())?;
            let commit = ObjectId::from_hex(text.trim().as_bytes())
                .ok_or_else(|| StoreError::corrupt("ref file does not hold a hex id"))?;
            refs.push(Ref { name, commit });
        }
        refs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(refs)
    }

    fn open_object(&mut self, id: &ObjectId) -> Result<ObjectRecord, StoreError> {
        let Some((idx_path, offset)) = self.locate(id)? else {
            return Err(StoreError::NotFound { id: *id });
        };
        let pack = self.pack_for(&idx_path)?;
        let (kind, payload) = entry_at(pack, offset)?;
        Ok(ObjectRecord {
            id: *id,
            kind,
            payload,
        })
    }

    fn object_kind(&mut self, id: &ObjectId) -> Result<ObjectKind, StoreError> {
        let Some((idx_path, offset)) = self.locate(id)? else {
            return Err(StoreError::NotFound { id: *id });
        };
        let pack = self.pack_for(&idx_path)?;
        entry_kind_at(pack, offset)
    }

    fn pack_index_paths(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(self.packs_dir())? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(TMP_PREFIX) {
                continue;
            }
            if path.extension().is_some_and(|ext| ext == "idx") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn open_pack_index(&self, path: &Path) -> Result<Self::Index, StoreError> {
        IdxFile::open(path, self.format)
    }

    fn begin_pack(&mut self, compression_level: u32) -> Result<Box<dyn PackWriter>, StoreError> {
        Ok(Box::new(FsPackWriter::new(
            &self.packs_dir(),
            self.format,
            compression_level,
            self.max_segment_bytes,
        )?))
    }

    fn clear_multi_pack_index(&mut self) -> Result<(), StoreError> {
        for entry in fs::read_dir(self.packs_dir())? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == MIDX_EXT) {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn clear_bloom_cache(&mut self) -> Result<(), StoreError> {
        let path = self.packs_dir().join(BLOOM_CACHE_NAME);
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn expire_ref_log(&mut self) -> Result<(), StoreError> {
        for entry in fs::read_dir(self.root.join("logs"))? {
            let path = entry?.path();
            // Expiring truncates history; the log file itself survives.
            File::create(path)?;
        }
        Ok(())
    }

    fn scratch_dir(&self) -> PathBuf {
        self.packs_dir()
    }
}

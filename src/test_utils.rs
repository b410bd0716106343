//! Shared fixtures for unit tests: a deterministic object-graph builder
//! and an in-memory [`ObjectStore`].
//!
//! Ids are synthetic (counter-derived), which keeps graph shapes explicit
//! in tests; content addressing is irrelevant to traversal and liveness
//! logic, which treat ids as opaque bytes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::store::{
    encode_entry, IdFormat, ObjectId, ObjectKind, ObjectRecord, ObjectStore, PackIndex,
    PackWriter, Ref, StoreError,
};

/// Builds commit/tree/blob graphs with deterministic ids.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    next: u8,
    objects: BTreeMap<ObjectId, (ObjectKind, Vec<u8>)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> ObjectId {
        self.next = self.next.checked_add(1).expect("graph fixture too large");
        let mut bytes = [0u8; 20];
        bytes[0] = self.next;
        bytes[19] = self.next;
        ObjectId::sha1(bytes)
    }

    /// Adds a blob with the given payload.
    pub fn blob(&mut self, payload: &[u8]) -> ObjectId {
        let id = self.next_id();
        self.objects
            .insert(id, (ObjectKind::Blob, payload.to_vec()));
        id
    }

    /// Adds a tree; entry modes are inferred from the children's kinds.
    pub fn tree(&mut self, entries: &[(&str, ObjectId)]) -> ObjectId {
        let mut payload = Vec::new();
        for (name, child) in entries {
            let mode = match self.objects.get(child) {
                Some((ObjectKind::Tree, _)) => 0o040000,
                _ => 0o100644,
            };
            encode_entry(&mut payload, mode, name.as_bytes(), child);
        }
        let id = self.next_id();
        self.objects.insert(id, (ObjectKind::Tree, payload));
        id
    }

    /// Adds a commit pointing at `tree` with the given parents.
    pub fn commit(&mut self, tree: ObjectId, parents: &[ObjectId]) -> ObjectId {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"tree ");
        payload.extend_from_slice(tree.to_hex().as_bytes());
        payload.push(b'\n');
        for parent in parents {
            payload.extend_from_slice(b"parent ");
            payload.extend_from_slice(parent.to_hex().as_bytes());
            payload.push(b'\n');
        }
        payload.extend_from_slice(b"author t <t@test> 0 +0000\n");
        payload.extend_from_slice(b"committer t <t@test> 0 +0000\n\nfixture\n");
        let id = self.next_id();
        self.objects.insert(id, (ObjectKind::Commit, payload));
        id
    }

    /// All object ids added so far.
    pub fn all_ids(&self) -> Vec<ObjectId> {
        self.objects.keys().copied().collect()
    }

    /// Looks up one object record.
    pub fn record(&self, id: &ObjectId) -> Option<ObjectRecord> {
        self.objects.get(id).map(|(kind, payload)| ObjectRecord {
            id: *id,
            kind: *kind,
            payload: payload.clone(),
        })
    }
}

/// Sorted in-memory pack index.
#[derive(Debug, Clone)]
pub struct MemIndex {
    ids: Vec<ObjectId>,
}

impl MemIndex {
    /// Builds an index over `ids`, sorting them as a real index would.
    pub fn from_ids(mut ids: Vec<ObjectId>) -> Self {
        ids.sort_unstable();
        Self { ids }
    }
}

impl PackIndex for MemIndex {
    fn object_count(&self) -> u64 {
        self.ids.len() as u64
    }

    fn id_at(&self, pos: u64) -> ObjectId {
        self.ids[pos as usize]
    }

    fn offset_at(&self, pos: u64) -> u64 {
        pos
    }
}

/// In-memory [`ObjectStore`] for traversal and mark tests.
///
/// Holds objects in a map and models packs as id lists. It cannot write
/// replacement packs; sweep behavior is tested against the filesystem
/// store.
pub struct MemStore {
    format: IdFormat,
    objects: BTreeMap<ObjectId, (ObjectKind, Vec<u8>)>,
    refs: BTreeMap<String, ObjectId>,
    packs: Vec<Vec<ObjectId>>,
    scratch: tempfile::TempDir,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            format: IdFormat::Sha1,
            objects: BTreeMap::new(),
            refs: BTreeMap::new(),
            packs: Vec::new(),
            scratch: tempfile::tempdir().expect("scratch dir"),
        }
    }

    /// Builds a store holding every object of `graph` in a single pack.
    pub fn from_graph(graph: &GraphBuilder) -> Self {
        let mut store = Self::new();
        for id in graph.all_ids() {
            let record = graph.record(&id).unwrap();
            store.objects.insert(id, (record.kind, record.payload));
        }
        store.packs.push(graph.all_ids());
        store
    }

    /// Points a ref at a commit.
    pub fn set_ref(&mut self, name: &str, commit: ObjectId) {
        self.refs.insert(name.to_string(), commit);
    }

    /// Registers an additional pack holding exactly `ids`.
    pub fn add_pack(&mut self, ids: &[ObjectId]) {
        self.packs.push(ids.to_vec());
    }

    /// Drops an object, simulating store corruption.
    pub fn remove(&mut self, id: &ObjectId) {
        self.objects.remove(id);
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for MemStore {
    type Index = MemIndex;

    fn id_format(&self) -> IdFormat {
        self.format
    }

    fn refs(&self) -> Result<Vec<Ref>, StoreError> {
        Ok(self
            .refs
            .iter()
            .map(|(name, commit)| Ref {
                name: name.clone(),
                commit: *commit,
            })
            .collect())
    }

    fn open_object(&mut self, id: &ObjectId) -> Result<ObjectRecord, StoreError> {
        match self.objects.get(id) {
            Some((kind, payload)) => Ok(ObjectRecord {
                id: *id,
                kind: *kind,
                payload: payload.clone(),
            }),
            None => Err(StoreError::NotFound { id: *id }),
        }
    }

    fn object_kind(&mut self, id: &ObjectId) -> Result<ObjectKind, StoreError> {
        match self.objects.get(id) {
            Some((kind, _)) => Ok(*kind),
            None => Err(StoreError::NotFound { id: *id }),
        }
    }

    fn pack_index_paths(&self) -> Result<Vec<PathBuf>, StoreError> {
        Ok((0..self.packs.len())
            .map(|i| PathBuf::from(format!("mem-pack-{i}.idx")))
            .collect())
    }

    fn open_pack_index(&self, path: &Path) -> Result<Self::Index, StoreError> {
        let name = path.to_string_lossy();
        let pos: usize = name
            .strip_prefix("mem-pack-")
            .and_then(|rest| rest.strip_suffix(".idx"))
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| StoreError::corrupt("unknown mem pack path"))?;
        let mut ids = self
            .packs
            .get(pos)
            .ok_or_else(|| StoreError::corrupt("mem pack out of range"))?
            .clone();
        ids.sort_unstable();
        Ok(MemIndex { ids })
    }

    fn begin_pack(&mut self, _compression_level: u32) -> Result<Box<dyn PackWriter>, StoreError> {
        Err(StoreError::corrupt("mem store cannot write packs"))
    }

    fn clear_multi_pack_index(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn clear_bloom_cache(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn expire_ref_log(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn scratch_dir(&self) -> PathBuf {
        self.scratch.path().to_path_buf()
    }
}

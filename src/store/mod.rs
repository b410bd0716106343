//! Content-addressed snapshot object store.
//!
//! Objects (blobs, trees, commits) live in immutable append-only pack
//! files, each paired with a sorted index. Refs name the retained commit
//! roots. The [`api`] traits are the seam garbage collection runs
//! against; [`FsStore`] is the directory-backed production implementation.
//!
//! # Invariants
//! - Packs are never modified in place; replacement + deletion is the
//!   only reclamation path.
//! - Every id is a fixed-width content hash; equality is byte-exact.

pub mod api;
pub mod commit;
pub mod fs_store;
pub mod object_id;
pub mod object_kind;
pub mod pack_file;
pub mod pack_index;
pub mod tree;

pub use api::{
    FinalizedPack, ObjectRecord, ObjectStore, PackIndex, PackWriter, Ref, StoreError,
};
pub use commit::{parse_commit, CommitRefs};
pub use fs_store::FsStore;
pub use object_id::{IdFormat, ObjectId};
pub use object_kind::ObjectKind;
pub use pack_file::FsPackWriter;
pub use pack_index::{write_index, IdxFile};
pub use tree::{demangle_name, encode_entry, NameStyle, TreeEntry, TreeEntryIter};

//! Deduplicating snapshot store with density-driven garbage collection.
//!
//! ## Scope
//! This crate stores snapshots as content-addressed objects (blobs, trees,
//! commits) in immutable append-only pack files and reclaims space with a
//! mark/sweep garbage collector built for stores too large to hold an
//! object graph in memory.
//!
//! ## Key invariants
//! - Liveness tracking is probabilistic but one-sided: the bloom live set
//!   can retain garbage for a cycle, never drop a live object.
//! - Packs are immutable; reclamation rewrites live objects into
//!   replacement segments and deletes originals only after the
//!   replacement is durably finalized.
//! - Every GC error is fatal to its run; a failed run leaves at worst
//!   orphaned scratch files, never a missing live object.
//!
//! ## GC flow (single run)
//! 1) Count objects from pack index cardinalities.
//! 2) Walk all refs depth-first, dedup shared trees, fill the live set.
//! 3) Triage each pack: keep / rewrite / delete by live density.
//! 4) Copy live objects from sparse packs; delete superseded files on
//!    segment finalize events.
//!
//! ## Notable entry points
//! - [`gc::Gc`] / [`gc::GcConfig`]: run collection against a store.
//! - [`store::FsStore`]: directory-backed object store.
//! - [`store::api`]: traits for alternative store backends.

pub mod gc;
pub mod store;

#[cfg(test)]
pub mod test_utils;

pub use gc::{Gc, GcConfig, GcError, GcReport};
pub use store::{FsStore, IdFormat, ObjectId, ObjectKind};

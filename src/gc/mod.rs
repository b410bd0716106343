//! Garbage collection for the snapshot object store.
//!
//! Reclaims space from objects no longer reachable from any ref, across
//! many immutable pack files, without ever deleting a live object and
//! without holding the whole object graph in memory.
//!
//! A run proceeds in phases:
//! 1. **Count** existing objects from pack index cardinalities alone.
//! 2. **Mark**: walk every ref's reachable graph ([`GraphWalker`]) and
//!    record visited ids in a bloom [`LiveSet`] - false positives retain
//!    extra garbage for a cycle, false negatives cannot happen, so
//!    deletion decisions are always safe.
//! 3. **Triage** each pack by live-data density ([`classify`]).
//! 4. **Sweep**: copy live objects out of sparse packs into replacement
//!    segments and delete superseded files only after their replacement
//!    is durable ([`sweep`]).
//!
//! # Invariants
//! - Every object reachable from a ref at run start is in the live set
//!   before any sweep decision.
//! - A pack is deleted only when classified delete, or after its live
//!   objects reached a finalized replacement segment.
//! - All errors are fatal to the run; there is no partial-commit state.

pub mod classify;
pub mod errors;
pub mod live_set;
pub mod mark;
pub mod run;
pub mod sweep;
pub mod walk;

pub use classify::{classify, PackTriage};
pub use errors::GcError;
pub use live_set::LiveSet;
pub use mark::{mark_live, MarkStats};
pub use run::{Gc, GcConfig, GcReport};
pub use sweep::{sweep, StaleFileSet, SweepStats};
pub use walk::{GraphWalker, Walk, WalkedObject};

//! Garbage collection orchestration.
//!
//! Sequences a run: count existing objects (pack index cardinalities
//! only), short-circuit when the store is empty, build the live set,
//! invalidate derived caches, sweep, and report. The live set's backing
//! file is a transient artifact of the run and is removed on every exit
//! path, success or failure, by drop.
//!
//! The store is assumed exclusively owned for the duration of the run: no
//! concurrent writer may add objects or move refs while collection is in
//! progress. This is a documented requirement, not enforced by locking.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::store::{ObjectStore, PackIndex};

use super::errors::GcError;
use super::mark::mark_live;
use super::sweep::sweep;
use super::walk::GraphWalker;

/// Tunables for a GC run.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GcConfig {
    /// Percent of a pack that must be garbage to justify rewriting it.
    /// Range `0..=100`. Default: 10.
    pub threshold_percent: u32,
    /// zlib level for replacement segments. Range `0..=9`. Default: 1.
    pub compression_level: u32,
}

impl GcConfig {
    /// Defaults matching ordinary maintenance runs.
    pub const DEFAULT: Self = Self {
        threshold_percent: 10,
        compression_level: 1,
    };

    /// Validates ranges.
    ///
    /// # Errors
    /// `InvalidConfig` when a field is out of range.
    pub fn validate(&self) -> Result<(), GcError> {
        if self.threshold_percent > 100 {
            return Err(GcError::InvalidConfig {
                detail: "threshold must be a percentage in 0..=100",
            });
        }
        if self.compression_level > 9 {
            return Err(GcError::InvalidConfig {
                detail: "compression level must be in 0..=9",
            });
        }
        Ok(())
    }
}

impl Default for GcConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Outcome of a completed run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcReport {
    /// Objects in the store when the run started.
    pub objects_before: u64,
    /// Objects in the store after sweeping.
    pub objects_after: u64,
    /// Distinct live objects found by the mark phase (estimate; subject
    /// to the live set's false-positive rate).
    pub live_estimate: u64,
    /// Packs left untouched.
    pub packs_kept: u64,
    /// Packs removed without replacement.
    pub packs_deleted: u64,
    /// Packs rewritten into replacement segments.
    pub packs_rewritten: u64,
}

impl GcReport {
    /// Share of objects discarded by the run, in percent.
    #[must_use]
    pub fn discarded_percent(&self) -> f64 {
        if self.objects_before == 0 {
            return 0.0;
        }
        (self.objects_before - self.objects_after) as f64 / self.objects_before as f64 * 100.0
    }
}

/// Garbage collector for a snapshot object store.
#[derive(Clone, Copy, Debug)]
pub struct Gc {
    config: GcConfig,
}

impl Gc {
    /// Creates a collector with validated configuration.
    ///
    /// # Errors
    /// `InvalidConfig` on out-of-range fields.
    pub fn new(config: GcConfig) -> Result<Self, GcError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Runs one collection over `store`.
    ///
    /// Requires exclusive store access for the duration of the call. An
    /// empty store yields a successful no-op report without touching any
    /// file.
    ///
    /// # Errors
    /// Fatal on store corruption, missing reachable objects, or I/O
    /// failure; no pack is ever deleted before its replacement (if any)
    /// is durably finalized, so a failed run never loses live data.
    pub fn collect<S: ObjectStore>(&self, store: &mut S) -> Result<GcReport, GcError> {
        let objects_before = count_objects(store)?;
        info!(objects = objects_before, "gc start");
        if objects_before == 0 {
            info!("nothing to collect");
            return Ok(GcReport::default());
        }

        let mut walker = GraphWalker::new(store.id_format());
        let (live, mark_stats) = mark_live(store, &mut walker, objects_before)?;

        // Derived caches encode object locations and ref history the
        // sweep invalidates; clear them before any file changes. They are
        // rebuilt lazily by ordinary store operations.
        store.clear_multi_pack_index()?;
        store.clear_bloom_cache()?;
        store.expire_ref_log()?;

        let sweep_stats = sweep(
            store,
            &live,
            self.config.threshold_percent,
            self.config.compression_level,
        )?;
        drop(live);

        let objects_after = count_objects(store)?;
        let report = GcReport {
            objects_before,
            objects_after,
            live_estimate: mark_stats.live,
            packs_kept: sweep_stats.packs_kept,
            packs_deleted: sweep_stats.packs_deleted,
            packs_rewritten: sweep_stats.packs_rewritten,
        };
        info!(
            objects_before,
            objects_after,
            discarded_pct = report.discarded_percent(),
            "gc done"
        );
        Ok(report)
    }
}

/// Sums pack index cardinalities; never reads object contents.
fn count_objects<S: ObjectStore>(store: &S) -> Result<u64, GcError> {
    let mut total = 0u64;
    for path in store.pack_index_paths()? {
        total += store.open_pack_index(&path)?.object_count();
    }
    Ok(total)
}

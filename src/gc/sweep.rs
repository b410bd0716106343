//! Sweep phase: execute pack triage.
//!
//! Keep packs are untouched. Delete packs are scheduled for removal
//! immediately (nothing depends on them). Rewrite packs have their live
//! objects copied into a single replacement writer shared across the whole
//! run, and are scheduled for removal afterwards.
//!
//! # Deletion ordering
//! Scheduled files are held in a [`StaleFileSet`] and drained only when
//! the replacement writer reports a durably finalized segment (on
//! rollover, and at close), plus a final drain for runs whose schedule
//! contains only pure deletions. A Rewrite pack's files therefore never
//! disappear before the segment holding its live objects exists on disk,
//! and peak extra disk usage stays around one in-flight segment plus the
//! largest pending stale set. A crash at any point leaves every
//! still-scheduled original in place.
//!
//! Derived caches (multi-pack index, bloom cache, ref log) must be
//! invalidated before sweeping; the orchestrator does this, since those
//! caches encode object locations the sweep is about to change.
//!
//! # Failure
//! Any copy or removal error aborts the run. A partially written
//! replacement segment is never finalized and never replaces originals.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::store::{ObjectStore, PackIndex};

use super::classify::{classify, PackTriage};
use super::errors::GcError;
use super::live_set::LiveSet;

/// Files superseded by the current sweep, pending removal.
#[derive(Debug, Default)]
pub struct StaleFileSet {
    files: Vec<PathBuf>,
}

impl StaleFileSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a pack's index and data files for removal.
    pub fn schedule_pack(&mut self, index_path: &Path) {
        self.files.push(index_path.to_path_buf());
        self.files.push(index_path.with_extension("pack"));
    }

    /// Number of files currently scheduled.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when nothing is scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Removes every scheduled file.
    ///
    /// Only call once the precondition holds: every replacement segment
    /// the scheduled files' live objects went into has been finalized.
    ///
    /// # Errors
    /// Removal failures are fatal; at this point a halt costs disk space,
    /// never data.
    pub fn drain(&mut self) -> Result<(), GcError> {
        for path in self.files.drain(..) {
            debug!(path = %path.display(), "removing stale file");
            fs::remove_file(&path).map_err(|err| GcError::io(path, err))?;
        }
        Ok(())
    }
}

/// Counters from a completed sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Packs left untouched.
    pub packs_kept: u64,
    /// Packs deleted without replacement.
    pub packs_deleted: u64,
    /// Packs whose live objects were copied forward.
    pub packs_rewritten: u64,
    /// Objects copied into replacement segments.
    pub objects_copied: u64,
}

/// Sweeps every pack of `store` against `live`.
///
/// # Errors
/// Fatal on any store read, copy, or removal failure; originals scheduled
/// but not yet drained remain on disk.
pub fn sweep<S: ObjectStore>(
    store: &mut S,
    live: &LiveSet,
    threshold_percent: u32,
    compression_level: u32,
) -> Result<SweepStats, GcError> {
    let mut stats = SweepStats::default();
    let mut stale = StaleFileSet::new();
    let index_paths = store.pack_index_paths()?;
    let mut writer = store.begin_pack(compression_level)?;

    for index_path in index_paths {
        let index = store.open_pack_index(&index_path)?;
        let (triage, live_count) = classify(&index, live, threshold_percent);
        let total = index.object_count();

        match triage {
            PackTriage::Keep => {
                info!(
                    pack = %index_path.display(),
                    live = live_count,
                    total,
                    "keep"
                );
                stats.packs_kept += 1;
            }
            PackTriage::Delete => {
                info!(pack = %index_path.display(), total, "delete");
                stale.schedule_pack(&index_path);
                stats.packs_deleted += 1;
            }
            PackTriage::Rewrite => {
                info!(
                    pack = %index_path.display(),
                    live = live_count,
                    total,
                    "rewrite"
                );
                for pos in 0..total {
                    let id = index.id_at(pos);
                    if !live.contains(&id) {
                        continue;
                    }
                    let record = store.open_object(&id)?;
                    if let Some(finalized) =
                        writer.append(&record.id, record.kind, &record.payload)?
                    {
                        info!(
                            pack = %finalized.pack_path.display(),
                            objects = finalized.object_count,
                            "created replacement segment"
                        );
                        stale.drain()?;
                    }
                    stats.objects_copied += 1;
                }
                stale.schedule_pack(&index_path);
                stats.packs_rewritten += 1;
            }
        }
    }

    if let Some(finalized) = writer.close()? {
        info!(
            pack = %finalized.pack_path.display(),
            objects = finalized.object_count,
            "created replacement segment"
        );
    }
    // Pure deletions, and sources of the final segment.
    stale.drain()?;

    Ok(stats)
}

//! Mark phase: build the live set from every ref.
//!
//! Walks the full reachable graph of each ref in enumeration order and
//! records every visited id in a [`LiveSet`] sized from the summed pack
//! index cardinalities (never from object contents). The distinct-live
//! counter is itself subject to the filter's false-positive rate, so it is
//! a report figure; sweep decisions only ever consult the filter, whose
//! false positives retain rather than drop.
//!
//! Any error reading or parsing an object aborts the phase: GC must not
//! proceed with an incomplete mark.

use std::time::Instant;

use tracing::{debug, info};

use crate::store::ObjectStore;

use super::errors::GcError;
use super::live_set::LiveSet;
use super::walk::GraphWalker;

/// Progress line cadence, in traversed objects.
const PROGRESS_INTERVAL: u64 = 128;

/// Counters from a completed mark phase. Advisory only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MarkStats {
    /// Objects yielded across all ref walks (edges, not distinct ids).
    pub traversed: u64,
    /// Ids that were new to the live set when added.
    pub live: u64,
}

/// Builds the live set for one GC run.
///
/// `expected` sizes the filter; the caller derives it from pack index
/// cardinalities. The walker must be fresh for this run so its tree dedup
/// state spans exactly these ref walks.
///
/// # Errors
/// Fatal on any traversal failure; the partially filled set is discarded
/// (and its backing file removed) by drop.
pub fn mark_live<S: ObjectStore>(
    store: &mut S,
    walker: &mut GraphWalker,
    expected: u64,
) -> Result<(LiveSet, MarkStats), GcError> {
    let mut live = LiveSet::create(&store.scratch_dir(), expected).map_err(GcError::LiveSet)?;
    let mut stats = MarkStats::default();
    let started = Instant::now();

    for r in store.refs()? {
        info!(ref_name = %r.name, "traversing");
        let mut walk = walker.walk(store, r.commit, false, None);
        while let Some(item) = walk.next_object()? {
            if stats.traversed % PROGRESS_INTERVAL == 0 {
                let elapsed = started.elapsed().as_secs_f64();
                let rate = if elapsed > 0.0 {
                    stats.traversed as f64 / elapsed
                } else {
                    0.0
                };
                debug!(
                    traversed = stats.traversed,
                    live = stats.live,
                    objs_per_sec = rate as u64,
                    "searching live objects"
                );
            }
            if !live.contains(&item.id) {
                stats.live += 1;
            }
            live.add(&item.id);
            stats.traversed += 1;
        }
        info!(
            ref_name = %r.name,
            traversed = stats.traversed,
            "searched"
        );
    }

    debug!(
        expected_retained_pct = live.false_positive_rate() * 100.0,
        "mark complete"
    );
    Ok((live, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::IdFormat;
    use crate::test_utils::{GraphBuilder, MemStore};

    #[test]
    fn marks_everything_reachable_from_all_refs() {
        let mut g = GraphBuilder::new();
        let b1 = g.blob(b"one");
        let t1 = g.tree(&[("a", b1)]);
        let c1 = g.commit(t1, &[]);
        let b2 = g.blob(b"two");
        let t2 = g.tree(&[("b", b2)]);
        let c2 = g.commit(t2, &[c1]);
        let garbage = g.blob(b"junk");

        let mut store = MemStore::from_graph(&g);
        store.set_ref("main", c2);

        let mut walker = GraphWalker::new(IdFormat::Sha1);
        let (live, stats) = mark_live(&mut store, &mut walker, 16).unwrap();

        for id in [b1, t1, c1, b2, t2, c2] {
            assert!(live.contains(&id));
        }
        assert!(!live.contains(&garbage));
        assert_eq!(stats.live, 6);
        assert_eq!(stats.traversed, 6);
    }

    #[test]
    fn shared_ancestor_tree_is_traversed_once() {
        let mut g = GraphBuilder::new();
        let blob = g.blob(b"shared");
        let shared_tree = g.tree(&[("f", blob)]);
        let base = g.commit(shared_tree, &[]);
        let left = g.commit(shared_tree, &[base]);
        let right = g.commit(shared_tree, &[base]);

        let mut store = MemStore::from_graph(&g);
        store.set_ref("left", left);
        store.set_ref("right", right);

        let mut walker = GraphWalker::new(IdFormat::Sha1);
        let (live, _) = mark_live(&mut store, &mut walker, 16).unwrap();

        // Two ref walks reach the shared tree; it is visited exactly once.
        assert_eq!(walker.trees_yielded(), 1);
        for id in [blob, shared_tree, base, left, right] {
            assert!(live.contains(&id));
        }
    }

    #[test]
    fn missing_object_aborts_the_mark() {
        let mut g = GraphBuilder::new();
        let blob = g.blob(b"x");
        let tree = g.tree(&[("f", blob)]);
        let commit = g.commit(tree, &[]);
        let mut store = MemStore::from_graph(&g);
        store.set_ref("main", commit);
        store.remove(&blob);

        let mut walker = GraphWalker::new(IdFormat::Sha1);
        let err = mark_live(&mut store, &mut walker, 16).unwrap_err();
        assert!(matches!(err, GcError::MissingObject { .. }));
    }

    #[test]
    fn no_refs_yields_an_empty_set() {
        let mut store = MemStore::new();
        let mut walker = GraphWalker::new(IdFormat::Sha1);
        let (_, stats) = mark_live(&mut store, &mut walker, 1).unwrap();
        assert_eq!(stats, MarkStats::default());
    }
}

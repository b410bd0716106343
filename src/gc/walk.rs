//! Reachability traversal of the object graph.
//!
//! [`GraphWalker`] yields every object reachable from a starting id by
//! following commit→tree, commit→parent-commit, and tree→entry edges, in
//! depth-first pre-order: the object itself, then (for a commit) its tree,
//! then its entries, then its parents. Traversal uses an explicit work
//! stack; recursion depth never tracks graph depth.
//!
//! # Tree deduplication
//! Snapshots share subtrees heavily, so the walker remembers every tree id
//! it has yielded and skips repeats together with their entire subtree.
//! The set is owned by the walker instance and persists across its
//! successive [`GraphWalker::walk`] calls - one instance serves one GC
//! run, so a tree reachable from several refs is yielded exactly once per
//! run. It is traversal-time memory, separate from the live set, and grows
//! with the number of distinct trees visited. A fresh instance starts with
//! fresh dedup state; instances are never shared across runs or threads.
//!
//! # Payloads
//! Payload inclusion is opt-in per walk. Without it, commit and tree
//! payloads are still read to extract structural references but are not
//! yielded, and blob payloads are never inflated at all.
//!
//! # Failure
//! Any missing object or corrupt payload is fatal: the walk is fused after
//! the first error, and the caller must abort the run. Unknown object
//! kinds die earlier, at the store's decode boundary.

use ahash::AHashSet;

use crate::store::{parse_commit, IdFormat, ObjectId, ObjectKind, ObjectStore, TreeEntryIter};

use super::errors::GcError;

/// One reachable object, in traversal order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkedObject {
    /// Object id.
    pub id: ObjectId,
    /// Object kind.
    pub kind: ObjectKind,
    /// Payload bytes, present only when the walk requested them.
    pub payload: Option<Vec<u8>>,
}

/// Per-run traversal state: the visited-trees set and its counters.
#[derive(Debug)]
pub struct GraphWalker {
    format: IdFormat,
    trees_seen: AHashSet<ObjectId>,
    trees_yielded: u64,
}

impl GraphWalker {
    /// Creates a walker with empty dedup state.
    #[must_use]
    pub fn new(format: IdFormat) -> Self {
        Self {
            format,
            trees_seen: AHashSet::new(),
            trees_yielded: 0,
        }
    }

    /// Number of distinct trees yielded by this instance so far.
    ///
    /// Observability only; liveness never consults this.
    #[inline]
    #[must_use]
    pub fn trees_yielded(&self) -> u64 {
        self.trees_yielded
    }

    /// Starts a traversal from `start`.
    ///
    /// `stop_at` prunes: when it returns true for the root of any
    /// sub-walk (including `start` itself), that subtree is skipped
    /// entirely. `include_payload` opts into carrying payload bytes in
    /// the yielded items.
    pub fn walk<'w, S: ObjectStore>(
        &'w mut self,
        store: &'w mut S,
        start: ObjectId,
        include_payload: bool,
        stop_at: Option<&'w dyn Fn(&ObjectId) -> bool>,
    ) -> Walk<'w, S> {
        Walk {
            walker: self,
            store,
            include_payload,
            stop_at,
            stack: vec![start],
            failed: false,
        }
    }
}

/// A single in-progress traversal.
///
/// Fused: after yielding an error, subsequent calls return `Ok(None)`.
pub struct Walk<'w, S: ObjectStore> {
    walker: &'w mut GraphWalker,
    store: &'w mut S,
    include_payload: bool,
    stop_at: Option<&'w dyn Fn(&ObjectId) -> bool>,
    stack: Vec<ObjectId>,
    failed: bool,
}

impl<S: ObjectStore> Walk<'_, S> {
    /// Yields the next reachable object in depth-first pre-order.
    pub fn next_object(&mut self) -> Result<Option<WalkedObject>, GcError> {
        if self.failed {
            return Ok(None);
        }
        match self.advance() {
            Ok(item) => Ok(item),
            Err(err) => {
                self.failed = true;
                Err(err)
            }
        }
    }

    fn advance(&mut self) -> Result<Option<WalkedObject>, GcError> {
        while let Some(id) = self.stack.pop() {
            if self.stop_at.is_some_and(|stop| stop(&id)) {
                continue;
            }
            let kind = self.store.object_kind(&id)?;
            match kind {
                ObjectKind::Blob => {
                    let payload = if self.include_payload {
                        Some(self.store.open_object(&id)?.payload)
                    } else {
                        None
                    };
                    return Ok(Some(WalkedObject { id, kind, payload }));
                }
                ObjectKind::Commit => {
                    let record = self.store.open_object(&id)?;
                    let refs = parse_commit(&record.payload, self.walker.format)?;
                    // LIFO stack: parents go in first (reversed), tree last,
                    // so the tree is fully walked before any parent.
                    for parent in refs.parents.iter().rev() {
                        self.stack.push(*parent);
                    }
                    self.stack.push(refs.tree);
                    return Ok(Some(WalkedObject {
                        id,
                        kind,
                        payload: self.include_payload.then_some(record.payload),
                    }));
                }
                ObjectKind::Tree => {
                    if self.walker.trees_seen.contains(&id) {
                        continue;
                    }
                    let record = self.store.open_object(&id)?;
                    self.walker.trees_seen.insert(id);
                    self.walker.trees_yielded += 1;

                    let id_len = self.walker.format.id_len();
                    let mut children = Vec::new();
                    let mut entries = TreeEntryIter::new(&record.payload, id_len);
                    while let Some(entry) = entries.next_entry()? {
                        children.push(entry.id);
                    }
                    for child in children.iter().rev() {
                        self.stack.push(*child);
                    }
                    return Ok(Some(WalkedObject {
                        id,
                        kind,
                        payload: self.include_payload.then_some(record.payload),
                    }));
                }
            }
        }
        Ok(None)
    }
}

impl<S: ObjectStore> Iterator for Walk<'_, S> {
    type Item = Result<WalkedObject, GcError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_object().transpose()
    }
}

//! Pack triage: keep, rewrite, or delete.
//!
//! Classification scans a pack's index against the live set and measures
//! live-data density. `threshold_percent` is the share of a pack that
//! must be garbage to justify rewriting it: a pack is rewritten only when
//! strictly more than that share is dead, so with the default of 10 a
//! pack at exactly 90% live is kept, anything below is rewritten, and a
//! pack with no live data at all is deleted outright. The comparison is
//! integer arithmetic; no float rounding near the boundary.

use crate::store::PackIndex;

use super::live_set::LiveSet;

/// Sweep action for one pack. Exactly one applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackTriage {
    /// Dense enough with live data; leave untouched.
    Keep,
    /// No live objects; remove the pack and index outright.
    Delete,
    /// Copy live objects into a replacement pack, then remove.
    Rewrite,
}

/// Classifies one pack and returns its triage with the measured live count.
///
/// `Delete` implies a live count of zero; `Keep` and `Rewrite` partition
/// the rest by garbage share, with the exact threshold boundary kept.
#[must_use]
pub fn classify(
    index: &impl PackIndex,
    live: &LiveSet,
    threshold_percent: u32,
) -> (PackTriage, u64) {
    let total = index.object_count();
    let mut live_count = 0u64;
    for pos in 0..total {
        if live.contains(&index.id_at(pos)) {
            live_count += 1;
        }
    }

    if live_count == 0 {
        return (PackTriage::Delete, 0);
    }

    let garbage = total - live_count;
    if garbage * 100 > total * u64::from(threshold_percent) {
        (PackTriage::Rewrite, live_count)
    } else {
        (PackTriage::Keep, live_count)
    }
}

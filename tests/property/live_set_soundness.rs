//! Property tests for the live set's one-sided error guarantee.
//!
//! The entire safety argument of sweep rests on "no false negatives":
//! every added id must report present, for any insertion order and any
//! interleaving of adds and queries.

use proptest::prelude::*;
use tempfile::tempdir;

use vault_rs::gc::LiveSet;
use vault_rs::ObjectId;

fn oid_strategy() -> impl Strategy<Value = ObjectId> {
    any::<[u8; 20]>().prop_map(ObjectId::sha1)
}

proptest! {
    #[test]
    fn added_ids_are_never_reported_absent(
        ids in prop::collection::vec(oid_strategy(), 1..256),
        expected in 1u64..4096,
    ) {
        let dir = tempdir().unwrap();
        let mut live = LiveSet::create(dir.path(), expected).unwrap();
        for id in &ids {
            live.add(id);
        }
        for id in &ids {
            prop_assert!(live.contains(id));
        }
    }

    #[test]
    fn membership_holds_under_interleaving(
        ids in prop::collection::vec(oid_strategy(), 2..128),
    ) {
        let dir = tempdir().unwrap();
        let mut live = LiveSet::create(dir.path(), ids.len() as u64).unwrap();
        for (n, id) in ids.iter().enumerate() {
            live.add(id);
            // Everything added so far stays present after each insert.
            for earlier in &ids[..=n] {
                prop_assert!(live.contains(earlier));
            }
        }
    }

    #[test]
    fn undersized_filters_stay_sound(
        ids in prop::collection::vec(oid_strategy(), 1..512),
    ) {
        // Severe overload degrades the false-positive rate, never the
        // no-false-negative guarantee.
        let dir = tempdir().unwrap();
        let mut live = LiveSet::create(dir.path(), 1).unwrap();
        for id in &ids {
            live.add(id);
        }
        for id in &ids {
            prop_assert!(live.contains(id));
        }
        prop_assert!(live.false_positive_rate() <= 1.0);
    }
}

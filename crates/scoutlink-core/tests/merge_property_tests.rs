//! Property-based tests for entry identity and the merge engine.
//!
//! ## Test Categories
//! 1. **Identity stability**: equal key content always derives equal ids
//! 2. **Identity distinctness**: differing key content never collides in practice
//! 3. **Merge accounting**: `kept + added` always equals the result length
//! 4. **Idempotence**: re-merging the same incoming set is a no-op
//! 5. **Dedup**: self-merge collapses every entry

use proptest::prelude::*;
use scoutlink_core::{
    assign_ids, identify, merge, FieldValue, MatchRecord, MergePolicy, NATURAL_KEY_WIDTH,
};

// ─────────────────────────────────────────────────────────────────────────────
// Proptest Strategies
// ─────────────────────────────────────────────────────────────────────────────

/// Strategy for one scalar field. Numbers stay finite so content equality
/// behaves like value equality.
fn field_value() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        any::<bool>().prop_map(FieldValue::Flag),
        (-1.0e6..1.0e6_f64).prop_map(FieldValue::Number),
        "[a-z]{0,8}".prop_map(FieldValue::Text),
    ]
}

/// Strategy for a record with 0 to 6 fields and an optional timestamp.
fn match_record() -> impl Strategy<Value = MatchRecord> {
    (
        prop::collection::vec(field_value(), 0..6),
        prop::option::of(0_u64..10_000_000),
    )
        .prop_map(|(data, recorded_at)| {
            let mut record = MatchRecord::new(data);
            record.recorded_at = recorded_at;
            record
        })
}

/// Strategy for a record set whose derived identities are pairwise distinct.
fn distinct_record_set(max: usize) -> impl Strategy<Value = Vec<MatchRecord>> {
    prop::collection::vec(match_record(), 0..max).prop_map(|records| {
        let mut seen = std::collections::HashSet::new();
        records
            .into_iter()
            .filter(|record| seen.insert(record.identity()))
            .collect()
    })
}

fn merge_policy() -> impl Strategy<Value = MergePolicy> {
    prop_oneof![
        Just(MergePolicy::Smart),
        Just(MergePolicy::KeepExisting),
        Just(MergePolicy::KeepIncoming),
        Just(MergePolicy::KeepBoth),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Property Tests: Identity
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The same content always derives the same id, timestamps ignored.
    #[test]
    fn prop_identity_deterministic(record in match_record(), stamp in 0_u64..u64::MAX) {
        let mut restamped = record.clone();
        restamped.recorded_at = Some(stamp);
        prop_assert_eq!(identify(&record), identify(&restamped));
    }

    /// Fields past the natural key never influence the id.
    #[test]
    fn prop_identity_covers_key_only(
        key in prop::collection::vec(field_value(), NATURAL_KEY_WIDTH),
        extra in prop::collection::vec(field_value(), 0..4),
    ) {
        let trimmed = MatchRecord::new(key.clone());
        let mut data = key;
        data.extend(extra);
        let extended = MatchRecord::new(data);

        prop_assert_eq!(identify(&extended), identify(&trimmed));
    }

    /// Records whose key fields differ get distinct ids.
    #[test]
    fn prop_identity_distinct_for_distinct_keys(a in match_record(), b in match_record()) {
        let key_of = |record: &MatchRecord| -> Vec<FieldValue> {
            record.data.iter().take(NATURAL_KEY_WIDTH).cloned().collect()
        };
        prop_assume!(key_of(&a) != key_of(&b));
        prop_assert_ne!(identify(&a), identify(&b));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Property Tests: Merge
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Accounting invariant and id uniqueness hold for arbitrary inputs.
    #[test]
    fn prop_merge_accounting(
        existing in distinct_record_set(12),
        incoming in prop::collection::vec(match_record(), 0..12),
        policy in merge_policy(),
    ) {
        let result = merge(&existing, &incoming, policy);

        prop_assert_eq!(
            result.stats.kept + result.stats.added,
            result.records.len() as u64,
            "accounting broke under {}", policy
        );

        let mut ids: Vec<_> = result.records.iter().map(|r| r.id.expect("materialized id")).collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), total, "result ids must be unique under {}", policy);
    }

    /// Re-merging an internally deduplicated incoming set changes nothing,
    /// down to the statistics.
    #[test]
    fn prop_merge_idempotent(
        existing in distinct_record_set(10),
        incoming in distinct_record_set(10),
        policy in merge_policy(),
    ) {
        let once = merge(&existing, &incoming, policy);
        let twice = merge(&once.records, &incoming, policy);

        prop_assert_eq!(&once.records, &twice.records, "{}", policy);
        prop_assert_eq!(twice.stats.added, 0, "{}", policy);
        prop_assert_eq!(twice.stats.kept, once.records.len() as u64, "{}", policy);
    }

    /// Even with conflicting duplicates inside the incoming set, re-merging
    /// reproduces the same records.
    #[test]
    fn prop_remerge_records_stable(
        existing in distinct_record_set(10),
        incoming in prop::collection::vec(match_record(), 0..10),
        policy in merge_policy(),
    ) {
        let once = merge(&existing, &incoming, policy);
        let twice = merge(&once.records, &incoming, policy);

        prop_assert_eq!(once.records, twice.records, "{}", policy);
    }

    /// Merging a set with itself yields no additions and one duplicate per
    /// entry, for every policy.
    #[test]
    fn prop_self_merge_collapses(set in distinct_record_set(12), policy in merge_policy()) {
        let result = merge(&set, &set, policy);

        prop_assert_eq!(result.records.len(), set.len());
        prop_assert_eq!(result.stats.added, 0);
        prop_assert_eq!(result.stats.kept, set.len() as u64);
        prop_assert_eq!(result.stats.duplicates, set.len() as u64);
        prop_assert_eq!(result.stats.conflicts, 0);
    }

    /// Assigning ids before merging never changes the outcome.
    #[test]
    fn prop_preassigned_ids_match_derived(
        existing in distinct_record_set(10),
        incoming in prop::collection::vec(match_record(), 0..10),
        policy in merge_policy(),
    ) {
        let mut identified = incoming.clone();
        assign_ids(&mut identified);

        let from_raw = merge(&existing, &incoming, policy);
        let from_identified = merge(&existing, &identified, policy);

        prop_assert_eq!(from_raw.records, from_identified.records);
        prop_assert_eq!(from_raw.stats, from_identified.stats);
    }
}

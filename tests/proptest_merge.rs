//! Property-based tests for last-writer-wins merge.
//!
//! Uses proptest to generate random local and remote read sets and checks that
//! merging converges whatever the order, and that re-applying a download never
//! changes the store again.
//!
//! Run with: `cargo test --test proptest_merge`

use std::collections::BTreeMap;
use std::sync::Arc;
use proptest::prelude::*;

use read_sync_engine::coordinator::{plan_merge, resolve};
use read_sync_engine::{
    DeviceClass, InMemoryLocalStore, InMemoryRemoteStore, InMemoryWatermarkStore, ManualClock,
    MergeDecision, ReadRecord, StaticIdentity, SyncConfig, SyncCoordinator,
};

// =============================================================================
// Strategies for generating test data
// =============================================================================

fn device_class_strategy() -> impl Strategy<Value = DeviceClass> {
    prop_oneof![Just(DeviceClass::Phone), Just(DeviceClass::Box)]
}

/// Few ids and a narrow time range, so collisions and exact ties are common.
fn record_strategy() -> impl Strategy<Value = ReadRecord> {
    ("[a-e]", 0i64..20, device_class_strategy())
        .prop_map(|(id, read_at, class)| ReadRecord::new(id, read_at, class))
}

fn records_strategy() -> impl Strategy<Value = Vec<ReadRecord>> {
    prop::collection::vec(record_strategy(), 0..30)
}

/// Local rows are unique per id.
fn local_strategy() -> impl Strategy<Value = Vec<ReadRecord>> {
    records_strategy().prop_map(|records| {
        let unique: BTreeMap<String, ReadRecord> =
            records.into_iter().map(|r| (r.item_id.clone(), r)).collect();
        unique.into_values().collect()
    })
}

type State = BTreeMap<String, (i64, DeviceClass)>;

fn state_of(records: &[ReadRecord]) -> State {
    records.iter().map(|r| (r.item_id.clone(), (r.read_at, r.device_class))).collect()
}

fn apply(local: &[ReadRecord], remote: &[ReadRecord]) -> Vec<ReadRecord> {
    let (writes, _) = plan_merge(local.to_vec(), remote.to_vec());
    let mut merged: BTreeMap<String, ReadRecord> =
        local.iter().map(|r| (r.item_id.clone(), r.clone())).collect();
    for record in writes {
        merged.insert(record.item_id.clone(), record);
    }
    merged.into_values().collect()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn merge_twice_writes_nothing_the_second_time(
        local in local_strategy(),
        remote in records_strategy(),
    ) {
        let once = apply(&local, &remote);
        let (writes, summary) = plan_merge(once.clone(), remote.clone());

        prop_assert!(writes.is_empty());
        prop_assert_eq!(summary.written(), 0);
        prop_assert_eq!(state_of(&apply(&once, &remote)), state_of(&once));
    }

    #[test]
    fn tie_break_does_not_depend_on_side(
        id in "[a-e]",
        a_at in 0i64..5,
        b_at in 0i64..5,
        a_class in device_class_strategy(),
        b_class in device_class_strategy(),
    ) {
        let a = ReadRecord::new(id.clone(), a_at, a_class);
        let b = ReadRecord::new(id, b_at, b_class);

        let a_local = state_of(&apply(&[a.clone()], &[b.clone()]));
        let b_local = state_of(&apply(&[b], &[a]));

        prop_assert_eq!(a_local, b_local);
    }

    #[test]
    fn winner_has_latest_read_at(
        local in local_strategy(),
        remote in records_strategy(),
    ) {
        let merged = state_of(&apply(&local, &remote));

        for (id, (read_at, class)) in &merged {
            let candidates: Vec<&ReadRecord> = local
                .iter()
                .chain(remote.iter())
                .filter(|r| &r.item_id == id)
                .collect();
            let latest = candidates.iter().map(|r| r.read_at).max().unwrap_or(*read_at);
            prop_assert_eq!(*read_at, latest);

            let phone_at_latest = candidates
                .iter()
                .any(|r| r.read_at == latest && r.device_class == DeviceClass::Phone);
            if phone_at_latest {
                prop_assert_eq!(*class, DeviceClass::Phone);
            }
        }
    }

    #[test]
    fn resolve_only_writes_strictly_better_records(
        local in record_strategy(),
        remote in record_strategy(),
    ) {
        let decision = resolve(Some(&local), &remote);
        let better = remote.read_at > local.read_at
            || (remote.read_at == local.read_at
                && remote.device_class == DeviceClass::Phone
                && local.device_class == DeviceClass::Box);
        prop_assert_eq!(decision == MergeDecision::Overwrite, better);
        prop_assert_ne!(decision, MergeDecision::Insert);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn coordinator_merge_is_idempotent_against_store(
        local in local_strategy(),
        remote in records_strategy(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let clock = Arc::new(ManualClock::new(1_000));
            let identity = Arc::new(StaticIdentity::signed_in("user-1"));
            let store = Arc::new(InMemoryLocalStore::new());
            read_sync_engine::LocalStore::upsert_all(store.as_ref(), &local).await.unwrap();
            let coordinator = SyncCoordinator::new(
                SyncConfig::default(),
                store.clone(),
                Arc::new(InMemoryRemoteStore::new(identity, clock.clone())),
                Arc::new(InMemoryWatermarkStore::new()),
                clock,
            );

            coordinator.merge_with_local(remote.clone()).await.unwrap();
            let after_first = store.snapshot();
            let second = coordinator.merge_with_local(remote).await.unwrap();

            assert_eq!(second.written(), 0);
            assert_eq!(store.snapshot(), after_first);
        });
    }
}

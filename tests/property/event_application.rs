// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Roster Event Application
//!
//! Random command sequences are run through the pure handlers. Whatever the
//! sequence, the minted versions are contiguous, replay reproduces the live
//! state, and the roster projection agrees with the aggregate.

use std::sync::Arc;

use cim_aggregate_store::aggregate::{
    handle_add_member, handle_create_roster, handle_remove_member, handle_rename_roster,
    handle_reorder_members, AddMemberCommand, AggregateRoot, CreateRosterCommand,
    RemoveMemberCommand, RenameRosterCommand, ReorderMembersCommand, RosterState,
};
use cim_aggregate_store::event_store::{EventStore, InMemoryEventStore};
use cim_aggregate_store::events::{Event, EventMetadata, RosterEvent};
use cim_aggregate_store::projection::{
    fold_views, InMemoryProjectionStore, ProjectionRunner, ProjectionStore, RosterProjection,
    RosterView,
};
use cim_aggregate_store::repository::AggregateRepository;
use chrono::{DateTime, Utc};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ============================================================================
// Command Strategies
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Add(u8),
    Remove(usize),
    Rotate(usize),
    Rename(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u8..20).prop_map(Op::Add),
        1 => (0usize..32).prop_map(Op::Remove),
        1 => (1usize..8).prop_map(Op::Rotate),
        1 => (0u8..4).prop_map(Op::Rename),
    ]
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op(), 0..40)
}

fn metadata() -> EventMetadata {
    let at = DateTime::parse_from_rfc3339("2026-01-19T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    EventMetadata::new(at, Uuid::nil())
}

fn roster_id() -> Uuid {
    Uuid::from_u128(0x0193_4f4a_1000_7000_8000_0000_0000_1000)
}

/// Run `ops` against a fresh roster; rejected commands are simply skipped
fn run(ops: &[Op]) -> AggregateRoot<RosterState> {
    let mut root = AggregateRoot::new(roster_id());
    root.execute(metadata(), |s| {
        handle_create_roster(
            s,
            CreateRosterCommand {
                name: "Sunday Net".to_string(),
                callsign: "W1AW".to_string(),
            },
        )
    })
    .unwrap();

    for op in ops {
        let state = root.state().clone();
        let _ = match op {
            Op::Add(n) => root.execute(metadata(), |s| {
                handle_add_member(
                    s,
                    AddMemberCommand {
                        member_id: Uuid::from_u128(u128::from(*n) + 1),
                        callsign: format!("K{n}ABC"),
                        display_name: format!("Operator {n}"),
                    },
                )
            }),
            Op::Remove(i) if !state.members.is_empty() => {
                let member_id = state.members[i % state.members.len()].member_id;
                root.execute(metadata(), |s| {
                    handle_remove_member(s, RemoveMemberCommand { member_id })
                })
            }
            Op::Remove(_) => Ok(0),
            Op::Rotate(k) => {
                let mut order = state.member_order();
                if !order.is_empty() {
                    let by = k % order.len();
                    order.rotate_left(by);
                }
                root.execute(metadata(), |s| {
                    handle_reorder_members(s, ReorderMembersCommand { order })
                })
            }
            Op::Rename(n) => root.execute(metadata(), |s| {
                handle_rename_roster(
                    s,
                    RenameRosterCommand {
                        name: format!("Net {n}"),
                    },
                )
            }),
        };
    }
    root
}

fn committed(root: &mut AggregateRoot<RosterState>) -> Vec<Event<RosterEvent>> {
    root.get_uncommitted_changes()
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// Property: minted versions run 0, 1, 2, ... without gaps
    #[test]
    fn prop_versions_are_contiguous(ops in ops()) {
        let mut root = run(&ops);
        let events = committed(&mut root);

        let versions: Vec<u64> = events.iter().filter_map(|e| e.version).collect();
        let expected: Vec<u64> = (0..events.len() as u64).collect();
        prop_assert_eq!(versions, expected);
        prop_assert_eq!(root.version(), Some(events.len() as u64 - 1));
    }

    /// Property: replaying the history reproduces the live state
    ///
    /// Also holds when the history arrives in reverse order.
    #[test]
    fn prop_replay_matches_live_state(ops in ops()) {
        let mut root = run(&ops);
        let mut history = committed(&mut root);

        let replayed = AggregateRoot::<RosterState>::from_history(roster_id(), history.clone()).unwrap();
        prop_assert_eq!(replayed.state(), root.state());
        prop_assert_eq!(replayed.version(), root.version());

        history.reverse();
        let reversed = AggregateRoot::<RosterState>::from_history(roster_id(), history).unwrap();
        prop_assert_eq!(reversed.state(), root.state());
    }

    /// Property: ranks always run 0..n in member order
    #[test]
    fn prop_ranks_stay_contiguous(ops in ops()) {
        let root = run(&ops);
        prop_assert!(root.state().ranks_are_contiguous());
    }

    /// Property: history split at any point replays to the same state
    ///
    /// fold(fold(empty, h1), h2) = fold(empty, h1 ++ h2)
    #[test]
    fn prop_split_replay_is_associative(ops in ops(), split in 0usize..64) {
        let mut root = run(&ops);
        let history = committed(&mut root);
        let at = split % (history.len() + 1);

        let mut staged = AggregateRoot::<RosterState>::from_history(roster_id(), history[..at].to_vec()).unwrap();
        staged.load(history[at..].to_vec()).unwrap();
        prop_assert_eq!(staged.state(), root.state());
        prop_assert_eq!(staged.version(), root.version());
    }

    /// Property: the projected view lists the aggregate's members in rank order
    #[test]
    fn prop_projection_agrees_with_aggregate(ops in ops()) {
        let mut root = run(&ops);
        let history = committed(&mut root);

        let views = fold_views(&RosterProjection, &history);
        let view = views.get(&roster_id()).unwrap();

        let projected: Vec<Uuid> = view.members.iter().map(|m| m.member_id).collect();
        prop_assert_eq!(projected, root.state().member_order());
        prop_assert_eq!(view.version, root.version());
        prop_assert_eq!(view.name.as_str(), root.state().name.as_ref().unwrap().as_str());
    }

    /// Property: a live runner and a rebuild from the store end up identical
    #[test]
    fn prop_live_projection_equals_rebuild(ops in ops()) {
        tokio_test::block_on(async {
            let cancel = CancellationToken::new();
            let store = Arc::new(InMemoryEventStore::new());
            let repository: AggregateRepository<RosterState, _> =
                AggregateRepository::new(Arc::clone(&store));

            let mut root = run(&ops);
            let history = committed(&mut root);
            repository.save(&mut root, &cancel).await.unwrap();

            let live = ProjectionRunner::new(RosterProjection, Arc::new(InMemoryProjectionStore::<RosterView>::new()));
            for event in &history {
                live.apply(event).await.unwrap();
            }

            let rebuilt = ProjectionRunner::new(RosterProjection, Arc::new(InMemoryProjectionStore::<RosterView>::new()));
            rebuilt.rebuild(store.as_ref(), &cancel).await.unwrap();

            assert_eq!(
                live.store().list().await.unwrap(),
                rebuilt.store().list().await.unwrap()
            );
            assert_eq!(store.last_version(roster_id(), &cancel).await.unwrap(), root.version());
        });
    }
}

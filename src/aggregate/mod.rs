// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event-Sourced Aggregates
//!
//! An aggregate's state is produced only by folding its events through a
//! pure reducer:
//!
//! ```text
//! State' = reduce(State, Event)      (AggregateState::apply)
//! State  = fold(History, Default, reduce)
//! ```
//!
//! The same reducer runs during replay ([`AggregateRoot::load`]) and when new
//! events are applied ([`AggregateRoot::apply`], [`AggregateRoot::execute`]).
//! There is no other code path that mutates state.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized → Hydrating → Live → PersistencePending → Persisted
//!                                          ↑                  │
//!                                          └──────────────────┘
//! ```
//!
//! There is no deleted state; an aggregate can always be rebuilt from its
//! full history.
//!
//! # Versions
//!
//! `version()` is the version of the last event applied *and numbered*.
//! Newly applied events wait in the uncommitted queue unnumbered until
//! [`AggregateRoot::get_uncommitted_changes`] mints `version + 1, version + 2,
//! ...` for them.

pub mod commands;
pub mod handlers;
pub mod roster;

use std::fmt::Debug;
use uuid::Uuid;

use crate::errors::{DomainError, Failures};
use crate::events::{DomainEvent, Event, EventMetadata};
use crate::outcome::Outcome;

pub use commands::*;
pub use handlers::*;
pub use roster::{apply_event, Member, RosterState};

/// Pure reducer over an aggregate's events
pub trait AggregateState: Default + Clone + Debug + Send + Sync + 'static {
    /// Tagged union of this aggregate's events
    type Event: DomainEvent;

    /// Name stored with every record, e.g. "roster"
    const AGGREGATE_TYPE: &'static str;

    /// Reduce one event into a new state
    ///
    /// Must be deterministic. A failure means the event is not valid for the
    /// current state; the caller keeps the old state untouched.
    fn apply(&self, event: &Self::Event) -> Outcome<Self>;
}

/// Where an aggregate instance is in its in-memory lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Fresh instance, no history
    Uninitialized,
    /// Replaying committed history
    ///
    /// Replay folds onto a scratch state inside [`AggregateRoot::load`], so
    /// this phase is never visible from outside; a finished load is `Live`
    /// and a failed one keeps the previous phase.
    Hydrating,
    /// History applied, nothing pending
    Live,
    /// Has uncommitted events
    PersistencePending,
    /// Pending events were saved and cleared
    Persisted,
}

/// Aggregate instance: identity, version, state and the uncommitted queue
#[derive(Debug, Clone)]
pub struct AggregateRoot<S: AggregateState> {
    id: Uuid,
    version: Option<u64>,
    state: S,
    uncommitted: Vec<Event<S::Event>>,
    phase: Lifecycle,
}

impl<S: AggregateState> AggregateRoot<S> {
    /// Create a new aggregate with no history
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            version: None,
            state: S::default(),
            uncommitted: Vec::new(),
            phase: Lifecycle::Uninitialized,
        }
    }

    /// Hydrate an aggregate from committed history
    pub fn from_history(id: Uuid, history: Vec<Event<S::Event>>) -> Outcome<Self> {
        let mut root = Self::new(id);
        root.load(history)?;
        Ok(root)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Version of the last numbered event, `None` if brand new
    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.phase
    }

    pub fn has_changes(&self) -> bool {
        !self.uncommitted.is_empty()
    }

    /// Queued events, without assigning versions
    pub fn pending_changes(&self) -> &[Event<S::Event>] {
        &self.uncommitted
    }

    /// Run the reducer on a candidate event and queue it on success
    ///
    /// On failure nothing changes.
    pub fn apply(&mut self, payload: S::Event, metadata: EventMetadata) -> Outcome<()> {
        let next = self.state.apply(&payload)?;
        self.state = next;
        self.uncommitted
            .push(Event::new(self.id, S::AGGREGATE_TYPE, payload, metadata));
        self.phase = Lifecycle::PersistencePending;
        Ok(())
    }

    /// Run a command handler and apply every event it produces
    ///
    /// The events are reduced on a scratch copy of the state; if any of them
    /// is rejected the aggregate is left exactly as it was.
    pub fn execute<F>(&mut self, metadata: EventMetadata, handler: F) -> Outcome<usize>
    where
        F: FnOnce(&S) -> Outcome<Vec<S::Event>>,
    {
        let payloads = handler(&self.state)?;
        let mut scratch = self.state.clone();
        for payload in &payloads {
            scratch = scratch.apply(payload)?;
        }

        let produced = payloads.len();
        if produced > 0 {
            self.state = scratch;
            self.uncommitted.extend(
                payloads
                    .into_iter()
                    .map(|payload| Event::new(self.id, S::AGGREGATE_TYPE, payload, metadata)),
            );
            self.phase = Lifecycle::PersistencePending;
        }
        Ok(produced)
    }

    /// Replay committed history
    ///
    /// Events are sorted by version first. Every event must belong to this
    /// aggregate, carry a version, and continue the sequence without gaps.
    /// Replayed events are never queued as uncommitted. A history that does
    /// not replay cleanly is reported as corruption and leaves the aggregate
    /// untouched.
    pub fn load(&mut self, mut history: Vec<Event<S::Event>>) -> Outcome<()> {
        if self.has_changes() {
            return Err(DomainError::validation(format!(
                "cannot load history into {} while {} changes are pending",
                self.id,
                self.uncommitted.len()
            ))
            .into());
        }

        history.sort_by_key(|e| e.version);

        let (state, version) = self.replay(&history)?;
        self.state = state;
        self.version = version;
        if version.is_some() {
            self.phase = Lifecycle::Live;
        }
        Ok(())
    }

    fn replay(&self, history: &[Event<S::Event>]) -> Outcome<(S, Option<u64>)> {
        let mut state = self.state.clone();
        let mut version = self.version;

        for event in history {
            if event.aggregate_id != self.id {
                return Err(DomainError::corruption(format!(
                    "event {} belongs to aggregate {}, not {}",
                    event.event_id, event.aggregate_id, self.id
                ))
                .into());
            }

            let expected = version.map_or(0, |v| v + 1);
            match event.version {
                Some(v) if v == expected => {}
                Some(v) => {
                    return Err(DomainError::corruption(format!(
                        "history of {} jumps from {:?} to {}",
                        self.id, version, v
                    ))
                    .into());
                }
                None => {
                    return Err(DomainError::corruption(format!(
                        "event {} in history of {} has no version",
                        event.event_id, self.id
                    ))
                    .into());
                }
            }

            state = state.apply(&event.payload).map_err(|errors| {
                as_corruption(errors, self.id, expected)
            })?;
            version = Some(expected);
        }

        Ok((state, version))
    }

    /// Number queued events and return them
    ///
    /// This is the only place versions are minted. Events already numbered by
    /// an earlier call keep their versions, so a retry after a failed save
    /// sees the same numbering.
    pub fn get_uncommitted_changes(&mut self) -> Vec<Event<S::Event>> {
        for event in self.uncommitted.iter_mut().filter(|e| e.version.is_none()) {
            let next = self.version.map_or(0, |v| v + 1);
            event.version = Some(next);
            self.version = Some(next);
        }
        self.uncommitted.clone()
    }

    /// Drop the queue after a successful save
    pub fn clear_changes(&mut self) {
        self.uncommitted.clear();
        self.phase = Lifecycle::Persisted;
    }
}

fn as_corruption(errors: Failures, id: Uuid, version: u64) -> Failures {
    errors.map(|e| {
        DomainError::corruption(format!(
            "stored event {version} of {id} does not replay: {e}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type")]
    enum CounterEvent {
        Added { amount: i64 },
        Subtracted { amount: i64 },
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Added { .. } => "Added",
                CounterEvent::Subtracted { .. } => "Subtracted",
            }
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Counter {
        total: i64,
    }

    impl AggregateState for Counter {
        type Event = CounterEvent;
        const AGGREGATE_TYPE: &'static str = "counter";

        fn apply(&self, event: &CounterEvent) -> Outcome<Self> {
            match event {
                CounterEvent::Added { amount } => Ok(Counter {
                    total: self.total + amount,
                }),
                CounterEvent::Subtracted { amount } if *amount > self.total => Err(
                    DomainError::validation(format!("cannot subtract {amount} from {}", self.total))
                        .into(),
                ),
                CounterEvent::Subtracted { amount } => Ok(Counter {
                    total: self.total - amount,
                }),
            }
        }
    }

    fn meta() -> EventMetadata {
        let ts = DateTime::parse_from_rfc3339("2026-01-19T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        EventMetadata::new(ts, Uuid::nil())
    }

    fn committed(id: Uuid, version: u64, payload: CounterEvent) -> Event<CounterEvent> {
        let mut event = Event::new(id, "counter", payload, meta());
        event.version = Some(version);
        event
    }

    #[test]
    fn test_new_root_is_uninitialized() {
        let root = AggregateRoot::<Counter>::new(Uuid::now_v7());
        assert_eq!(root.version(), None);
        assert_eq!(root.lifecycle(), Lifecycle::Uninitialized);
        assert!(!root.has_changes());
    }

    #[test]
    fn test_apply_queues_without_version() {
        let mut root = AggregateRoot::<Counter>::new(Uuid::now_v7());
        root.apply(CounterEvent::Added { amount: 5 }, meta()).unwrap();

        assert_eq!(root.state().total, 5);
        assert_eq!(root.version(), None);
        assert_eq!(root.pending_changes().len(), 1);
        assert_eq!(root.pending_changes()[0].version, None);
        assert_eq!(root.lifecycle(), Lifecycle::PersistencePending);
    }

    #[test]
    fn test_rejected_apply_does_not_mutate() {
        let mut root = AggregateRoot::<Counter>::new(Uuid::now_v7());
        root.apply(CounterEvent::Added { amount: 1 }, meta()).unwrap();

        let result = root.apply(CounterEvent::Subtracted { amount: 10 }, meta());
        assert!(result.is_err());
        assert_eq!(root.state().total, 1);
        assert_eq!(root.pending_changes().len(), 1);
    }

    #[test]
    fn test_execute_is_all_or_nothing() {
        let mut root = AggregateRoot::<Counter>::new(Uuid::now_v7());
        let result = root.execute(meta(), |_| {
            Ok(vec![
                CounterEvent::Added { amount: 2 },
                CounterEvent::Subtracted { amount: 5 },
            ])
        });

        assert!(result.is_err());
        assert_eq!(root.state().total, 0);
        assert!(!root.has_changes());
        assert_eq!(root.lifecycle(), Lifecycle::Uninitialized);
    }

    #[test]
    fn test_get_uncommitted_changes_mints_sequential_versions() {
        let id = Uuid::now_v7();
        let mut root =
            AggregateRoot::<Counter>::from_history(id, vec![committed(id, 0, CounterEvent::Added { amount: 1 })])
                .unwrap();

        for amount in 1..=3 {
            root.apply(CounterEvent::Added { amount }, meta()).unwrap();
        }

        let changes = root.get_uncommitted_changes();
        let versions: Vec<_> = changes.iter().map(|e| e.version).collect();
        assert_eq!(versions, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(root.version(), Some(3));

        // A second call (e.g. after a failed save) keeps the numbering
        let again = root.get_uncommitted_changes();
        assert_eq!(again, changes);
        assert_eq!(root.version(), Some(3));

        root.clear_changes();
        assert!(!root.has_changes());
        assert_eq!(root.lifecycle(), Lifecycle::Persisted);
    }

    #[test]
    fn test_load_sorts_out_of_order_history() {
        let id = Uuid::now_v7();
        let history = vec![
            committed(id, 2, CounterEvent::Subtracted { amount: 4 }),
            committed(id, 0, CounterEvent::Added { amount: 10 }),
            committed(id, 1, CounterEvent::Added { amount: 1 }),
        ];

        let root = AggregateRoot::<Counter>::from_history(id, history).unwrap();
        assert_eq!(root.state().total, 7);
        assert_eq!(root.version(), Some(2));
        assert_eq!(root.lifecycle(), Lifecycle::Live);
        assert!(!root.has_changes());
    }

    #[test]
    fn test_load_rejects_gaps_and_foreign_events() {
        let id = Uuid::now_v7();
        let gap = vec![
            committed(id, 0, CounterEvent::Added { amount: 1 }),
            committed(id, 2, CounterEvent::Added { amount: 1 }),
        ];
        let err = AggregateRoot::<Counter>::from_history(id, gap).unwrap_err();
        assert!(matches!(err.first(), DomainError::Corruption(_)));

        let foreign = vec![committed(Uuid::now_v7(), 0, CounterEvent::Added { amount: 1 })];
        let err = AggregateRoot::<Counter>::from_history(id, foreign).unwrap_err();
        assert!(matches!(err.first(), DomainError::Corruption(_)));
    }

    #[test]
    fn test_load_reports_unreplayable_event_as_corruption() {
        let id = Uuid::now_v7();
        let history = vec![committed(id, 0, CounterEvent::Subtracted { amount: 1 })];

        let mut root = AggregateRoot::<Counter>::new(id);
        let err = root.load(history).unwrap_err();
        assert!(matches!(err.first(), DomainError::Corruption(_)));
        assert_eq!(root.version(), None);
        assert_eq!(root.lifecycle(), Lifecycle::Uninitialized);
    }

    #[test]
    fn test_follow_up_load_settles_on_live() {
        let id = Uuid::now_v7();
        let mut root = AggregateRoot::<Counter>::from_history(
            id,
            vec![committed(id, 0, CounterEvent::Added { amount: 2 })],
        )
        .unwrap();

        let err = root
            .load(vec![committed(id, 3, CounterEvent::Added { amount: 1 })])
            .unwrap_err();
        assert!(matches!(err.first(), DomainError::Corruption(_)));
        assert_eq!(root.lifecycle(), Lifecycle::Live);
        assert_eq!(root.version(), Some(0));

        root.load(vec![committed(id, 1, CounterEvent::Added { amount: 1 })])
            .unwrap();
        assert_eq!(root.lifecycle(), Lifecycle::Live);
        assert_eq!(root.version(), Some(1));
    }

    #[test]
    fn test_load_refuses_when_changes_pending() {
        let id = Uuid::now_v7();
        let mut root = AggregateRoot::<Counter>::new(id);
        root.apply(CounterEvent::Added { amount: 1 }, meta()).unwrap();

        let err = root
            .load(vec![committed(id, 0, CounterEvent::Added { amount: 1 })])
            .unwrap_err();
        assert!(matches!(err.first(), DomainError::Validation(_)));
    }

    #[test]
    fn test_replay_twice_is_identical() {
        let id = Uuid::now_v7();
        let history = vec![
            committed(id, 0, CounterEvent::Added { amount: 3 }),
            committed(id, 1, CounterEvent::Subtracted { amount: 2 }),
        ];
        let first = AggregateRoot::<Counter>::from_history(id, history.clone()).unwrap();
        let second = AggregateRoot::<Counter>::from_history(id, history).unwrap();
        assert_eq!(first.state(), second.state());
        assert_eq!(first.version(), second.version());
    }
}

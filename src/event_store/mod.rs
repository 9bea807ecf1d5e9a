// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event Store Abstraction
//!
//! Append-only persistence for committed events, keyed by aggregate identity
//! and version. The store is the single source of truth; every read model is
//! a disposable derivative of it.
//!
//! # Architecture
//!
//! ```text
//! Command → Aggregate → Events → EventStore → Persistent Storage
//!                                    ↓
//!                              Dispatch → Projections
//! ```
//!
//! # Event Store Requirements
//!
//! 1. **Append-Only**: Records are never updated or deleted
//! 2. **Contiguous**: Versions per aggregate run `0, 1, 2, ...`
//! 3. **Optimistic Concurrency**: `(aggregate_id, version)` is unique; an
//!    append whose first version is not `last + 1` is a conflict
//! 4. **Atomic per aggregate**: a batch's events for one aggregate are stored
//!    all together or not at all, even when the operation is cancelled
//! 5. **Loud corruption**: unreadable payloads surface as errors
//!
//! # Example
//!
//! ```rust
//! use cim_aggregate_store::event_store::{EventStore, InMemoryEventStore};
//! use tokio_util::sync::CancellationToken;
//! use uuid::Uuid;
//!
//! # tokio_test::block_on(async {
//! let store = InMemoryEventStore::new();
//! let cancel = CancellationToken::new();
//! let events = store.read(Uuid::now_v7(), 0, &cancel).await.unwrap();
//! assert!(events.is_empty());
//! # });
//! ```

pub mod memory;
pub mod nats;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::errors::DomainError;
use crate::events::{DomainEvent, Event};

pub use memory::InMemoryEventStore;
pub use nats::NatsEventStore;

/// Result type for store operations
pub type StoreResult<T> = Result<T, DomainError>;

/// Event ready to be written, with its version already assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub version: u64,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub occurred_on: DateTime<Utc>,
    pub correlation_id: Uuid,
    pub causation_id: Option<Uuid>,
}

impl NewRecord {
    /// Encode a numbered event
    pub fn from_event<E: DomainEvent>(event: &Event<E>) -> StoreResult<Self> {
        let version = event.version.ok_or_else(|| {
            DomainError::validation(format!(
                "event {} of {} has no version assigned",
                event.event_id, event.aggregate_id
            ))
        })?;

        Ok(Self {
            event_id: event.event_id,
            aggregate_id: event.aggregate_id,
            aggregate_type: event.aggregate_type.clone(),
            version,
            event_type: event.event_type().to_string(),
            payload: serde_json::to_value(&event.payload)?,
            occurred_on: event.occurred_on,
            correlation_id: event.correlation_id,
            causation_id: event.causation_id,
        })
    }

    /// Stamp the record with its storage time
    pub fn into_stored(self, stored_at: DateTime<Utc>) -> StoredRecord {
        StoredRecord {
            record_id: self.event_id,
            aggregate_id: self.aggregate_id,
            aggregate_type: self.aggregate_type,
            version: self.version,
            event_type: self.event_type,
            payload: self.payload,
            occurred_on: self.occurred_on,
            stored_at,
            correlation_id: self.correlation_id,
            causation_id: self.causation_id,
        }
    }
}

/// Persisted record layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Unique record identifier (the event id)
    pub record_id: Uuid,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub version: u64,
    /// Discriminator of the serialized payload
    pub event_type: String,
    pub payload: serde_json::Value,
    pub occurred_on: DateTime<Utc>,
    pub stored_at: DateTime<Utc>,
    pub correlation_id: Uuid,
    pub causation_id: Option<Uuid>,
}

impl StoredRecord {
    /// Decode back into a typed event
    ///
    /// A payload that does not match `E` is corruption, never skipped.
    pub fn decode<E: DomainEvent>(&self) -> StoreResult<Event<E>> {
        let payload: E = serde_json::from_value(self.payload.clone()).map_err(|e| {
            DomainError::corruption(format!(
                "record {} (version {} of {}, type {}) is unreadable: {e}",
                self.record_id, self.version, self.aggregate_id, self.event_type
            ))
        })?;

        if payload.event_type() != self.event_type {
            return Err(DomainError::corruption(format!(
                "record {} claims type {} but holds {}",
                self.record_id,
                self.event_type,
                payload.event_type()
            )));
        }

        Ok(Event {
            event_id: self.record_id,
            aggregate_id: self.aggregate_id,
            aggregate_type: self.aggregate_type.clone(),
            version: Some(self.version),
            occurred_on: self.occurred_on,
            correlation_id: self.correlation_id,
            causation_id: self.causation_id,
            payload,
        })
    }
}

/// Event Store trait for persisting and retrieving committed events
///
/// Every operation takes a cancellation token. Cancelling never leaves a
/// partially written sequence for an aggregate.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append a batch of records, possibly for several aggregates
    ///
    /// For each aggregate in the batch the versions must be contiguous and the
    /// first one must be exactly one past the last stored version (`0` for a
    /// new stream).
    ///
    /// # Errors
    ///
    /// - `ConcurrencyConflict` if another writer got there first
    /// - `Validation` if the batch itself has gaps or repeats
    /// - `Persistence` if storage is unreachable or the call was cancelled
    async fn append(
        &self,
        records: Vec<NewRecord>,
        cancel: &CancellationToken,
    ) -> StoreResult<Vec<StoredRecord>>;

    /// Records of one aggregate with `version >= from_version`, ascending
    async fn read(
        &self,
        aggregate_id: Uuid,
        from_version: u64,
        cancel: &CancellationToken,
    ) -> StoreResult<Vec<StoredRecord>>;

    /// The full log, sorted by storage time then version
    ///
    /// Expensive; meant for rebuilds, not for integrity checks.
    async fn read_all(&self, cancel: &CancellationToken) -> StoreResult<Vec<StoredRecord>>;

    /// Highest stored version of an aggregate, `None` if it has no events
    async fn last_version(
        &self,
        aggregate_id: Uuid,
        cancel: &CancellationToken,
    ) -> StoreResult<Option<u64>>;
}

/// Records of one aggregate within a batch
#[derive(Debug)]
pub(crate) struct AggregateBatch {
    pub aggregate_id: Uuid,
    pub records: Vec<NewRecord>,
}

impl AggregateBatch {
    pub fn first_version(&self) -> u64 {
        self.records.first().map_or(0, |r| r.version)
    }

    /// Check the batch continues the stored sequence
    pub fn check_head(&self, last_stored: Option<u64>) -> StoreResult<()> {
        let expected = last_stored.map_or(0, |v| v + 1);
        let first = self.first_version();
        if first != expected {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: self.aggregate_id,
                expected: first,
                actual: last_stored,
            });
        }
        Ok(())
    }
}

/// Split a batch by aggregate, keeping first-appearance order
///
/// Versions inside each group must be strictly contiguous.
pub(crate) fn group_by_aggregate(records: Vec<NewRecord>) -> StoreResult<Vec<AggregateBatch>> {
    let mut groups: Vec<AggregateBatch> = Vec::new();

    for record in records {
        match groups
            .iter_mut()
            .find(|g| g.aggregate_id == record.aggregate_id)
        {
            Some(group) => {
                let previous = group.records.last().map(|r| r.version);
                if previous.map(|v| v + 1) != Some(record.version) {
                    return Err(DomainError::validation(format!(
                        "batch for {} is not contiguous: {:?} followed by {}",
                        record.aggregate_id, previous, record.version
                    )));
                }
                group.records.push(record);
            }
            None => groups.push(AggregateBatch {
                aggregate_id: record.aggregate_id,
                records: vec![record],
            }),
        }
    }

    Ok(groups)
}

/// Sort key for the full log
pub(crate) fn sort_log(records: &mut [StoredRecord]) {
    records.sort_by(|a, b| {
        a.stored_at
            .cmp(&b.stored_at)
            .then(a.version.cmp(&b.version))
            .then(a.aggregate_id.cmp(&b.aggregate_id))
    });
}

/// Error returned when a token fires mid-operation
pub(crate) fn cancelled() -> DomainError {
    DomainError::persistence("operation cancelled")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RosterName;
    use crate::events::{EventMetadata, RosterEvent};
    use serde_json::json;

    fn record(aggregate_id: Uuid, version: u64) -> NewRecord {
        NewRecord {
            event_id: Uuid::now_v7(),
            aggregate_id,
            aggregate_type: "roster".to_string(),
            version,
            event_type: "RosterRenamed".to_string(),
            payload: json!({ "type": "RosterRenamed", "name": "Net" }),
            occurred_on: Utc::now(),
            correlation_id: Uuid::nil(),
            causation_id: None,
        }
    }

    #[test]
    fn test_grouping_keeps_order_and_checks_contiguity() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let groups =
            group_by_aggregate(vec![record(a, 3), record(b, 0), record(a, 4)]).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].aggregate_id, a);
        assert_eq!(groups[0].records.len(), 2);
        assert_eq!(groups[1].first_version(), 0);

        let gap = group_by_aggregate(vec![record(a, 0), record(a, 2)]);
        assert!(matches!(gap, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_check_head() {
        let a = Uuid::now_v7();
        let groups = group_by_aggregate(vec![record(a, 0)]).unwrap();
        assert!(groups[0].check_head(None).is_ok());
        assert!(matches!(
            groups[0].check_head(Some(0)),
            Err(DomainError::ConcurrencyConflict { expected: 0, actual: Some(0), .. })
        ));
    }

    #[test]
    fn test_encode_requires_version() {
        let event = Event::new(
            Uuid::now_v7(),
            "roster",
            RosterEvent::RosterRenamed {
                name: RosterName::new("Net").unwrap(),
            },
            EventMetadata::new(Utc::now(), Uuid::nil()),
        );
        assert!(matches!(
            NewRecord::from_event(&event),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_decode_roundtrip_and_corruption() {
        let id = Uuid::now_v7();
        let stored = record(id, 0).into_stored(Utc::now());
        let event: Event<RosterEvent> = stored.decode().unwrap();
        assert_eq!(event.version, Some(0));
        assert_eq!(event.event_type(), "RosterRenamed");

        let mut broken = stored.clone();
        broken.payload = json!({ "type": "RosterRenamed" });
        assert!(matches!(
            broken.decode::<RosterEvent>(),
            Err(DomainError::Corruption(_))
        ));

        let mut mislabeled = stored;
        mislabeled.event_type = "MemberAdded".to_string();
        assert!(matches!(
            mislabeled.decode::<RosterEvent>(),
            Err(DomainError::Corruption(_))
        ));
    }
}

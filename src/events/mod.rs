// Copyright (c) 2025 - Cowboy AI, Inc.
//! Domain Events
//!
//! Events are immutable facts describing one state change of one aggregate.
//! They are never mutated or deleted; corrections are new events.
//!
//! # Envelope
//!
//! Every payload travels inside an [`Event`] envelope carrying the owning
//! aggregate, its version in that aggregate's stream, and tracing metadata:
//!
//! ```text
//! Event
//!   event_id        evt-2 (UUID v7)
//!   aggregate_id    roster-1
//!   version         Some(1)   (None until commit)
//!   correlation_id  req-123
//!   causation_id    evt-1
//!   payload         RosterEvent::MemberAdded { .. }
//! ```
//!
//! # Versions
//!
//! `version` is `None` while the event sits in an aggregate's uncommitted
//! queue. It is assigned exactly once, by
//! [`AggregateRoot::get_uncommitted_changes`](crate::aggregate::AggregateRoot::get_uncommitted_changes),
//! and committed versions per aggregate run `0, 1, 2, ...` without gaps.

pub mod roster;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use uuid::Uuid;

pub use roster::RosterEvent;

/// A payload type that can be stored in the event log
///
/// Implemented by the tagged enum of each aggregate type. The reducer matches
/// on the variants exhaustively.
pub trait DomainEvent:
    Serialize + DeserializeOwned + Clone + Debug + PartialEq + Send + Sync + 'static
{
    /// Discriminator stored alongside the payload
    fn event_type(&self) -> &'static str;
}

/// Correlation and causation tracking for a produced event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMetadata {
    /// When the fact occurred (passed in, never read from the clock here)
    pub occurred_on: DateTime<Utc>,

    /// Groups related events across aggregates
    pub correlation_id: Uuid,

    /// Direct parent event that caused this event
    pub causation_id: Option<Uuid>,
}

impl EventMetadata {
    pub fn new(occurred_on: DateTime<Utc>, correlation_id: Uuid) -> Self {
        Self {
            occurred_on,
            correlation_id,
            causation_id: None,
        }
    }

    /// Mark the event as caused by another one
    pub fn caused_by(mut self, causation_id: Uuid) -> Self {
        self.causation_id = Some(causation_id);
        self
    }
}

/// Event envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<E> {
    /// Unique event ID (UUID v7 for time ordering)
    pub event_id: Uuid,

    /// Aggregate this event belongs to
    pub aggregate_id: Uuid,

    /// Aggregate type name, e.g. "roster"
    pub aggregate_type: String,

    /// Position in the aggregate stream; `None` until commit
    pub version: Option<u64>,

    pub occurred_on: DateTime<Utc>,
    pub correlation_id: Uuid,
    pub causation_id: Option<Uuid>,

    /// The domain fact
    pub payload: E,
}

impl<E: DomainEvent> Event<E> {
    /// Wrap a payload in an unversioned envelope
    pub fn new(
        aggregate_id: Uuid,
        aggregate_type: impl Into<String>,
        payload: E,
        metadata: EventMetadata,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            version: None,
            occurred_on: metadata.occurred_on,
            correlation_id: metadata.correlation_id,
            causation_id: metadata.causation_id,
            payload,
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }

    pub fn is_committed(&self) -> bool {
        self.version.is_some()
    }

    /// Metadata for an event caused by this one
    pub fn follow_up(&self, occurred_on: DateTime<Utc>) -> EventMetadata {
        EventMetadata::new(occurred_on, self.correlation_id).caused_by(self.event_id)
    }
}

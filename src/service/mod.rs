// Copyright (c) 2025 - Cowboy AI, Inc.
//! Service Layer for Roster Management
//!
//! This module provides the application service layer that orchestrates
//! domain logic, event sourcing, and the uniqueness index.
//!
//! # Architecture
//!
//! ```text
//! Client Request
//!     ↓
//! Service Layer (this module)
//!     ↓
//! Command Handler → Aggregate → Event
//!     ↓
//! Repository → Event Store
//!     ↓
//! Dispatcher (fire and forget)
//!     ↓
//! Projections, Notifiers
//! ```
//!
//! # Design Principles
//!
//! 1. **Transaction Boundaries**: one command, one save
//! 2. **Command/Query Separation**: writes go through the repository, reads
//!    through projections
//! 3. **Pure Domain Logic**: services call pure handlers
//! 4. **Explicit Time**: the clock is injected
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use cim_aggregate_store::aggregate::CreateRosterCommand;
//! use cim_aggregate_store::event_store::InMemoryEventStore;
//! use cim_aggregate_store::repository::AggregateRepository;
//! use cim_aggregate_store::service::{RosterService, SystemClock};
//! use cim_aggregate_store::uniqueness::UniquenessIndex;
//! use tokio_util::sync::CancellationToken;
//! use uuid::Uuid;
//!
//! # tokio_test::block_on(async {
//! let repository = AggregateRepository::new(Arc::new(InMemoryEventStore::new()));
//! let service = RosterService::new(
//!     repository,
//!     Arc::new(UniquenessIndex::new()),
//!     Arc::new(SystemClock),
//! );
//!
//! let cancel = CancellationToken::new();
//! let command = CreateRosterCommand { name: "Sunday Net".into(), callsign: "W1AW".into() };
//! let id = service.create_roster(command, Uuid::now_v7(), &cancel).await.unwrap();
//! let roster = service.get_roster(id, &cancel).await.unwrap();
//! assert_eq!(roster.name.unwrap().as_str(), "Sunday Net");
//! # });
//! ```

pub mod roster;

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

pub use roster::{RosterService, ROSTER_CALLSIGNS, ROSTER_NAMES};

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Aggregate Persistence for the Composable Information Machine
//!
//! Event-sourced aggregates with an append-only event store, optimistic
//! concurrency, an asynchronous dispatch queue and rebuildable read models.
//!
//! ## Architecture
//!
//! ```text
//! Command ──► Handler (pure) ──► AggregateRoot ──► Repository::save
//!                                                       │
//!                                  EventStore::append ◄─┘
//!                                  (memory | JetStream)
//!                                                       │
//!                                  Dispatcher::publish ◄┘
//!                                        │
//!                          ┌─────────────┴─────────────┐
//!                   ProjectionRunner              NatsNotifier
//!                          │
//!                   ProjectionStore ──► RosterDirectory (queries)
//! ```
//!
//! 1. **Event Sourcing**: aggregate state is a fold over its events
//! 2. **Optimistic Concurrency**: the store rejects stale writers with a
//!    retryable `ConcurrencyConflict`
//! 3. **Accumulated Validation**: independent input checks are reported
//!    together in one [`Failures`] list
//! 4. **Disposable Read Models**: projections can always be rebuilt from the log
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use cim_aggregate_store::aggregate::{handle_create_roster, AggregateRoot, CreateRosterCommand, RosterState};
//! use cim_aggregate_store::event_store::InMemoryEventStore;
//! use cim_aggregate_store::events::EventMetadata;
//! use cim_aggregate_store::repository::AggregateRepository;
//! use tokio_util::sync::CancellationToken;
//! use uuid::Uuid;
//!
//! # tokio_test::block_on(async {
//! let repository = AggregateRepository::new(Arc::new(InMemoryEventStore::new()));
//! let cancel = CancellationToken::new();
//!
//! let id = Uuid::now_v7();
//! let mut roster = AggregateRoot::<RosterState>::new(id);
//! let command = CreateRosterCommand { name: "Sunday Net".into(), callsign: "W1AW".into() };
//! roster
//!     .execute(EventMetadata::new(chrono::Utc::now(), Uuid::now_v7()), |state| {
//!         handle_create_roster(state, command)
//!     })
//!     .unwrap();
//!
//! assert_eq!(repository.save(&mut roster, &cancel).await.unwrap(), 1);
//!
//! let loaded = repository.load(id, &cancel).await.unwrap();
//! assert_eq!(loaded.version(), Some(0));
//! # });
//! ```

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod event_store;
pub mod events;
pub mod jetstream;
pub mod nats;
pub mod outcome;
pub mod projection;
pub mod repository;
pub mod service;
pub mod uniqueness;

// Re-export commonly used types
pub use aggregate::{AggregateRoot, AggregateState, Lifecycle, RosterState};
pub use config::StoreConfig;
pub use dispatch::{Dispatcher, EventConsumer, SubscriptionHandle};
pub use errors::{ConfigError, DomainError, Failures};
pub use event_store::{EventStore, InMemoryEventStore, NatsEventStore, NewRecord, StoredRecord};
pub use events::{DomainEvent, Event, EventMetadata, RosterEvent};
pub use nats::{NatsClient, NatsConfig};
pub use outcome::{Outcome, Validation};
pub use projection::{Projection, ProjectionRunner, ProjectionStore, ProjectionUpdate};
pub use repository::AggregateRepository;
pub use service::RosterService;
pub use uniqueness::UniquenessIndex;

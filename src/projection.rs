// Copyright (c) 2025 - Cowboy AI, Inc.

//! Projections - Read Models Folded From the Event Log
//!
//! A projection maps each committed event onto an update of a keyed view:
//!
//! ```text
//! EventStream ────fold─────> ProjectionStore
//!    │                            │
//!    │ Events                     │ Updates
//!    ▼                            ▼
//! [e1, e2, e3]  ──>  [Upsert, Ignore, Delete]
//! ```
//!
//! ## Properties
//!
//! 1. **Identity**: an empty event stream produces no changes
//! 2. **Composition**: folding events one at a time through the live runner
//!    and folding the whole log at once in [`ProjectionRunner::rebuild`]
//!    produce the same views
//!
//! Views are disposable. A store is written only by its [`ProjectionRunner`];
//! command handlers never touch it. Since delivery to the runner is
//! at-most-once, the store is eventually consistent with the log, and
//! `rebuild` is the way back to exact agreement.

pub mod memory;
pub mod pure;
pub mod roster;

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::dispatch::EventConsumer;
use crate::errors::DomainError;
use crate::event_store::{EventStore, StoredRecord};
use crate::events::{DomainEvent, Event};

pub use memory::InMemoryProjectionStore;
pub use pure::fold_views;
pub use roster::{MemberView, RosterDirectory, RosterProjection, RosterView};

/// What a projection wants done with the view of one aggregate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionUpdate<V> {
    /// Store this view, replacing any previous one
    Upsert(V),
    /// Drop the view
    Delete,
    /// Leave the view as it is
    Ignore,
}

/// Pure event-to-view folding function for one aggregate type
pub trait Projection: Send + Sync + 'static {
    type Event: DomainEvent;
    type View: Clone + Debug + Send + Sync + 'static;

    /// Name of this projection
    fn name(&self) -> &str;

    /// Aggregate type whose events this projection reads
    fn aggregate_type(&self) -> &str;

    /// Compute the update for `event` given the aggregate's current view
    fn fold(
        &self,
        current: Option<&Self::View>,
        event: &Event<Self::Event>,
    ) -> ProjectionUpdate<Self::View>;
}

/// Keyed storage for the views of one projection
#[async_trait]
pub trait ProjectionStore<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, id: Uuid) -> Result<Option<V>, DomainError>;

    /// Every view, ordered by aggregate id
    async fn list(&self) -> Result<Vec<V>, DomainError>;

    async fn upsert(&self, id: Uuid, view: V) -> Result<(), DomainError>;

    /// Remove a view; returns whether one existed
    async fn delete(&self, id: Uuid) -> Result<bool, DomainError>;

    /// Drop every view ahead of a rebuild
    async fn reset_all(&self) -> Result<(), DomainError>;

    /// Views matching a predicate
    async fn find(
        &self,
        predicate: &(dyn for<'a> Fn(&'a V) -> bool + Send + Sync),
    ) -> Result<Vec<V>, DomainError>;
}

/// Sole writer of a projection store
pub struct ProjectionRunner<P, PS>
where
    P: Projection,
    PS: ProjectionStore<P::View> + ?Sized,
{
    projection: P,
    store: Arc<PS>,
}

impl<P, PS> ProjectionRunner<P, PS>
where
    P: Projection,
    PS: ProjectionStore<P::View> + ?Sized,
{
    pub fn new(projection: P, store: Arc<PS>) -> Self {
        Self { projection, store }
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    /// Read handle on the views
    pub fn store(&self) -> Arc<PS> {
        Arc::clone(&self.store)
    }

    /// Fold one typed event into the store
    pub async fn apply(&self, event: &Event<P::Event>) -> Result<(), DomainError> {
        let current = self.store.get(event.aggregate_id).await?;
        match self.projection.fold(current.as_ref(), event) {
            ProjectionUpdate::Upsert(view) => self.store.upsert(event.aggregate_id, view).await,
            ProjectionUpdate::Delete => self.store.delete(event.aggregate_id).await.map(|_| ()),
            ProjectionUpdate::Ignore => Ok(()),
        }
    }

    /// Fold one committed record; records of other aggregate types are skipped
    pub async fn apply_record(&self, record: &StoredRecord) -> Result<(), DomainError> {
        if record.aggregate_type != self.projection.aggregate_type() {
            return Ok(());
        }
        let event = record.decode::<P::Event>()?;
        self.apply(&event).await
    }

    /// Drop every view and fold the whole log again
    ///
    /// The log is read and decoded before anything is reset, so a corrupt
    /// record leaves the current views in place. Returns the number of views
    /// written.
    #[instrument(skip_all, fields(projection = self.projection.name()))]
    pub async fn rebuild<St>(
        &self,
        event_store: &St,
        cancel: &CancellationToken,
    ) -> Result<usize, DomainError>
    where
        St: EventStore + ?Sized,
    {
        let records = event_store.read_all(cancel).await?;
        let events = records
            .iter()
            .filter(|r| r.aggregate_type == self.projection.aggregate_type())
            .map(StoredRecord::decode::<P::Event>)
            .collect::<Result<Vec<_>, _>>()?;

        let views: BTreeMap<Uuid, P::View> = fold_views(&self.projection, &events);
        debug!(events = events.len(), views = views.len(), "log folded");

        self.store.reset_all().await?;
        let count = views.len();
        for (id, view) in views {
            if cancel.is_cancelled() {
                return Err(DomainError::persistence("rebuild cancelled"));
            }
            self.store.upsert(id, view).await?;
        }

        info!(views = count, "projection rebuilt");
        Ok(count)
    }
}

#[async_trait]
impl<P, PS> EventConsumer for ProjectionRunner<P, PS>
where
    P: Projection,
    PS: ProjectionStore<P::View> + ?Sized + 'static,
{
    fn name(&self) -> &str {
        self.projection.name()
    }

    async fn handle(&self, record: Arc<StoredRecord>) -> Result<(), DomainError> {
        self.apply_record(&record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{AggregateRoot, RosterState};
    use crate::domain::{Callsign, RosterName};
    use crate::event_store::InMemoryEventStore;
    use crate::events::{EventMetadata, RosterEvent};
    use crate::repository::AggregateRepository;
    use chrono::Utc;

    fn meta() -> EventMetadata {
        EventMetadata::new(Utc::now(), Uuid::nil())
    }

    async fn seed(
        repository: &AggregateRepository<RosterState, InMemoryEventStore>,
        name: &str,
        call: &str,
    ) -> Uuid {
        let cancel = CancellationToken::new();
        let mut root = AggregateRoot::<RosterState>::new(Uuid::now_v7());
        root.apply(
            RosterEvent::RosterCreated {
                name: RosterName::new(name).unwrap(),
                callsign: Callsign::new(call).unwrap(),
            },
            meta(),
        )
        .unwrap();
        repository.save(&mut root, &cancel).await.unwrap();
        root.id()
    }

    #[tokio::test]
    async fn test_rebuild_restores_views_after_reset() {
        let events = Arc::new(InMemoryEventStore::new());
        let repository = AggregateRepository::new(Arc::clone(&events));
        let a = seed(&repository, "Sunday Net", "W1AW").await;
        let b = seed(&repository, "Field Day", "K1ABC").await;

        let views = Arc::new(InMemoryProjectionStore::<RosterView>::new());
        let runner = ProjectionRunner::new(RosterProjection, Arc::clone(&views));
        let cancel = CancellationToken::new();

        assert_eq!(runner.rebuild(events.as_ref(), &cancel).await.unwrap(), 2);
        views.reset_all().await.unwrap();
        assert!(views.list().await.unwrap().is_empty());

        runner.rebuild(events.as_ref(), &cancel).await.unwrap();
        assert_eq!(views.get(a).await.unwrap().unwrap().name, "Sunday Net");
        assert_eq!(views.get(b).await.unwrap().unwrap().callsign, "K1ABC");
    }

    #[tokio::test]
    async fn test_corrupt_log_leaves_views_untouched() {
        let events = Arc::new(InMemoryEventStore::new());
        let repository = AggregateRepository::new(Arc::clone(&events));
        let a = seed(&repository, "Sunday Net", "W1AW").await;

        let views = Arc::new(InMemoryProjectionStore::<RosterView>::new());
        let runner = ProjectionRunner::new(RosterProjection, Arc::clone(&views));
        let cancel = CancellationToken::new();
        runner.rebuild(events.as_ref(), &cancel).await.unwrap();

        let bogus = crate::event_store::NewRecord {
            event_id: Uuid::now_v7(),
            aggregate_id: a,
            aggregate_type: "roster".to_string(),
            version: 1,
            event_type: "RosterRenamed".to_string(),
            payload: serde_json::json!({ "type": "RosterRenamed", "name": 17 }),
            occurred_on: Utc::now(),
            correlation_id: Uuid::nil(),
            causation_id: None,
        };
        events.append(vec![bogus], &cancel).await.unwrap();

        let result = runner.rebuild(events.as_ref(), &cancel).await;
        assert!(matches!(result, Err(DomainError::Corruption(_))));
        assert!(views.get(a).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_foreign_records_are_skipped() {
        let views = Arc::new(InMemoryProjectionStore::<RosterView>::new());
        let runner = ProjectionRunner::new(RosterProjection, Arc::clone(&views));
        let record = StoredRecord {
            record_id: Uuid::now_v7(),
            aggregate_id: Uuid::now_v7(),
            aggregate_type: "station".to_string(),
            version: 0,
            event_type: "StationOpened".to_string(),
            payload: serde_json::json!({ "type": "StationOpened" }),
            occurred_on: Utc::now(),
            stored_at: Utc::now(),
            correlation_id: Uuid::nil(),
            causation_id: None,
        };

        runner.apply_record(&record).await.unwrap();
        assert!(views.list().await.unwrap().is_empty());
    }
}

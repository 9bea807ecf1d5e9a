// Copyright (c) 2025 - Cowboy AI, Inc.
//! Aggregate Repository
//!
//! Orchestrates the two halves of an aggregate's life:
//!
//! - **load**: read the stream, replay it, hand back a live root
//! - **save**: mint versions, append, clear the queue, dispatch
//!
//! No lock serializes writers of the same aggregate. The store's version
//! check decides who wins; the loser gets a retryable `ConcurrencyConflict`.

use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument};
use uuid::Uuid;

use crate::aggregate::{AggregateRoot, AggregateState};
use crate::dispatch::Dispatcher;
use crate::errors::DomainError;
use crate::event_store::{EventStore, NewRecord, StoreResult, StoredRecord};
use crate::events::Event;
use crate::outcome::Outcome;

/// Load/save orchestration for one aggregate type
pub struct AggregateRepository<S, St: ?Sized> {
    store: Arc<St>,
    dispatcher: Option<Dispatcher>,
    _state: PhantomData<fn() -> S>,
}

impl<S, St: ?Sized> Clone for AggregateRepository<S, St> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            dispatcher: self.dispatcher.clone(),
            _state: PhantomData,
        }
    }
}

impl<S, St> AggregateRepository<S, St>
where
    S: AggregateState,
    St: EventStore + ?Sized,
{
    pub fn new(store: Arc<St>) -> Self {
        Self {
            store,
            dispatcher: None,
            _state: PhantomData,
        }
    }

    /// Publish committed records to `dispatcher` after every successful save
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn store(&self) -> &Arc<St> {
        &self.store
    }

    /// Rebuild an aggregate from its full history
    ///
    /// # Errors
    ///
    /// - `NotFound` when the aggregate has no events
    /// - `Corruption` when a record cannot be decoded or replayed
    #[instrument(skip(self, cancel), fields(aggregate_type = S::AGGREGATE_TYPE))]
    pub async fn load(&self, id: Uuid, cancel: &CancellationToken) -> Outcome<AggregateRoot<S>> {
        let records = guarded("read", self.store.read(id, 0, cancel)).await?;
        if records.is_empty() {
            return Err(DomainError::NotFound(id).into());
        }

        let history = records
            .iter()
            .map(|record| decode::<S>(record))
            .collect::<StoreResult<Vec<_>>>()?;

        let root = AggregateRoot::from_history(id, history)?;
        debug!(version = ?root.version(), "aggregate loaded");
        Ok(root)
    }

    /// Persist the aggregate's uncommitted events
    ///
    /// Returns how many events were written. An aggregate without changes is
    /// a no-op: no store write, no dispatch. On failure the queue is kept so
    /// the caller may retry.
    #[instrument(skip_all, fields(aggregate_id = %aggregate.id(), aggregate_type = S::AGGREGATE_TYPE))]
    pub async fn save(
        &self,
        aggregate: &mut AggregateRoot<S>,
        cancel: &CancellationToken,
    ) -> Outcome<usize> {
        let changes = aggregate.get_uncommitted_changes();
        if changes.is_empty() {
            debug!("nothing to save");
            return Ok(0);
        }

        let records = changes
            .iter()
            .map(NewRecord::from_event)
            .collect::<StoreResult<Vec<_>>>()?;

        let committed = guarded("append", self.store.append(records, cancel)).await?;
        aggregate.clear_changes();

        if let Some(dispatcher) = &self.dispatcher {
            let reached = dispatcher.publish(&committed);
            debug!(subscribers = reached, "committed events dispatched");
        }

        debug!(events = committed.len(), version = ?aggregate.version(), "aggregate saved");
        Ok(committed.len())
    }

    /// Typed events of one aggregate with `version >= from_version`
    #[instrument(skip(self, cancel), fields(aggregate_type = S::AGGREGATE_TYPE))]
    pub async fn get_events(
        &self,
        id: Uuid,
        from_version: u64,
        cancel: &CancellationToken,
    ) -> Outcome<Vec<Event<S::Event>>> {
        let records = guarded("read", self.store.read(id, from_version, cancel)).await?;
        Ok(records
            .iter()
            .map(decode::<S>)
            .collect::<StoreResult<Vec<_>>>()?)
    }

    /// Every event of this aggregate type, in log order
    ///
    /// Bulk and expensive; intended for rebuilds.
    #[instrument(skip(self, cancel), fields(aggregate_type = S::AGGREGATE_TYPE))]
    pub async fn get_all_events(&self, cancel: &CancellationToken) -> Outcome<Vec<Event<S::Event>>> {
        let records = guarded("read_all", self.store.read_all(cancel)).await?;
        Ok(records
            .iter()
            .filter(|r| r.aggregate_type == S::AGGREGATE_TYPE)
            .map(decode::<S>)
            .collect::<StoreResult<Vec<_>>>()?)
    }
}

fn decode<S: AggregateState>(record: &StoredRecord) -> StoreResult<Event<S::Event>> {
    if record.aggregate_type != S::AGGREGATE_TYPE {
        return Err(DomainError::validation(format!(
            "aggregate {} is a {}, not a {}",
            record.aggregate_id,
            record.aggregate_type,
            S::AGGREGATE_TYPE
        )));
    }
    record.decode()
}

/// Run a store call, turning a panic inside the driver into `Persistence`
async fn guarded<T>(
    operation: &'static str,
    call: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let reason = panic_message(panic.as_ref());
            error!(operation, %reason, "event store panicked");
            Err(DomainError::persistence(format!(
                "event store {operation} failed unexpectedly: {reason}"
            )))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

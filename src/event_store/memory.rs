// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-memory event store
//!
//! Streams live in a hash map behind an async `RwLock`. An append validates
//! every aggregate in the batch before writing any of them, and the write
//! itself happens under a single lock acquisition, so a batch is atomic even
//! across aggregates.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};
use uuid::Uuid;

use super::{
    cancelled, group_by_aggregate, sort_log, EventStore, NewRecord, StoreResult, StoredRecord,
};
use crate::errors::DomainError;

#[derive(Debug, Default)]
struct Streams {
    by_aggregate: HashMap<Uuid, Vec<StoredRecord>>,
    last_stored_at: Option<DateTime<Utc>>,
}

impl Streams {
    fn last_version(&self, aggregate_id: Uuid) -> Option<u64> {
        self.by_aggregate
            .get(&aggregate_id)
            .and_then(|records| records.last())
            .map(|r| r.version)
    }

    /// Storage timestamps never run backwards, even if the wall clock does
    fn next_stored_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stored_at {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_stored_at = Some(stamp);
        stamp
    }
}

/// Event store held entirely in process memory
#[derive(Debug)]
pub struct InMemoryEventStore {
    streams: RwLock<Streams>,
    available: AtomicBool,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(Streams::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate losing (or regaining) the storage backend
    ///
    /// While unavailable every operation fails with `Persistence`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of stored records across all aggregates
    pub async fn len(&self) -> usize {
        self.streams
            .read()
            .await
            .by_aggregate
            .values()
            .map(Vec::len)
            .sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn ensure_ready(&self, cancel: &CancellationToken) -> StoreResult<()> {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(DomainError::persistence("event store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[instrument(skip(self, records, cancel), fields(record_count = records.len()))]
    async fn append(
        &self,
        records: Vec<NewRecord>,
        cancel: &CancellationToken,
    ) -> StoreResult<Vec<StoredRecord>> {
        self.ensure_ready(cancel)?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let batches = group_by_aggregate(records)?;

        let mut streams = tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled()),
            guard = self.streams.write() => guard,
        };

        // Nothing is written until every aggregate in the batch checks out
        for batch in &batches {
            let last = streams.last_version(batch.aggregate_id);
            if let Err(conflict) = batch.check_head(last) {
                debug!(aggregate_id = %batch.aggregate_id, ?last, "version mismatch, rejecting append");
                return Err(conflict);
            }
        }

        let stored_at = streams.next_stored_at();
        let mut committed = Vec::new();
        for batch in batches {
            let stored: Vec<StoredRecord> = batch
                .records
                .into_iter()
                .map(|r| r.into_stored(stored_at))
                .collect();
            committed.extend(stored.iter().cloned());
            streams
                .by_aggregate
                .entry(batch.aggregate_id)
                .or_default()
                .extend(stored);
        }

        debug!(events_appended = committed.len(), "events appended");
        Ok(committed)
    }

    #[instrument(skip(self, cancel))]
    async fn read(
        &self,
        aggregate_id: Uuid,
        from_version: u64,
        cancel: &CancellationToken,
    ) -> StoreResult<Vec<StoredRecord>> {
        self.ensure_ready(cancel)?;
        let streams = self.streams.read().await;

        let records: Vec<StoredRecord> = streams
            .by_aggregate
            .get(&aggregate_id)
            .map(|stream| {
                stream
                    .iter()
                    .filter(|r| r.version >= from_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        trace!(count = records.len(), "read aggregate stream");
        Ok(records)
    }

    #[instrument(skip(self, cancel))]
    async fn read_all(&self, cancel: &CancellationToken) -> StoreResult<Vec<StoredRecord>> {
        self.ensure_ready(cancel)?;
        let streams = self.streams.read().await;

        let mut records: Vec<StoredRecord> =
            streams.by_aggregate.values().flatten().cloned().collect();
        sort_log(&mut records);

        trace!(count = records.len(), "read full log");
        Ok(records)
    }

    #[instrument(skip(self, cancel))]
    async fn last_version(
        &self,
        aggregate_id: Uuid,
        cancel: &CancellationToken,
    ) -> StoreResult<Option<u64>> {
        self.ensure_ready(cancel)?;
        Ok(self.streams.read().await.last_version(aggregate_id))
    }
}

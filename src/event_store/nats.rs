// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS JetStream Event Store Implementation
//!
//! This module implements the EventStore trait using NATS JetStream as the
//! persistent storage backend, providing durable event streaming with replay.

use std::future::Future;
use std::time::Duration;

use async_nats::jetstream::{self, consumer, stream::Stream};
use async_nats::HeaderMap;
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{
    cancelled, group_by_aggregate, sort_log, AggregateBatch, EventStore, NewRecord, StoreResult,
    StoredRecord,
};
use crate::errors::DomainError;
use crate::jetstream::{
    create_event_stream, Commit, JetStreamConfig, EXPECTED_LAST_SUBJECT_SEQUENCE, MSG_ID,
};

/// Largest number of messages requested per fetch
const FETCH_BATCH: usize = 1000;

/// How long a fetch waits for messages the server said were pending
const FETCH_EXPIRES: Duration = Duration::from_secs(2);

/// Ephemeral read consumers are reaped after this much idleness
const CONSUMER_INACTIVE: Duration = Duration::from_secs(30);

/// Last commit observed on an aggregate subject
#[derive(Debug, Clone, Copy, Default)]
struct Head {
    version: Option<u64>,
    /// Stream sequence of the last commit, `0` when the subject is empty
    sequence: u64,
}

/// NATS JetStream-backed event store
///
/// This implementation uses NATS JetStream for durable event storage with:
/// - One subject per aggregate: `{prefix}.aggregate.{aggregate_id}`
/// - One message per aggregate per append, so a commit lands whole
/// - Subject-sequence fencing for optimistic concurrency
///
/// A batch touching several aggregates is published commit by commit; it is
/// atomic per aggregate, not across them.
///
/// # Example
///
/// ```rust,no_run
/// use cim_aggregate_store::event_store::NatsEventStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = NatsEventStore::connect("nats://localhost:4222").await?;
///     // Use store...
///     Ok(())
/// }
/// ```
pub struct NatsEventStore {
    /// NATS JetStream context
    jetstream: jetstream::Context,

    /// JetStream stream holding the commits
    stream: Stream,

    /// Base subject prefix (e.g., "events")
    subject_prefix: String,
}

impl NatsEventStore {
    /// Connect to NATS and create event store with the default stream
    pub async fn connect(nats_url: &str) -> StoreResult<Self> {
        Self::connect_with_config(nats_url, JetStreamConfig::default(), "events").await
    }

    /// Connect with custom stream configuration and subject prefix
    pub async fn connect_with_config(
        nats_url: &str,
        config: JetStreamConfig,
        subject_prefix: impl Into<String>,
    ) -> StoreResult<Self> {
        let client = async_nats::connect(nats_url)
            .await
            .map_err(|e| DomainError::persistence(format!("NATS connection failed: {e}")))?;

        Self::with_context(jetstream::new(client), config, subject_prefix).await
    }

    /// Build on an existing JetStream context
    pub async fn with_context(
        jetstream: jetstream::Context,
        config: JetStreamConfig,
        subject_prefix: impl Into<String>,
    ) -> StoreResult<Self> {
        let stream = create_event_stream(jetstream.clone(), config).await?;

        Ok(Self {
            jetstream,
            stream,
            subject_prefix: subject_prefix.into(),
        })
    }

    /// Subject holding every commit of one aggregate
    ///
    /// Format: {prefix}.aggregate.{aggregate_id}
    pub fn aggregate_subject(&self, aggregate_id: Uuid) -> String {
        format!("{}.aggregate.{}", self.subject_prefix, aggregate_id)
    }

    /// Filter matching every aggregate subject
    fn all_aggregates_filter(&self) -> String {
        format!("{}.aggregate.>", self.subject_prefix)
    }

    /// Read every commit matching `filter_subject`, paired with its stream sequence
    async fn read_commits(
        &self,
        filter_subject: String,
        deliver_policy: consumer::DeliverPolicy,
    ) -> StoreResult<Vec<(u64, Commit)>> {
        let consumer = self
            .stream
            .create_consumer(consumer::pull::Config {
                filter_subject: filter_subject.clone(),
                deliver_policy,
                ack_policy: consumer::AckPolicy::None,
                inactive_threshold: CONSUMER_INACTIVE,
                ..Default::default()
            })
            .await
            .map_err(|e| DomainError::persistence(format!("consumer for {filter_subject}: {e}")))?;

        let mut remaining = consumer.cached_info().num_pending;
        let mut commits = Vec::new();

        while remaining > 0 {
            let wanted = usize::try_from(remaining).unwrap_or(FETCH_BATCH).min(FETCH_BATCH);
            let mut messages = consumer
                .fetch()
                .max_messages(wanted)
                .expires(FETCH_EXPIRES)
                .messages()
                .await
                .map_err(|e| DomainError::persistence(format!("fetch from {filter_subject}: {e}")))?;

            let mut received = 0u64;
            while let Some(message) = messages.next().await {
                let msg = message.map_err(|e| DomainError::persistence(e.to_string()))?;
                let sequence = msg
                    .info()
                    .map_err(|e| DomainError::persistence(format!("message metadata: {e}")))?
                    .stream_sequence;
                commits.push((sequence, Commit::from_bytes(&msg.subject, &msg.payload)?));
                received += 1;
            }

            if received == 0 {
                warn!(%filter_subject, remaining, "fetch expired with messages still pending");
                return Err(DomainError::persistence(format!(
                    "timed out reading {filter_subject} with {remaining} messages pending"
                )));
            }
            remaining = remaining.saturating_sub(received);
        }

        commits.sort_by_key(|(sequence, _)| *sequence);
        Ok(commits)
    }

    async fn head(&self, aggregate_id: Uuid) -> StoreResult<Head> {
        let commits = self
            .read_commits(
                self.aggregate_subject(aggregate_id),
                consumer::DeliverPolicy::LastPerSubject,
            )
            .await?;

        Ok(commits
            .last()
            .map(|(sequence, commit)| Head {
                version: commit.last_version(),
                sequence: *sequence,
            })
            .unwrap_or_default())
    }

    /// Publish one aggregate's records as a single fenced commit
    async fn publish_commit(&self, batch: AggregateBatch) -> StoreResult<Vec<StoredRecord>> {
        let head = self.head(batch.aggregate_id).await?;
        batch.check_head(head.version)?;

        let aggregate_id = batch.aggregate_id;
        let expected = batch.first_version();
        let subject = self.aggregate_subject(aggregate_id);

        let stored_at = Utc::now();
        let commit = Commit {
            records: batch
                .records
                .into_iter()
                .map(|r| r.into_stored(stored_at))
                .collect(),
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            EXPECTED_LAST_SUBJECT_SEQUENCE,
            head.sequence.to_string().as_str(),
        );
        if let Some(first) = commit.records.first() {
            headers.insert(MSG_ID, first.record_id.to_string().as_str());
        }

        let published = self
            .jetstream
            .publish_with_headers(subject.clone(), headers, commit.to_bytes()?.into())
            .await
            .map_err(|e| DomainError::persistence(format!("publish to {subject}: {e}")))?
            .await;

        match published {
            Ok(ack) => {
                debug!(%aggregate_id, sequence = ack.sequence, events = commit.records.len(), "commit stored");
                Ok(commit.records)
            }
            Err(e) if e.to_string().to_lowercase().contains("wrong last sequence") => {
                debug!(%aggregate_id, expected, "subject sequence moved, rejecting append");
                let actual = self.head(aggregate_id).await.ok().and_then(|h| h.version);
                Err(DomainError::ConcurrencyConflict {
                    aggregate_id,
                    expected,
                    actual,
                })
            }
            Err(e) => Err(DomainError::persistence(format!("commit to {subject}: {e}"))),
        }
    }
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    tokio::select! {
        _ = cancel.cancelled() => Err(cancelled()),
        result = work => result,
    }
}

#[async_trait]
impl EventStore for NatsEventStore {
    #[instrument(skip(self, records, cancel), fields(record_count = records.len()))]
    async fn append(
        &self,
        records: Vec<NewRecord>,
        cancel: &CancellationToken,
    ) -> StoreResult<Vec<StoredRecord>> {
        let batches = group_by_aggregate(records)?;
        let mut committed = Vec::new();

        // A commit in flight is never abandoned; cancellation is honoured
        // between commits only.
        for batch in batches {
            if cancel.is_cancelled() {
                return Err(cancelled());
            }
            committed.extend(self.publish_commit(batch).await?);
        }

        Ok(committed)
    }

    #[instrument(skip(self, cancel))]
    async fn read(
        &self,
        aggregate_id: Uuid,
        from_version: u64,
        cancel: &CancellationToken,
    ) -> StoreResult<Vec<StoredRecord>> {
        let commits = until_cancelled(
            cancel,
            self.read_commits(
                self.aggregate_subject(aggregate_id),
                consumer::DeliverPolicy::All,
            ),
        )
        .await?;

        Ok(commits
            .into_iter()
            .flat_map(|(_, commit)| commit.records)
            .filter(|r| r.version >= from_version)
            .collect())
    }

    #[instrument(skip(self, cancel))]
    async fn read_all(&self, cancel: &CancellationToken) -> StoreResult<Vec<StoredRecord>> {
        let commits = until_cancelled(
            cancel,
            self.read_commits(self.all_aggregates_filter(), consumer::DeliverPolicy::All),
        )
        .await?;

        let mut records: Vec<StoredRecord> = commits
            .into_iter()
            .flat_map(|(_, commit)| commit.records)
            .collect();
        sort_log(&mut records);
        Ok(records)
    }

    #[instrument(skip(self, cancel))]
    async fn last_version(
        &self,
        aggregate_id: Uuid,
        cancel: &CancellationToken,
    ) -> StoreResult<Option<u64>> {
        let head = until_cancelled(cancel, self.head(aggregate_id)).await?;
        Ok(head.version)
    }
}

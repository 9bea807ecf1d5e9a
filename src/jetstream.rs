// Copyright (c) 2025 - Cowboy AI, Inc.

//! JetStream configuration and setup for the aggregate event log
//!
//! # Architecture
//!
//! Each append publishes one [`Commit`] message per aggregate on the subject
//! `{prefix}.aggregate.{aggregate_id}`. A commit carries every record the
//! append wrote for that aggregate, so a commit is stored whole or not at all.
//!
//! Concurrent writers are fenced with JetStream's subject-sequence check: the
//! publisher states the stream sequence of the last commit it saw on the
//! subject, and the server refuses the message if anything landed since.
//!
//! # Example
//!
//! ```rust,no_run
//! use cim_aggregate_store::jetstream::{JetStreamConfig, create_event_stream};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = async_nats::connect("nats://localhost:4222").await?;
//!     let jetstream = async_nats::jetstream::new(client);
//!
//!     let config = JetStreamConfig::default();
//!     let stream = create_event_stream(jetstream, config).await?;
//!
//!     Ok(())
//! }
//! ```

use async_nats::jetstream::{self, stream::Stream};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::DomainError;
use crate::event_store::{StoreResult, StoredRecord};

/// Header naming the expected stream sequence of the subject's last message
pub const EXPECTED_LAST_SUBJECT_SEQUENCE: &str = "Nats-Expected-Last-Subject-Sequence";

/// Header used by JetStream for publish de-duplication
pub const MSG_ID: &str = "Nats-Msg-Id";

/// Configuration for the aggregate event stream
#[derive(Debug, Clone)]
pub struct JetStreamConfig {
    /// Stream name
    pub stream_name: String,

    /// Subjects this stream will capture (defaults to "events.aggregate.>")
    pub subjects: Vec<String>,

    /// Maximum age of messages; zero keeps them forever
    pub max_age: Duration,

    /// Maximum bytes stored in stream (default: 10GB)
    pub max_bytes: i64,

    /// Storage type (File or Memory)
    pub storage: StorageType,

    /// Number of replicas (for clustered NATS)
    pub replicas: usize,

    /// Retention policy
    pub retention: RetentionPolicy,
}

impl Default for JetStreamConfig {
    fn default() -> Self {
        Self {
            stream_name: "AGGREGATE_EVENTS".to_string(),
            subjects: vec!["events.aggregate.>".to_string()],
            max_age: Duration::ZERO,
            max_bytes: 10 * 1024 * 1024 * 1024, // 10 GB
            storage: StorageType::File,
            replicas: 1,
            retention: RetentionPolicy::Limits,
        }
    }
}

impl JetStreamConfig {
    /// Stream capturing the aggregate subjects under `prefix`
    ///
    /// Notification subjects (`{prefix}.notify.>`) stay outside the stream.
    pub fn for_prefix(stream_name: impl Into<String>, subject_prefix: &str) -> Self {
        Self {
            stream_name: stream_name.into(),
            subjects: vec![format!("{subject_prefix}.aggregate.>")],
            ..Default::default()
        }
    }
}

/// Storage type for JetStream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// File-based storage (persistent across restarts)
    File,
    /// Memory-based storage (faster, but lost on restart)
    Memory,
}

/// Retention policy for stream
///
/// An event log only makes sense with `Limits`; the others are accepted so a
/// shared stream can be reused, at the operator's risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Limits-based retention (based on max_age and max_bytes)
    Limits,
    /// Interest-based retention (messages kept while there are consumers)
    Interest,
    /// Work queue retention (messages deleted after acknowledgment)
    WorkQueue,
}

/// One append's worth of records for a single aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub records: Vec<StoredRecord>,
}

impl Commit {
    pub fn last_version(&self) -> Option<u64> {
        self.records.last().map(|r| r.version)
    }

    pub fn to_bytes(&self) -> StoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a commit message; unreadable bytes are corruption
    pub fn from_bytes(subject: &str, bytes: &[u8]) -> StoreResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            DomainError::corruption(format!("unreadable commit on {subject}: {e}"))
        })
    }
}

/// Create or update the aggregate event stream
///
/// This function is idempotent - it will create the stream if it doesn't exist,
/// or return the existing one.
pub async fn create_event_stream(
    jetstream: jetstream::Context,
    config: JetStreamConfig,
) -> StoreResult<Stream> {
    let storage = match config.storage {
        StorageType::File => jetstream::stream::StorageType::File,
        StorageType::Memory => jetstream::stream::StorageType::Memory,
    };

    let retention = match config.retention {
        RetentionPolicy::Limits => jetstream::stream::RetentionPolicy::Limits,
        RetentionPolicy::Interest => jetstream::stream::RetentionPolicy::Interest,
        RetentionPolicy::WorkQueue => jetstream::stream::RetentionPolicy::WorkQueue,
    };

    let stream_config = jetstream::stream::Config {
        name: config.stream_name.clone(),
        subjects: config.subjects,
        max_age: config.max_age,
        max_bytes: config.max_bytes,
        storage,
        num_replicas: config.replicas,
        retention,
        ..Default::default()
    };

    let stream = jetstream
        .get_or_create_stream(stream_config)
        .await
        .map_err(|e| DomainError::persistence(format!("stream setup failed: {e}")))?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_default_config() {
        let config = JetStreamConfig::default();
        assert_eq!(config.stream_name, "AGGREGATE_EVENTS");
        assert_eq!(config.subjects, vec!["events.aggregate.>"]);
        assert_eq!(config.storage, StorageType::File);
        assert_eq!(config.retention, RetentionPolicy::Limits);
        assert_eq!(config.max_age, Duration::ZERO);
    }

    #[test]
    fn test_prefix_config() {
        let config = JetStreamConfig::for_prefix("ROSTERS", "rosters");
        assert_eq!(config.subjects, vec!["rosters.aggregate.>"]);
        assert_eq!(config.stream_name, "ROSTERS");
    }

    #[test]
    fn test_commit_bytes() {
        let record = StoredRecord {
            record_id: Uuid::now_v7(),
            aggregate_id: Uuid::now_v7(),
            aggregate_type: "roster".to_string(),
            version: 4,
            event_type: "MemberRemoved".to_string(),
            payload: serde_json::json!({ "type": "MemberRemoved", "member_id": Uuid::nil() }),
            occurred_on: Utc::now(),
            stored_at: Utc::now(),
            correlation_id: Uuid::nil(),
            causation_id: None,
        };
        let commit = Commit {
            records: vec![record],
        };

        let bytes = commit.to_bytes().unwrap();
        let decoded = Commit::from_bytes("events.aggregate.x", &bytes).unwrap();
        assert_eq!(decoded.last_version(), Some(4));

        let garbage = Commit::from_bytes("events.aggregate.x", b"{not json");
        assert!(matches!(garbage, Err(DomainError::Corruption(_))));
    }
}

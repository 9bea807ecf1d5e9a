// Copyright (c) 2025 - Cowboy AI, Inc.
//! Dispatch Queue
//!
//! Fan-out of freshly committed records to downstream consumers (projection
//! runners, notifiers). Every subscriber gets its own unbounded FIFO channel
//! and a task draining it, so a slow consumer never blocks the save path or
//! its neighbours.
//!
//! Delivery is at-most-once. A consumer that fails on a record logs a warning
//! and moves on; nothing is redelivered. Read models recover by rebuilding
//! from the event log.
//!
//! ```text
//! save() ──publish──┬──► [mpsc] ──► ProjectionRunner
//!                   └──► [mpsc] ──► NatsNotifier
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::DomainError;
use crate::event_store::StoredRecord;
use crate::nats::NatsClient;

/// A downstream reader of committed records
#[async_trait]
pub trait EventConsumer: Send + Sync + 'static {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Handle one committed record
    async fn handle(&self, record: Arc<StoredRecord>) -> Result<(), DomainError>;
}

struct Subscriber {
    id: u64,
    name: String,
    sender: mpsc::UnboundedSender<Arc<StoredRecord>>,
}

struct Shared {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    shutdown: CancellationToken,
}

/// Multi-consumer, fire-and-forget dispatch queue
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Attach a consumer and start its delivery task
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe<C: EventConsumer>(&self, consumer: Arc<C>) -> SubscriptionHandle {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let name = consumer.name().to_string();
        let (sender, receiver) = mpsc::unbounded_channel();
        let stop = self.shared.shutdown.child_token();

        let task = tokio::spawn(deliver(consumer, receiver, stop.clone()));

        self.lock().push(Subscriber {
            id,
            name: name.clone(),
            sender,
        });
        info!(subscriber = %name, id, "consumer subscribed");

        SubscriptionHandle { id, name, stop, task }
    }

    /// Queue committed records for every subscriber, without waiting
    ///
    /// Returns how many subscribers the records were handed to.
    pub fn publish(&self, records: &[StoredRecord]) -> usize {
        if records.is_empty() {
            return 0;
        }

        let shared: Vec<Arc<StoredRecord>> = records.iter().cloned().map(Arc::new).collect();
        let mut subscribers = self.lock();

        subscribers.retain(|subscriber| {
            let open = shared
                .iter()
                .all(|record| subscriber.sender.send(Arc::clone(record)).is_ok());
            if !open {
                debug!(subscriber = %subscriber.name, id = subscriber.id, "pruning closed subscriber");
            }
            open
        });

        subscribers.len()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|s| !s.sender.is_closed());
        subscribers.len()
    }

    /// Stop every subscription
    pub fn shutdown(&self) {
        info!("dispatcher shutting down");
        self.shared.shutdown.cancel();
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

async fn deliver<C: EventConsumer>(
    consumer: Arc<C>,
    mut receiver: mpsc::UnboundedReceiver<Arc<StoredRecord>>,
    stop: CancellationToken,
) {
    loop {
        let record = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            next = receiver.recv() => match next {
                Some(record) => record,
                None => break,
            },
        };

        let record_id = record.record_id;
        let outcome = AssertUnwindSafe(consumer.handle(record)).catch_unwind().await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(consumer = consumer.name(), %record_id, error = %e, "consumer failed, event dropped");
            }
            Err(_) => {
                warn!(consumer = consumer.name(), %record_id, "consumer panicked, event dropped");
            }
        }
    }
    debug!(consumer = consumer.name(), "delivery task stopped");
}

/// Handle to one subscription
pub struct SubscriptionHandle {
    id: u64,
    name: String,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop delivery and wait for the task to wind down
    ///
    /// Records still queued for this subscriber are dropped.
    pub async fn unsubscribe(self) {
        self.stop.cancel();
        if let Err(e) = self.task.await {
            warn!(subscriber = %self.name, error = %e, "delivery task ended abnormally");
        }
    }
}

/// Republishes committed records on NATS for external listeners
///
/// Subject: `{prefix}.notify.{aggregate_type}.{event_type}`
pub struct NatsNotifier {
    client: NatsClient,
    subject_prefix: String,
}

impl NatsNotifier {
    pub fn new(client: NatsClient, subject_prefix: impl Into<String>) -> Self {
        Self {
            client,
            subject_prefix: subject_prefix.into(),
        }
    }

    pub fn subject_for(&self, record: &StoredRecord) -> String {
        notify_subject(&self.subject_prefix, record)
    }
}

pub(crate) fn notify_subject(prefix: &str, record: &StoredRecord) -> String {
    format!(
        "{}.notify.{}.{}",
        prefix,
        record.aggregate_type,
        record.event_type.to_lowercase()
    )
}

#[async_trait]
impl EventConsumer for NatsNotifier {
    fn name(&self) -> &str {
        "nats-notifier"
    }

    async fn handle(&self, record: Arc<StoredRecord>) -> Result<(), DomainError> {
        let subject = self.subject_for(&record);
        self.client.publish(&subject, record.as_ref()).await
    }
}

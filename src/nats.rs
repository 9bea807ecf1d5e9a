// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS client abstraction for the event store and notifications

use async_nats::{jetstream, Client, ConnectOptions, Subscriber};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::DomainError;

/// Configuration for NATS connection
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// NATS server URLs
    pub servers: Vec<String>,
    /// Client name
    pub name: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Request timeout
    pub request_timeout: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            name: "cim-aggregate-store".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl NatsConfig {
    /// Single-server configuration
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            servers: vec![url.into()],
            ..Default::default()
        }
    }
}

/// NATS client wrapper
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    /// Create a new NATS client with the given configuration
    pub async fn new(config: NatsConfig) -> Result<Self, DomainError> {
        let connect_options = ConnectOptions::new()
            .name(&config.name)
            .connection_timeout(config.connect_timeout)
            .request_timeout(Some(config.request_timeout));

        let client = async_nats::connect_with_options(config.servers.join(","), connect_options)
            .await
            .map_err(|e| DomainError::persistence(format!("NATS connection failed: {e}")))?;

        info!("Connected to NATS at {:?}", config.servers);

        Ok(Self { client })
    }

    /// Publish a JSON message to a subject
    pub async fn publish<T>(&self, subject: &str, message: &T) -> Result<(), DomainError>
    where
        T: Serialize,
    {
        let payload = serde_json::to_vec(message)?;

        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| DomainError::persistence(format!("publish to {subject} failed: {e}")))?;

        debug!("Published message to subject: {}", subject);
        Ok(())
    }

    /// Subscribe to a subject
    pub async fn subscribe(&self, subject: &str) -> Result<Subscriber, DomainError> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| DomainError::persistence(format!("subscribe to {subject} failed: {e}")))?;

        info!("Subscribed to subject: {}", subject);
        Ok(subscriber)
    }

    /// JetStream context over this connection
    pub fn jetstream(&self) -> jetstream::Context {
        jetstream::new(self.client.clone())
    }
}

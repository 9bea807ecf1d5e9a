// Copyright (c) 2025 - Cowboy AI, Inc.
//! Expiring cache
//!
//! A plain key → {value, expiry} map. The owner decides when entries are
//! purged and supplies the current time on every call; nothing runs in the
//! background and nothing is global.
//!
//! [`CachedLookup`] puts one in front of an external [`CallsignLookup`].

use std::collections::HashMap;
use std::hash::Hash;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::Callsign;
use crate::errors::DomainError;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// Map whose entries read as absent once their time is up
#[derive(Debug, Clone)]
pub struct ExpiringCache<K, V> {
    entries: HashMap<K, Entry<V>>,
}

impl<K, V> Default for ExpiringCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V> ExpiringCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` until `now + ttl`
    pub fn insert(&mut self, key: K, value: V, ttl: Duration, now: DateTime<Utc>) {
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    /// Live value for `key`; an entry expiring exactly at `now` is gone
    pub fn get(&self, key: &K, now: DateTime<Utc>) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| &entry.value)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Drop expired entries, returning how many went
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    /// Stored entries, expired ones included until purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// External directory resolving a callsign to an operator name
#[async_trait]
pub trait CallsignLookup: Send + Sync {
    /// `None` when the directory does not know the callsign
    async fn operator_name(&self, callsign: &Callsign) -> Result<Option<String>, DomainError>;
}

#[async_trait]
impl<L: CallsignLookup + ?Sized> CallsignLookup for std::sync::Arc<L> {
    async fn operator_name(&self, callsign: &Callsign) -> Result<Option<String>, DomainError> {
        self.as_ref().operator_name(callsign).await
    }
}

/// [`CallsignLookup`] answers cached for a fixed time
///
/// Misses are cached too, so an unknown callsign is not looked up again
/// until its entry expires.
pub struct CachedLookup<L> {
    inner: L,
    ttl: Duration,
    cache: Mutex<ExpiringCache<Callsign, Option<String>>>,
}

impl<L: CallsignLookup> CachedLookup<L> {
    pub fn new(inner: L, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: Mutex::new(ExpiringCache::new()),
        }
    }

    pub async fn operator_name(
        &self,
        callsign: &Callsign,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, DomainError> {
        if let Some(cached) = self.cache.lock().await.get(callsign, now) {
            debug!(%callsign, "callsign lookup served from cache");
            return Ok(cached.clone());
        }

        let answer = self.inner.operator_name(callsign).await?;
        self.cache
            .lock()
            .await
            .insert(callsign.clone(), answer.clone(), self.ttl, now);
        Ok(answer)
    }

    /// Drop expired answers, returning how many went
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        self.cache.lock().await.purge_expired(now)
    }
}

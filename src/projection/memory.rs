// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-memory projection store

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::ProjectionStore;
use crate::errors::DomainError;

/// Views held in a `BTreeMap` keyed by aggregate id
#[derive(Debug)]
pub struct InMemoryProjectionStore<V> {
    views: RwLock<BTreeMap<Uuid, V>>,
}

impl<V> Default for InMemoryProjectionStore<V> {
    fn default() -> Self {
        Self {
            views: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<V> InMemoryProjectionStore<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.views.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.views.read().await.is_empty()
    }
}

#[async_trait]
impl<V> ProjectionStore<V> for InMemoryProjectionStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, id: Uuid) -> Result<Option<V>, DomainError> {
        Ok(self.views.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<V>, DomainError> {
        Ok(self.views.read().await.values().cloned().collect())
    }

    async fn upsert(&self, id: Uuid, view: V) -> Result<(), DomainError> {
        self.views.write().await.insert(id, view);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DomainError> {
        Ok(self.views.write().await.remove(&id).is_some())
    }

    async fn reset_all(&self) -> Result<(), DomainError> {
        self.views.write().await.clear();
        Ok(())
    }

    async fn find(
        &self,
        predicate: &(dyn for<'a> Fn(&'a V) -> bool + Send + Sync),
    ) -> Result<Vec<V>, DomainError> {
        Ok(self
            .views
            .read()
            .await
            .values()
            .filter(|view| predicate(view))
            .cloned()
            .collect())
    }
}

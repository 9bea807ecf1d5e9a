// Copyright (c) 2025 - Cowboy AI, Inc.
//! Uniqueness Index
//!
//! Synchronously maintained map from a normalized key to the aggregate that
//! owns it, per scope (for example roster names and roster callsigns).
//! Command handlers reserve a key before saving and release it if the save
//! fails, so uniqueness never depends on scanning the event log.
//!
//! ```text
//! reserve("roster-name", "Sunday Net", A) → ok
//! reserve("roster-name", "sunday net", B) → Validation: already in use
//! release("roster-name", "Sunday Net", A) → true
//! ```
//!
//! The index lives in process memory. On startup it is rebuilt from the log.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;
use uuid::Uuid;

use crate::errors::DomainError;

/// Canonical form of a key: trimmed and lowercased
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Scoped key → owner map
#[derive(Debug, Default)]
pub struct UniquenessIndex {
    entries: Mutex<HashMap<(String, String), Uuid>>,
}

impl UniquenessIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` for `owner`
    ///
    /// Returns `true` when the key was newly reserved and `false` when the
    /// owner already held it.
    ///
    /// # Errors
    ///
    /// `Validation` if another aggregate holds the key.
    pub fn reserve(&self, scope: &str, key: &str, owner: Uuid) -> Result<bool, DomainError> {
        let slot = (scope.to_string(), normalize_key(key));
        let mut entries = self.lock();

        match entries.get(&slot) {
            Some(holder) if *holder == owner => Ok(false),
            Some(_) => Err(DomainError::validation(format!(
                "{scope} '{}' is already in use",
                key.trim()
            ))),
            None => {
                debug!(scope, key = %slot.1, %owner, "key reserved");
                entries.insert(slot, owner);
                Ok(true)
            }
        }
    }

    /// Give `key` back; only its owner can release it
    pub fn release(&self, scope: &str, key: &str, owner: Uuid) -> bool {
        let slot = (scope.to_string(), normalize_key(key));
        let mut entries = self.lock();

        if entries.get(&slot) == Some(&owner) {
            entries.remove(&slot);
            debug!(scope, key = %slot.1, %owner, "key released");
            true
        } else {
            false
        }
    }

    pub fn owner(&self, scope: &str, key: &str) -> Option<Uuid> {
        self.lock()
            .get(&(scope.to_string(), normalize_key(key)))
            .copied()
    }

    pub fn contains(&self, scope: &str, key: &str) -> bool {
        self.owner(scope, key).is_some()
    }

    /// Replace the whole index with `entries` of `(scope, key, owner)`
    ///
    /// Returns the number of keys held afterwards.
    pub fn rebuild<I, S, K>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (S, K, Uuid)>,
        S: AsRef<str>,
        K: AsRef<str>,
    {
        let fresh: HashMap<(String, String), Uuid> = entries
            .into_iter()
            .map(|(scope, key, owner)| {
                (
                    (scope.as_ref().to_string(), normalize_key(key.as_ref())),
                    owner,
                )
            })
            .collect();

        let count = fresh.len();
        *self.lock() = fresh;
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(String, String), Uuid>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

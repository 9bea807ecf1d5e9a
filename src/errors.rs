// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for aggregate persistence
//!
//! Every business-rule and persistence outcome is carried as a typed
//! [`DomainError`] value. Operations that can report several problems at once
//! return a [`Failures`] list, which is never empty.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while validating, loading or persisting aggregates
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Business-rule violation (empty field, duplicate identity, bad transition)
    #[error("Validation error: {0}")]
    Validation(String),

    /// No history exists for the aggregate
    #[error("Aggregate not found: {0}")]
    NotFound(Uuid),

    /// Another writer appended to the aggregate first
    #[error(
        "Concurrency conflict on {aggregate_id}: expected next version {expected}, store is at {}",
        fmt_version(.actual)
    )]
    ConcurrencyConflict {
        aggregate_id: Uuid,
        expected: u64,
        actual: Option<u64>,
    },

    /// I/O or driver fault
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Stored payload could not be read back
    #[error("Corruption error: {0}")]
    Corruption(String),
}

fn fmt_version(version: &Option<u64>) -> String {
    match version {
        Some(v) => v.to_string(),
        None => "empty".to_string(),
    }
}

impl DomainError {
    /// Shorthand for a validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }

    /// Shorthand for a persistence failure
    pub fn persistence(message: impl Into<String>) -> Self {
        DomainError::Persistence(message.into())
    }

    /// Shorthand for a corruption failure
    pub fn corruption(message: impl Into<String>) -> Self {
        DomainError::Corruption(message.into())
    }

    /// Whether the caller should reload the aggregate and retry the command
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::ConcurrencyConflict { .. })
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Persistence(format!("serialization failed: {err}"))
    }
}

/// Ordered, non-empty list of errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failures {
    first: DomainError,
    rest: Vec<DomainError>,
}

impl Failures {
    /// Create a failure list holding a single error
    pub fn new(error: DomainError) -> Self {
        Self {
            first: error,
            rest: Vec::new(),
        }
    }

    /// Build from a vector, returning `None` when it is empty
    pub fn from_vec(errors: Vec<DomainError>) -> Option<Self> {
        let mut iter = errors.into_iter();
        let first = iter.next()?;
        Some(Self {
            first,
            rest: iter.collect(),
        })
    }

    /// Append one error
    pub fn push(&mut self, error: DomainError) {
        self.rest.push(error);
    }

    /// Append every error of another list, preserving order
    pub fn extend(&mut self, other: Failures) {
        self.rest.push(other.first);
        self.rest.extend(other.rest);
    }

    /// Transform every error, keeping order
    pub fn map(self, mut f: impl FnMut(DomainError) -> DomainError) -> Self {
        let first = f(self.first);
        Self {
            first,
            rest: self.rest.into_iter().map(f).collect(),
        }
    }

    /// First error in the list
    pub fn first(&self) -> &DomainError {
        &self.first
    }

    pub fn iter(&self) -> impl Iterator<Item = &DomainError> {
        std::iter::once(&self.first).chain(self.rest.iter())
    }

    pub fn len(&self) -> usize {
        1 + self.rest.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Human-readable descriptions, in order
    pub fn messages(&self) -> Vec<String> {
        self.iter().map(ToString::to_string).collect()
    }

    /// True when every error is a retryable conflict
    pub fn is_retryable(&self) -> bool {
        self.iter().all(DomainError::is_retryable)
    }

    pub fn into_vec(self) -> Vec<DomainError> {
        let mut all = Vec::with_capacity(1 + self.rest.len());
        all.push(self.first);
        all.extend(self.rest);
        all
    }
}

impl From<DomainError> for Failures {
    fn from(error: DomainError) -> Self {
        Failures::new(error)
    }
}

impl fmt::Display for Failures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages().join("; "))
    }
}

impl std::error::Error for Failures {}

impl IntoIterator for Failures {
    type Item = DomainError;
    type IntoIter = std::vec::IntoIter<DomainError>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_vec().into_iter()
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable holds an unusable value
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

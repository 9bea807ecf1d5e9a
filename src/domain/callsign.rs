// Copyright (c) 2025 - Cowboy AI, Inc.
//! Callsign Value Object
//!
//! Amateur-radio style station identifiers such as `W1AW`, `KD9XYZ` or
//! `VE3ABC/P`. Stored in canonical uppercase form.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::errors::DomainError;

/// Callsign validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallsignError {
    #[error("Callsign is empty")]
    Empty,

    #[error("Callsign must be between 3 and 10 characters: {0}")]
    InvalidLength(String),

    #[error("Invalid character in callsign: {0}")]
    InvalidCharacter(char),

    #[error("Callsign must contain at least one letter and one digit: {0}")]
    MissingLetterOrDigit(String),

    #[error("Invalid callsign suffix: {0}")]
    InvalidSuffix(String),
}

impl From<CallsignError> for DomainError {
    fn from(err: CallsignError) -> Self {
        DomainError::Validation(err.to_string())
    }
}

/// Station callsign
///
/// # Invariants
/// - Base part is 3..=10 ASCII alphanumerics
/// - Base part has at least one letter and one digit
/// - Optional `/` suffix of 1..=4 alphanumerics (portable, mobile, ...)
/// - Uppercase
///
/// ```rust
/// use cim_aggregate_store::domain::Callsign;
///
/// assert_eq!(Callsign::new("w1aw").unwrap().as_str(), "W1AW");
/// assert!(Callsign::new("VE3ABC/P").is_ok());
/// assert!(Callsign::new("").is_err());
/// assert!(Callsign::new("ABCD").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Callsign(String);

impl Callsign {
    pub const MIN_LENGTH: usize = 3;
    pub const MAX_LENGTH: usize = 10;
    pub const MAX_SUFFIX_LENGTH: usize = 4;

    pub fn new(callsign: impl AsRef<str>) -> Result<Self, CallsignError> {
        let canonical = callsign.as_ref().trim().to_ascii_uppercase();

        if canonical.is_empty() {
            return Err(CallsignError::Empty);
        }

        let (base, suffix) = match canonical.split_once('/') {
            Some((base, suffix)) => (base, Some(suffix)),
            None => (canonical.as_str(), None),
        };

        if base.len() < Self::MIN_LENGTH || base.len() > Self::MAX_LENGTH {
            return Err(CallsignError::InvalidLength(canonical.clone()));
        }

        if let Some(ch) = base.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(CallsignError::InvalidCharacter(ch));
        }

        let has_letter = base.chars().any(|c| c.is_ascii_alphabetic());
        let has_digit = base.chars().any(|c| c.is_ascii_digit());
        if !has_letter || !has_digit {
            return Err(CallsignError::MissingLetterOrDigit(canonical.clone()));
        }

        if let Some(suffix) = suffix {
            let valid = !suffix.is_empty()
                && suffix.len() <= Self::MAX_SUFFIX_LENGTH
                && suffix.chars().all(|c| c.is_ascii_alphanumeric());
            if !valid {
                return Err(CallsignError::InvalidSuffix(suffix.to_string()));
            }
        }

        Ok(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Callsign without any `/` suffix
    pub fn base(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for Callsign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Callsign {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Callsign {
    type Error = CallsignError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Callsign> for String {
    fn from(value: Callsign) -> Self {
        value.0
    }
}

impl TryFrom<&str> for Callsign {
    type Error = CallsignError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

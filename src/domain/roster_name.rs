// Copyright (c) 2025 - Cowboy AI, Inc.
//! Roster Name Value Object

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::errors::DomainError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RosterNameError {
    #[error("Roster name is empty")]
    Empty,

    #[error("Roster name exceeds maximum length of 64 characters: {0}")]
    TooLong(usize),
}

impl From<RosterNameError> for DomainError {
    fn from(err: RosterNameError) -> Self {
        DomainError::Validation(err.to_string())
    }
}

/// Display name of a roster, trimmed and non-empty
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RosterName(String);

impl RosterName {
    pub const MAX_LENGTH: usize = 64;

    pub fn new(name: impl AsRef<str>) -> Result<Self, RosterNameError> {
        let trimmed = name.as_ref().trim();

        if trimmed.is_empty() {
            return Err(RosterNameError::Empty);
        }

        let length = trimmed.chars().count();
        if length > Self::MAX_LENGTH {
            return Err(RosterNameError::TooLong(length));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RosterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RosterName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RosterName {
    type Error = RosterNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RosterName> for String {
    fn from(value: RosterName) -> Self {
        value.0
    }
}

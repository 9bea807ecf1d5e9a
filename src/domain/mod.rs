// Copyright (c) 2025 - Cowboy AI, Inc.
//! Roster Domain Models
//!
//! Value objects with validation invariants used by the roster aggregate.
//!
//! - [`Callsign`] - station identifier, canonical uppercase
//! - [`RosterName`] - trimmed, non-empty display name

pub mod callsign;
pub mod roster_name;

pub use callsign::{Callsign, CallsignError};
pub use roster_name::{RosterName, RosterNameError};

use crate::errors::DomainError;
use crate::outcome::Outcome;

/// Parse a roster name into an [`Outcome`]
pub fn parse_name(value: &str) -> Outcome<RosterName> {
    RosterName::new(value).map_err(|e| DomainError::from(e).into())
}

/// Parse a callsign into an [`Outcome`]
pub fn parse_callsign(value: &str) -> Outcome<Callsign> {
    Callsign::new(value).map_err(|e| DomainError::from(e).into())
}

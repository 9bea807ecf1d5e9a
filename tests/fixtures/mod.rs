// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-aggregate-store
//!
//! Deterministic identities, timestamps and commands shared by the
//! integration tests. Aggregate ids are fixed; event ids are minted by the
//! envelope and never compared.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use cim_aggregate_store::aggregate::{
    handle_add_member, handle_create_roster, AddMemberCommand, AggregateRoot,
    CreateRosterCommand, RosterState,
};
use cim_aggregate_store::event_store::InMemoryEventStore;
use cim_aggregate_store::events::EventMetadata;
use cim_aggregate_store::repository::AggregateRepository;

pub const ROSTER_ID_1: &str = "01934f4a-1000-7000-8000-000000001000";
pub const ROSTER_ID_2: &str = "01934f4a-1001-7000-8000-000000001001";

pub const MEMBER_ID_1: &str = "01934f4a-3001-7000-8000-000000003001";
pub const MEMBER_ID_2: &str = "01934f4a-3002-7000-8000-000000003002";
pub const MEMBER_ID_3: &str = "01934f4a-3003-7000-8000-000000003003";

pub const CORRELATION_ID_1: &str = "01934f4a-c001-7000-8000-00000000c001";

// Fixed test timestamp (2026-01-19T12:00:00Z)
pub const FIXED_TIMESTAMP: &str = "2026-01-19T12:00:00Z";

/// Parse a fixed UUID from a constant string
pub fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).expect("Invalid UUID in test fixture")
}

/// Parse the fixed timestamp
pub fn fixed_timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(FIXED_TIMESTAMP)
        .expect("Invalid timestamp in test fixture")
        .with_timezone(&Utc)
}

pub fn metadata() -> EventMetadata {
    EventMetadata::new(fixed_timestamp(), parse_uuid(CORRELATION_ID_1))
}

pub fn roster_id() -> Uuid {
    parse_uuid(ROSTER_ID_1)
}

pub fn member_ids() -> [Uuid; 3] {
    [
        parse_uuid(MEMBER_ID_1),
        parse_uuid(MEMBER_ID_2),
        parse_uuid(MEMBER_ID_3),
    ]
}

pub fn create_command() -> CreateRosterCommand {
    CreateRosterCommand {
        name: "Sunday Net".to_string(),
        callsign: "W1AW".to_string(),
    }
}

pub fn add_member_command(index: usize) -> AddMemberCommand {
    let (callsign, display_name) = [
        ("K1ABC", "Alice Baker"),
        ("N2XYZ", "Bob Young"),
        ("KD9QRS", "Carol Stone"),
    ][index];

    AddMemberCommand {
        member_id: member_ids()[index],
        callsign: callsign.to_string(),
        display_name: display_name.to_string(),
    }
}

/// A new roster with its creation event queued
pub fn created_roster(id: Uuid) -> AggregateRoot<RosterState> {
    let mut root = AggregateRoot::new(id);
    root.execute(metadata(), |state| handle_create_roster(state, create_command()))
        .expect("Failed to create roster");
    root
}

/// A new roster with creation and all three members queued
pub fn staffed_roster(id: Uuid) -> AggregateRoot<RosterState> {
    let mut root = created_roster(id);
    for index in 0..3 {
        root.execute(metadata(), |state| {
            handle_add_member(state, add_member_command(index))
        })
        .expect("Failed to add member");
    }
    root
}

pub fn memory_repository() -> (
    Arc<InMemoryEventStore>,
    AggregateRepository<RosterState, InMemoryEventStore>,
) {
    let store = Arc::new(InMemoryEventStore::new());
    let repository = AggregateRepository::new(Arc::clone(&store));
    (store, repository)
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Roster Commands
//!
//! Commands express intent and carry raw, unvalidated input. Handlers in
//! [`handlers`](super::handlers) turn them into events or validation failures.
//!
//! Commands carry no timestamps; time and correlation travel separately in
//! [`EventMetadata`](crate::events::EventMetadata) so handlers stay pure.

use uuid::Uuid;

/// Create a new roster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRosterCommand {
    pub name: String,
    pub callsign: String,
}

/// Change the roster's display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRosterCommand {
    pub name: String,
}

/// Add a member at the end of the ordering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddMemberCommand {
    pub member_id: Uuid,
    pub callsign: String,
    pub display_name: String,
}

/// Remove a member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveMemberCommand {
    pub member_id: Uuid,
}

/// Replace the member ordering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderMembersCommand {
    /// Every current member id, in the desired order
    pub order: Vec<Uuid>,
}

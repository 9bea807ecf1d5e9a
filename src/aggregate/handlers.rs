// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pure Command Handlers for the Roster Aggregate
//!
//! ```text
//! handle_command(&State, Command) → Outcome<Vec<Event>>
//! ```
//!
//! Handlers parse and validate command input. Independent field checks are
//! accumulated so the caller sees every problem at once; preconditions on the
//! aggregate's state short-circuit. The reducer re-checks state invariants
//! when the events are applied.

use crate::aggregate::commands::*;
use crate::aggregate::roster::{validate_permutation, RosterState};
use crate::domain::{parse_callsign, parse_name};
use crate::errors::DomainError;
use crate::events::RosterEvent;
use crate::outcome::{fail, zip2, Outcome, Validation};

/// Handle CreateRoster
///
/// # Business Rules
/// - Roster must not exist yet
/// - Name and callsign must both be valid (reported together)
pub fn handle_create_roster(
    state: &RosterState,
    command: CreateRosterCommand,
) -> Outcome<Vec<RosterEvent>> {
    if state.is_created() {
        return fail(DomainError::validation("roster already created"));
    }

    let (name, callsign) = zip2(parse_name(&command.name), parse_callsign(&command.callsign))?;
    Ok(vec![RosterEvent::RosterCreated { name, callsign }])
}

/// Handle RenameRoster
///
/// Renaming to the current name produces no event.
pub fn handle_rename_roster(
    state: &RosterState,
    command: RenameRosterCommand,
) -> Outcome<Vec<RosterEvent>> {
    require_created(state)?;
    let name = parse_name(&command.name)?;

    if state.name.as_ref() == Some(&name) {
        return Ok(Vec::new());
    }
    Ok(vec![RosterEvent::RosterRenamed { name }])
}

/// Handle AddMember
///
/// # Business Rules
/// - Roster must exist
/// - Callsign valid, display name non-empty
/// - Neither the member id nor the callsign are already on the roster
pub fn handle_add_member(
    state: &RosterState,
    command: AddMemberCommand,
) -> Outcome<Vec<RosterEvent>> {
    require_created(state)?;

    let display_name = command.display_name.trim().to_string();
    let mut validation = Validation::new();
    let callsign = validation.value(parse_callsign(&command.callsign));

    let validation = validation
        .ensure(!display_name.is_empty(), || {
            DomainError::validation("member display name is required")
        })
        .ensure(state.member(command.member_id).is_none(), || {
            DomainError::validation(format!(
                "member {} is already on the roster",
                command.member_id
            ))
        })
        .ensure(
            callsign.as_ref().map_or(true, |c| !state.has_callsign(c)),
            || {
                DomainError::validation(format!(
                    "callsign {} is already on the roster",
                    command.callsign.trim().to_ascii_uppercase()
                ))
            },
        );

    let events = validation.finish(|| {
        callsign.map(|callsign| RosterEvent::MemberAdded {
            member_id: command.member_id,
            callsign,
            display_name,
        })
    })?;

    Ok(events.into_iter().collect())
}

/// Handle RemoveMember
pub fn handle_remove_member(
    state: &RosterState,
    command: RemoveMemberCommand,
) -> Outcome<Vec<RosterEvent>> {
    require_created(state)?;
    if state.member(command.member_id).is_none() {
        return fail(DomainError::validation(format!(
            "member {} is not on the roster",
            command.member_id
        )));
    }
    Ok(vec![RosterEvent::MemberRemoved {
        member_id: command.member_id,
    }])
}

/// Handle ReorderMembers
///
/// The new order must be a permutation of the current members. An order that
/// matches the current one produces no event.
pub fn handle_reorder_members(
    state: &RosterState,
    command: ReorderMembersCommand,
) -> Outcome<Vec<RosterEvent>> {
    require_created(state)?;
    validate_permutation(state, &command.order)?;

    if state.member_order() == command.order {
        return Ok(Vec::new());
    }
    Ok(vec![RosterEvent::MembersReordered {
        order: command.order,
    }])
}

fn require_created(state: &RosterState) -> Outcome<()> {
    if state.is_created() {
        Ok(())
    } else {
        fail(DomainError::validation("roster has not been created"))
    }
}

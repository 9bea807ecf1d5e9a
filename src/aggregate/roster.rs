// Copyright (c) 2025 - Cowboy AI, Inc.
//! Roster Aggregate State
//!
//! A roster is a named net or club with its own callsign and an ordered list
//! of members. Member order is an explicit sequence: a member's rank is its
//! index, and ranks are reassigned `0..n` after every add, remove or reorder.
//!
//! ```text
//! RosterCreated    → name, callsign
//! MemberAdded      → push, rerank
//! MemberRemoved    → remove, rerank
//! MembersReordered → permute, rerank
//! ```

use std::collections::HashSet;

use uuid::Uuid;

use crate::aggregate::AggregateState;
use crate::domain::{Callsign, RosterName};
use crate::errors::{DomainError, Failures};
use crate::events::RosterEvent;
use crate::outcome::{fail, Outcome};

/// One member of a roster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub member_id: Uuid,
    pub callsign: Callsign,
    pub display_name: String,
    /// Position in the roster, always equal to the index in `members`
    pub rank: u32,
}

/// Roster state reconstructed from events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterState {
    pub name: Option<RosterName>,
    pub callsign: Option<Callsign>,
    pub members: Vec<Member>,
}

impl RosterState {
    /// Whether `RosterCreated` has been applied
    pub fn is_created(&self) -> bool {
        self.name.is_some()
    }

    pub fn member(&self, member_id: Uuid) -> Option<&Member> {
        self.members.iter().find(|m| m.member_id == member_id)
    }

    pub fn has_callsign(&self, callsign: &Callsign) -> bool {
        self.members.iter().any(|m| &m.callsign == callsign)
    }

    /// Member ids in rank order
    pub fn member_order(&self) -> Vec<Uuid> {
        self.members.iter().map(|m| m.member_id).collect()
    }

    /// Ranks run `0..n` in order
    pub fn ranks_are_contiguous(&self) -> bool {
        self.members
            .iter()
            .enumerate()
            .all(|(index, m)| m.rank as usize == index)
    }
}

impl AggregateState for RosterState {
    type Event = RosterEvent;
    const AGGREGATE_TYPE: &'static str = "roster";

    fn apply(&self, event: &RosterEvent) -> Outcome<Self> {
        apply_event(self, event)
    }
}

/// Apply event to state (pure function)
///
/// Rejections leave `state` untouched since a new value is returned only on
/// success.
pub fn apply_event(state: &RosterState, event: &RosterEvent) -> Outcome<RosterState> {
    match event {
        RosterEvent::RosterCreated { name, callsign } => {
            if state.is_created() {
                return fail(DomainError::validation("roster already created"));
            }
            Ok(RosterState {
                name: Some(non_empty(name)?.clone()),
                callsign: Some(callsign.clone()),
                members: Vec::new(),
            })
        }

        RosterEvent::RosterRenamed { name } => {
            require_created(state)?;
            Ok(RosterState {
                name: Some(non_empty(name)?.clone()),
                ..state.clone()
            })
        }

        RosterEvent::MemberAdded {
            member_id,
            callsign,
            display_name,
        } => {
            require_created(state)?;
            if state.member(*member_id).is_some() {
                return fail(DomainError::validation(format!(
                    "member {member_id} is already on the roster"
                )));
            }
            if state.has_callsign(callsign) {
                return fail(DomainError::validation(format!(
                    "callsign {callsign} is already on the roster"
                )));
            }

            let mut members = state.members.clone();
            members.push(Member {
                member_id: *member_id,
                callsign: callsign.clone(),
                display_name: display_name.clone(),
                rank: 0,
            });
            with_members(state, members)
        }

        RosterEvent::MemberRemoved { member_id } => {
            require_created(state)?;
            if state.member(*member_id).is_none() {
                return fail(DomainError::validation(format!(
                    "member {member_id} is not on the roster"
                )));
            }

            let members = state
                .members
                .iter()
                .filter(|m| m.member_id != *member_id)
                .cloned()
                .collect();
            with_members(state, members)
        }

        RosterEvent::MembersReordered { order } => {
            require_created(state)?;
            validate_permutation(state, order)?;

            let members = order
                .iter()
                .filter_map(|id| state.member(*id).cloned())
                .collect();
            with_members(state, members)
        }
    }
}

/// Check that `order` names every current member exactly once
pub fn validate_permutation(state: &RosterState, order: &[Uuid]) -> Outcome<()> {
    let mut seen = HashSet::with_capacity(order.len());
    let mut errors = Vec::new();

    for id in order {
        if !seen.insert(*id) {
            errors.push(DomainError::validation(format!(
                "member {id} appears more than once in the new order"
            )));
        } else if state.member(*id).is_none() {
            errors.push(DomainError::validation(format!(
                "member {id} is not on the roster"
            )));
        }
    }

    for member in &state.members {
        if !seen.contains(&member.member_id) {
            errors.push(DomainError::validation(format!(
                "member {} is missing from the new order",
                member.member_id
            )));
        }
    }

    match Failures::from_vec(errors) {
        Some(failures) => Err(failures),
        None => Ok(()),
    }
}

fn require_created(state: &RosterState) -> Outcome<()> {
    if state.is_created() {
        Ok(())
    } else {
        fail(DomainError::validation("roster has not been created"))
    }
}

fn non_empty(name: &RosterName) -> Outcome<&RosterName> {
    if name.as_str().trim().is_empty() {
        fail(DomainError::validation("roster name is required"))
    } else {
        Ok(name)
    }
}

fn with_members(state: &RosterState, members: Vec<Member>) -> Outcome<RosterState> {
    let next = RosterState {
        members: rerank(members)?,
        ..state.clone()
    };
    Ok(next)
}

fn rerank(members: Vec<Member>) -> Outcome<Vec<Member>> {
    members
        .into_iter()
        .enumerate()
        .map(|(index, member)| -> Outcome<Member> {
            let rank = u32::try_from(index)
                .map_err(|_| DomainError::validation("roster has too many members"))?;
            Ok(Member { rank, ..member })
        })
        .collect()
}

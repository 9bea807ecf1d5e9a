// Copyright (c) 2025 - Cowboy AI, Inc.
//! Roster Domain Events
//!
//! Past-tense facts about a roster: a named net or club with a callsign and
//! an ordered list of members.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Callsign, RosterName};
use crate::events::DomainEvent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RosterEvent {
    /// Roster was created
    RosterCreated { name: RosterName, callsign: Callsign },

    /// Roster display name changed
    RosterRenamed { name: RosterName },

    /// Member joined at the end of the ordering
    MemberAdded {
        member_id: Uuid,
        callsign: Callsign,
        display_name: String,
    },

    /// Member left; remaining ranks close up
    MemberRemoved { member_id: Uuid },

    /// Complete new ordering of the current members
    MembersReordered { order: Vec<Uuid> },
}

impl DomainEvent for RosterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RosterEvent::RosterCreated { .. } => "RosterCreated",
            RosterEvent::RosterRenamed { .. } => "RosterRenamed",
            RosterEvent::MemberAdded { .. } => "MemberAdded",
            RosterEvent::MemberRemoved { .. } => "MemberRemoved",
            RosterEvent::MembersReordered { .. } => "MembersReordered",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialized_form_is_tagged() {
        let event = RosterEvent::RosterCreated {
            name: RosterName::new("Sunday Net").unwrap(),
            callsign: Callsign::new("W1AW").unwrap(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({ "type": "RosterCreated", "name": "Sunday Net", "callsign": "W1AW" })
        );
        assert_eq!(event.event_type(), "RosterCreated");
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let result: Result<RosterEvent, _> =
            serde_json::from_value(json!({ "type": "RosterArchived" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_value_objects_do_not_deserialize() {
        let result: Result<RosterEvent, _> = serde_json::from_value(
            json!({ "type": "RosterCreated", "name": "Net", "callsign": "??" }),
        );
        assert!(result.is_err());

        let result: Result<RosterEvent, _> =
            serde_json::from_value(json!({ "type": "RosterRenamed", "name": "   " }));
        assert!(result.is_err());
    }
}

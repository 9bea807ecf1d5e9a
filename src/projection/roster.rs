// Copyright (c) 2025 - Cowboy AI, Inc.
//! Roster directory read model
//!
//! Flattened, query-friendly views of rosters: name, callsign and the member
//! list in rank order. Name lookups go through [`RosterDirectory`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::{Projection, ProjectionStore, ProjectionUpdate};
use crate::aggregate::{AggregateState, RosterState};
use crate::errors::DomainError;
use crate::events::{Event, RosterEvent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberView {
    pub member_id: Uuid,
    pub callsign: String,
    pub display_name: String,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterView {
    pub roster_id: Uuid,
    pub name: String,
    pub callsign: String,
    pub members: Vec<MemberView>,
    /// Version of the last event folded in
    pub version: Option<u64>,
    pub updated_at: DateTime<Utc>,
}

impl RosterView {
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    fn rerank(&mut self) {
        for (rank, member) in (0u32..).zip(self.members.iter_mut()) {
            member.rank = rank;
        }
    }
}

/// Folds roster events into [`RosterView`]s
///
/// A view only moves forward. Replayed or stale events leave it untouched,
/// and a gap in the sequence waits for a rebuild.
#[derive(Debug, Clone, Copy, Default)]
pub struct RosterProjection;

impl Projection for RosterProjection {
    type Event = RosterEvent;
    type View = RosterView;

    fn name(&self) -> &str {
        "roster-directory"
    }

    fn aggregate_type(&self) -> &str {
        RosterState::AGGREGATE_TYPE
    }

    fn fold(
        &self,
        current: Option<&RosterView>,
        event: &Event<RosterEvent>,
    ) -> ProjectionUpdate<RosterView> {
        if let (None, RosterEvent::RosterCreated { name, callsign }) = (current, &event.payload) {
            return ProjectionUpdate::Upsert(RosterView {
                roster_id: event.aggregate_id,
                name: name.to_string(),
                callsign: callsign.to_string(),
                members: Vec::new(),
                version: event.version,
                updated_at: event.occurred_on,
            });
        }

        // Everything else amends an existing view
        let Some(current) = current else {
            return ProjectionUpdate::Ignore;
        };

        // Only the next version in sequence amends a view
        if let (Some(seen), Some(next)) = (current.version, event.version) {
            if next <= seen {
                return ProjectionUpdate::Ignore;
            }
            if next > seen + 1 {
                warn!(
                    roster_id = %event.aggregate_id,
                    seen,
                    next,
                    "gap in roster events, view left for rebuild"
                );
                return ProjectionUpdate::Ignore;
            }
        }
        let mut view = current.clone();

        match &event.payload {
            RosterEvent::RosterCreated { .. } => return ProjectionUpdate::Ignore,
            RosterEvent::RosterRenamed { name } => view.name = name.to_string(),
            RosterEvent::MemberAdded {
                member_id,
                callsign,
                display_name,
            } => view.members.push(MemberView {
                member_id: *member_id,
                callsign: callsign.to_string(),
                display_name: display_name.clone(),
                rank: 0,
            }),
            RosterEvent::MemberRemoved { member_id } => {
                view.members.retain(|m| m.member_id != *member_id)
            }
            RosterEvent::MembersReordered { order } => {
                let mut reordered = Vec::with_capacity(order.len());
                for id in order {
                    if let Some(member) = view.members.iter().find(|m| m.member_id == *id) {
                        reordered.push(member.clone());
                    }
                }
                view.members = reordered;
            }
        }

        view.rerank();
        view.version = event.version;
        view.updated_at = event.occurred_on;
        ProjectionUpdate::Upsert(view)
    }
}

/// Query side of the roster read model
pub struct RosterDirectory<PS: ProjectionStore<RosterView> + ?Sized> {
    store: Arc<PS>,
}

impl<PS: ProjectionStore<RosterView> + ?Sized> Clone for RosterDirectory<PS> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<PS: ProjectionStore<RosterView> + ?Sized> RosterDirectory<PS> {
    pub fn new(store: Arc<PS>) -> Self {
        Self { store }
    }

    pub async fn get_by_id(&self, roster_id: Uuid) -> Result<Option<RosterView>, DomainError> {
        self.store.get(roster_id).await
    }

    pub async fn get_all(&self) -> Result<Vec<RosterView>, DomainError> {
        self.store.list().await
    }

    /// Rosters whose name contains `fragment`, case-insensitively
    pub async fn search_by_name(&self, fragment: &str) -> Result<Vec<RosterView>, DomainError> {
        let needle = fragment.trim().to_lowercase();
        self.store
            .find(&move |view: &RosterView| view.name.to_lowercase().contains(&needle))
            .await
    }

    /// Whether a roster with exactly this name (ignoring case) exists
    ///
    /// Eventually consistent. Use the uniqueness index to enforce uniqueness.
    pub async fn exists_by_name(&self, name: &str) -> Result<bool, DomainError> {
        let wanted = name.trim().to_lowercase();
        let matches = self
            .store
            .find(&move |view: &RosterView| view.name.to_lowercase() == wanted)
            .await?;
        Ok(!matches.is_empty())
    }

    /// Rosters listing a member with this callsign
    pub async fn find_by_member_callsign(
        &self,
        callsign: &str,
    ) -> Result<Vec<RosterView>, DomainError> {
        let wanted = callsign.trim().to_uppercase();
        self.store
            .find(&move |view: &RosterView| view.members.iter().any(|m| m.callsign == wanted))
            .await
    }
}

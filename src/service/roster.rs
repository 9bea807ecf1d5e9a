// Copyright (c) 2025 - Cowboy AI, Inc.
//! Roster Service
//!
//! Command entry points for rosters. Each call loads the aggregate, runs a
//! pure handler, and saves. A `ConcurrencyConflict` reloads and retries the
//! command up to `max_attempts` times; other failures are returned as-is.
//!
//! Roster names and callsigns are unique across rosters. The service reserves
//! them in the [`UniquenessIndex`] before saving and gives them back when the
//! save fails.

use std::sync::Arc;

use chrono::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::Clock;
use crate::aggregate::{
    handle_add_member, handle_create_roster, handle_remove_member, handle_rename_roster,
    handle_reorder_members, AddMemberCommand, AggregateRoot, CreateRosterCommand,
    RemoveMemberCommand, RenameRosterCommand, ReorderMembersCommand, RosterState,
};
use crate::cache::{CachedLookup, CallsignLookup};
use crate::domain::Callsign;
use crate::errors::{DomainError, Failures};
use crate::event_store::EventStore;
use crate::events::{Event, EventMetadata, RosterEvent};
use crate::outcome::Outcome;
use crate::projection::{fold_views, RosterProjection};
use crate::repository::AggregateRepository;
use crate::uniqueness::{normalize_key, UniquenessIndex};

/// Index scope for roster display names
pub const ROSTER_NAMES: &str = "roster name";

/// Index scope for roster callsigns
pub const ROSTER_CALLSIGNS: &str = "roster callsign";

const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Application service for the roster aggregate
pub struct RosterService<St: EventStore + ?Sized> {
    repository: AggregateRepository<RosterState, St>,
    index: Arc<UniquenessIndex>,
    clock: Arc<dyn Clock>,
    lookup: Option<Arc<CachedLookup<Arc<dyn CallsignLookup>>>>,
    max_attempts: usize,
}

impl<St: EventStore + ?Sized> RosterService<St> {
    pub fn new(
        repository: AggregateRepository<RosterState, St>,
        index: Arc<UniquenessIndex>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            index,
            clock,
            lookup: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Fill blank member display names from `lookup`, caching answers for `ttl`
    pub fn with_lookup(mut self, lookup: Arc<dyn CallsignLookup>, ttl: Duration) -> Self {
        self.lookup = Some(Arc::new(CachedLookup::new(lookup, ttl)));
        self
    }

    /// Attempts per command when writers collide; at least one
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn repository(&self) -> &AggregateRepository<RosterState, St> {
        &self.repository
    }

    pub fn index(&self) -> &Arc<UniquenessIndex> {
        &self.index
    }

    fn metadata(&self, correlation_id: Uuid) -> EventMetadata {
        EventMetadata::new(self.clock.now(), correlation_id)
    }

    /// Create a roster and return its id
    ///
    /// # Errors
    ///
    /// `Validation` for bad input or when the name or callsign is held by
    /// another roster; store errors from the save.
    #[instrument(skip(self, cancel), fields(name = %command.name, callsign = %command.callsign))]
    pub async fn create_roster(
        &self,
        command: CreateRosterCommand,
        correlation_id: Uuid,
        cancel: &CancellationToken,
    ) -> Outcome<Uuid> {
        let id = Uuid::now_v7();
        let mut root = AggregateRoot::<RosterState>::new(id);
        root.execute(self.metadata(correlation_id), |state| {
            handle_create_roster(state, command)
        })?;

        let (name, callsign) = match (&root.state().name, &root.state().callsign) {
            (Some(name), Some(callsign)) => (name.to_string(), callsign.to_string()),
            _ => return Err(DomainError::validation("roster created without identity").into()),
        };

        let name_reserved = self.index.reserve(ROSTER_NAMES, &name, id)?;
        let callsign_reserved = match self.index.reserve(ROSTER_CALLSIGNS, &callsign, id) {
            Ok(reserved) => reserved,
            Err(err) => {
                if name_reserved {
                    self.index.release(ROSTER_NAMES, &name, id);
                }
                return Err(err.into());
            }
        };

        if let Err(failures) = self.repository.save(&mut root, cancel).await {
            if name_reserved {
                self.index.release(ROSTER_NAMES, &name, id);
            }
            if callsign_reserved {
                self.index.release(ROSTER_CALLSIGNS, &callsign, id);
            }
            return Err(failures);
        }

        info!(roster_id = %id, "roster created");
        Ok(id)
    }

    /// Rename a roster, moving its name reservation
    ///
    /// Returns the roster's version afterwards. Renaming to the current name
    /// writes nothing, but still settles the index on the stored name.
    ///
    /// The new name stays reserved across conflict retries and is handed
    /// back only when the command finally fails.
    #[instrument(skip(self, cancel), fields(name = %command.name))]
    pub async fn rename_roster(
        &self,
        id: Uuid,
        command: RenameRosterCommand,
        correlation_id: Uuid,
        cancel: &CancellationToken,
    ) -> Outcome<Option<u64>> {
        let mut attempt = 1;
        let mut original: Option<String> = None;
        let mut claimed: Option<String> = None;
        let mut stored: Option<String> = None;

        let result: Outcome<Option<u64>> = loop {
            let mut root = match self.repository.load(id, cancel).await {
                Ok(root) => root,
                Err(failures) => break Err(failures),
            };
            stored = root.state().name.as_ref().map(ToString::to_string);
            if original.is_none() {
                original.clone_from(&stored);
            }

            let produced = match root.execute(self.metadata(correlation_id), |state| {
                handle_rename_roster(state, command.clone())
            }) {
                Ok(produced) => produced,
                Err(failures) => break Err(failures),
            };

            let Some(new_name) = root.state().name.as_ref().map(ToString::to_string) else {
                break Err(DomainError::validation("roster has no name").into());
            };

            if produced == 0 {
                // Possibly committed by a racing writer; the index follows the log
                if let Err(err) = self.index.reserve(ROSTER_NAMES, &new_name, id) {
                    break Err(err.into());
                }
                self.release_replaced_names(id, &new_name, [original.as_deref()]);
                debug!(roster_id = %id, "roster already carries this name");
                return Ok(root.version());
            }

            match self.index.reserve(ROSTER_NAMES, &new_name, id) {
                Ok(true) => claimed = Some(new_name.clone()),
                Ok(false) => {}
                Err(err) => break Err(err.into()),
            }

            match self.repository.save(&mut root, cancel).await {
                Ok(_) => {
                    self.release_replaced_names(
                        id,
                        &new_name,
                        [original.as_deref(), stored.as_deref()],
                    );
                    info!(roster_id = %id, version = ?root.version(), "roster renamed");
                    return Ok(root.version());
                }
                Err(failures) if self.should_retry(&failures, attempt) => attempt += 1,
                Err(failures) => break Err(failures),
            }
        };

        if let Some(name) = claimed {
            let still_named = stored
                .as_deref()
                .is_some_and(|current| normalize_key(current) == normalize_key(&name));
            if !still_named {
                self.index.release(ROSTER_NAMES, &name, id);
            }
        }
        result
    }

    /// Add a member at the end of the roster
    ///
    /// A blank display name is filled from the callsign lookup when one is
    /// configured. A failing lookup leaves it blank, which the handler then
    /// rejects.
    #[instrument(skip(self, cancel), fields(member_id = %command.member_id, callsign = %command.callsign))]
    pub async fn add_member(
        &self,
        id: Uuid,
        mut command: AddMemberCommand,
        correlation_id: Uuid,
        cancel: &CancellationToken,
    ) -> Outcome<Option<u64>> {
        if command.display_name.trim().is_empty() {
            if let Some(name) = self.resolve_operator(&command.callsign).await {
                command.display_name = name;
            }
        }

        self.update(id, correlation_id, cancel, |state| {
            handle_add_member(state, command.clone())
        })
        .await
    }

    #[instrument(skip(self, cancel), fields(member_id = %command.member_id))]
    pub async fn remove_member(
        &self,
        id: Uuid,
        command: RemoveMemberCommand,
        correlation_id: Uuid,
        cancel: &CancellationToken,
    ) -> Outcome<Option<u64>> {
        self.update(id, correlation_id, cancel, |state| {
            handle_remove_member(state, command.clone())
        })
        .await
    }

    #[instrument(skip(self, command, cancel), fields(members = command.order.len()))]
    pub async fn reorder_members(
        &self,
        id: Uuid,
        command: ReorderMembersCommand,
        correlation_id: Uuid,
        cancel: &CancellationToken,
    ) -> Outcome<Option<u64>> {
        self.update(id, correlation_id, cancel, |state| {
            handle_reorder_members(state, command.clone())
        })
        .await
    }

    /// Current state of a roster, replayed from its history
    pub async fn get_roster(&self, id: Uuid, cancel: &CancellationToken) -> Outcome<RosterState> {
        let root = self.repository.load(id, cancel).await?;
        Ok(root.state().clone())
    }

    pub async fn exists(&self, id: Uuid, cancel: &CancellationToken) -> Outcome<bool> {
        match self.repository.load(id, cancel).await {
            Ok(_) => Ok(true),
            Err(failures) if matches!(failures.first(), DomainError::NotFound(_)) => Ok(false),
            Err(failures) => Err(failures),
        }
    }

    /// Committed events of a roster from `from_version` on
    pub async fn history(
        &self,
        id: Uuid,
        from_version: u64,
        cancel: &CancellationToken,
    ) -> Outcome<Vec<Event<RosterEvent>>> {
        self.repository.get_events(id, from_version, cancel).await
    }

    /// Repopulate the uniqueness index from the event log
    ///
    /// Returns the number of keys held afterwards.
    #[instrument(skip_all)]
    pub async fn rebuild_index(&self, cancel: &CancellationToken) -> Outcome<usize> {
        let events = self.repository.get_all_events(cancel).await?;
        let views = fold_views(&RosterProjection, &events);

        let held = self.index.rebuild(views.values().flat_map(|view| {
            [
                (ROSTER_NAMES, view.name.clone(), view.roster_id),
                (ROSTER_CALLSIGNS, view.callsign.clone(), view.roster_id),
            ]
        }));
        info!(rosters = views.len(), keys = held, "uniqueness index rebuilt");
        Ok(held)
    }

    /// Load, handle, save; reload and retry on conflict
    async fn update<F>(
        &self,
        id: Uuid,
        correlation_id: Uuid,
        cancel: &CancellationToken,
        handler: F,
    ) -> Outcome<Option<u64>>
    where
        F: Fn(&RosterState) -> Outcome<Vec<RosterEvent>>,
    {
        let mut attempt = 1;
        loop {
            let mut root = self.repository.load(id, cancel).await?;
            let produced = root.execute(self.metadata(correlation_id), &handler)?;
            if produced == 0 {
                debug!(roster_id = %id, "command produced no events");
                return Ok(root.version());
            }

            match self.repository.save(&mut root, cancel).await {
                Ok(_) => return Ok(root.version()),
                Err(failures) if self.should_retry(&failures, attempt) => attempt += 1,
                Err(failures) => return Err(failures),
            }
        }
    }

    /// Release names this roster no longer carries
    fn release_replaced_names<'a>(
        &self,
        id: Uuid,
        current: &str,
        previous: impl IntoIterator<Item = Option<&'a str>>,
    ) {
        let current = normalize_key(current);
        for name in previous.into_iter().flatten() {
            if normalize_key(name) != current {
                self.index.release(ROSTER_NAMES, name, id);
            }
        }
    }

    fn should_retry(&self, failures: &Failures, attempt: usize) -> bool {
        let retry = failures.is_retryable() && attempt < self.max_attempts;
        if retry {
            warn!(attempt, max_attempts = self.max_attempts, "write conflict, reloading");
        }
        retry
    }

    async fn resolve_operator(&self, callsign: &str) -> Option<String> {
        let lookup = self.lookup.as_ref()?;
        let callsign = Callsign::new(callsign).ok()?;

        match lookup.operator_name(&callsign, self.clock.now()).await {
            Ok(name) => name,
            Err(err) => {
                warn!(%callsign, error = %err, "callsign lookup failed");
                None
            }
        }
    }
}

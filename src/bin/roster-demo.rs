// Copyright (c) 2025 - Cowboy AI, Inc.
//! Roster Demo
//!
//! Walks one roster through its lifecycle against the configured event store
//! and prints the resulting directory view.
//!
//! Run with: cargo run --bin roster-demo
//!
//! Environment:
//! - `AGGREGATE_STORE_BACKEND`: `memory` (default) or `nats`
//! - `NATS_URL`, `NATS_STREAM`, `NATS_SUBJECT_PREFIX`: used by the `nats` backend
//! - `RUST_LOG`: log filter, e.g. `cim_aggregate_store=debug`

use std::sync::Arc;

use anyhow::{Context, Result};
use cim_aggregate_store::aggregate::{
    AddMemberCommand, CreateRosterCommand, RenameRosterCommand, ReorderMembersCommand,
};
use cim_aggregate_store::config::{Backend, StoreConfig};
use cim_aggregate_store::dispatch::{Dispatcher, NatsNotifier};
use cim_aggregate_store::event_store::{EventStore, InMemoryEventStore, NatsEventStore};
use cim_aggregate_store::nats::NatsClient;
use cim_aggregate_store::projection::{
    InMemoryProjectionStore, ProjectionRunner, RosterDirectory, RosterProjection, RosterView,
};
use cim_aggregate_store::repository::AggregateRepository;
use cim_aggregate_store::service::{RosterService, SystemClock};
use cim_aggregate_store::uniqueness::UniquenessIndex;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = StoreConfig::from_env().context("Invalid store configuration")?;
    info!(backend = ?config.backend, prefix = %config.subject_prefix, "Starting roster demo");

    let dispatcher = Dispatcher::new();
    let mut subscriptions = Vec::new();
    let store: Arc<dyn EventStore> = match config.backend {
        Backend::Memory => Arc::new(InMemoryEventStore::new()),
        Backend::Nats => {
            info!(url = config.nats_url(), stream = %config.jetstream.stream_name, "Connecting to NATS");
            let client = NatsClient::new(config.nats.clone())
                .await
                .context("Failed to connect to NATS")?;
            let store = NatsEventStore::with_context(
                client.jetstream(),
                config.jetstream.clone(),
                config.subject_prefix.clone(),
            )
            .await
            .context("Failed to open JetStream event store")?;

            subscriptions.push(dispatcher.subscribe(Arc::new(NatsNotifier::new(
                client,
                config.subject_prefix.clone(),
            ))));
            Arc::new(store)
        }
    };

    let views = Arc::new(InMemoryProjectionStore::<RosterView>::new());
    let runner = Arc::new(ProjectionRunner::new(RosterProjection, Arc::clone(&views)));
    subscriptions.push(dispatcher.subscribe(Arc::clone(&runner)));

    let repository = AggregateRepository::new(Arc::clone(&store)).with_dispatcher(dispatcher.clone());
    let service = RosterService::new(
        repository,
        Arc::new(UniquenessIndex::new()),
        Arc::new(SystemClock),
    );

    let cancel = CancellationToken::new();
    let keys = service
        .rebuild_index(&cancel)
        .await
        .context("Failed to rebuild uniqueness index")?;
    info!(keys, "Uniqueness index ready");

    let correlation_id = Uuid::now_v7();
    // Names and callsigns stay unique across runs against a persistent stream
    let tag = correlation_id.simple().to_string();
    let suffix = &tag[tag.len() - 6..];
    let roster_id = service
        .create_roster(
            CreateRosterCommand {
                name: format!("Sunday Net {suffix}"),
                callsign: format!("W1{}", &suffix[..4]),
            },
            correlation_id,
            &cancel,
        )
        .await
        .context("Failed to create roster")?;
    info!(%roster_id, "Roster created");

    let members = [
        ("K1ABC", "Alice Baker"),
        ("N2XYZ", "Bob Young"),
        ("KD9QRS", "Carol Stone"),
    ];
    let mut member_ids = Vec::with_capacity(members.len());
    for (callsign, display_name) in members {
        let member_id = Uuid::now_v7();
        service
            .add_member(
                roster_id,
                AddMemberCommand {
                    member_id,
                    callsign: callsign.to_string(),
                    display_name: display_name.to_string(),
                },
                correlation_id,
                &cancel,
            )
            .await
            .with_context(|| format!("Failed to add {callsign}"))?;
        member_ids.push(member_id);
    }

    service
        .rename_roster(
            roster_id,
            RenameRosterCommand {
                name: format!("Monday Net {suffix}"),
            },
            correlation_id,
            &cancel,
        )
        .await
        .context("Failed to rename roster")?;

    member_ids.reverse();
    let version = service
        .reorder_members(
            roster_id,
            ReorderMembersCommand { order: member_ids },
            correlation_id,
            &cancel,
        )
        .await
        .context("Failed to reorder members")?;
    info!(?version, "Scenario complete");

    // Live delivery is asynchronous; fold the log once more so the printout is current
    let rebuilt = runner
        .rebuild(store.as_ref(), &cancel)
        .await
        .context("Failed to rebuild roster directory")?;
    info!(views = rebuilt, "Roster directory rebuilt");

    let directory = RosterDirectory::new(views);
    if let Some(view) = directory.get_by_id(roster_id).await? {
        println!("{} ({}) v{:?}", view.name, view.callsign, view.version);
        for member in &view.members {
            println!("  {}. {} {}", member.rank + 1, member.callsign, member.display_name);
        }
    }

    for subscription in subscriptions {
        subscription.unsubscribe().await;
    }
    dispatcher.shutdown();
    info!("Roster demo finished");
    Ok(())
}

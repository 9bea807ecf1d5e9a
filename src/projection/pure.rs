// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pure Projection Folding
//!
//! Projections are pure functions `(Option<View>, Event) → ProjectionUpdate`.
//! No I/O happens here, which makes replay trivial: fold the events through
//! the projection one by one and keep the resulting views in memory.
//!
//! ```text
//! views = {}
//! for event in log:
//!     match fold(views[event.aggregate_id], event):
//!         Upsert(v) → views[id] = v
//!         Delete    → remove views[id]
//!         Ignore    → ()
//! ```
//!
//! The async [`ProjectionRunner`](super::ProjectionRunner) performs the same
//! steps against a store, one event at a time.

use std::collections::BTreeMap;

use uuid::Uuid;

use super::{Projection, ProjectionUpdate};
use crate::events::Event;

/// Fold one event into an in-memory view map
pub fn fold_into<P: Projection>(
    projection: &P,
    views: &mut BTreeMap<Uuid, P::View>,
    event: &Event<P::Event>,
) {
    let id = event.aggregate_id;
    match projection.fold(views.get(&id), event) {
        ProjectionUpdate::Upsert(view) => {
            views.insert(id, view);
        }
        ProjectionUpdate::Delete => {
            views.remove(&id);
        }
        ProjectionUpdate::Ignore => {}
    }
}

/// Fold a whole event sequence from empty views
///
/// Events must be in log order; within one aggregate that means version
/// order.
pub fn fold_views<'a, P, I>(projection: &P, events: I) -> BTreeMap<Uuid, P::View>
where
    P: Projection,
    I: IntoIterator<Item = &'a Event<P::Event>>,
{
    events.into_iter().fold(BTreeMap::new(), |mut views, event| {
        fold_into(projection, &mut views, event);
        views
    })
}

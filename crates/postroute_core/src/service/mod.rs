//! Use-case services of the route core.
//!
//! # Responsibility
//! - Orchestrate repositories, the geocoder and the route cache.
//! - Propagate data changes to route invalidation.
//!
//! # Invariants
//! - Services never bypass repository validation.
//! - A failed lookup, a missing waypoint or an unavailable cache store never
//!   fails a route request; it only shortens or recomputes the route.

use crate::model::correspondence::{CorrespondentId, ItemId};
use crate::model::place::PlaceId;

pub mod correspondence_service;
pub mod location_directory;
pub mod route_aggregator;
pub mod route_cache;
pub mod waypoint_builder;

/// Receives notifications about data that routes are derived from.
pub trait ChangeObserver {
    /// Sender, addressee, censor or postmark associations of `item` changed.
    fn item_changed(&self, item: ItemId);
    /// Coordinates of `place` changed.
    fn place_changed(&self, place: PlaceId);
    /// The place of `correspondent` changed.
    fn correspondent_changed(&self, correspondent: CorrespondentId);
}

//! Waypoint builder: correspondence item to ordered journey.
//!
//! # Invariants
//! - Order is sender, censor, postmarks, addressee.
//! - Postmarks sort by arrival order (present before absent), then date
//!   (present before absent), then insertion position.
//! - A waypoint without a place or without coordinates is skipped; the rest
//!   of the chain keeps its order.

use crate::model::correspondence::{CorrespondenceItem, Correspondent, ItemPostmark};
use crate::model::place::Place;
use crate::model::route::{Route, Waypoint, WaypointKind};
use log::info;
use std::cmp::Ordering;

/// Route construction seam; the cache is generic over it.
pub trait BuildRoute {
    fn build(&self, item: &CorrespondenceItem) -> Route;
}

impl<B: BuildRoute + ?Sized> BuildRoute for &B {
    fn build(&self, item: &CorrespondenceItem) -> Route {
        (**self).build(item)
    }
}

/// Default route builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaypointBuilder;

impl BuildRoute for WaypointBuilder {
    fn build(&self, item: &CorrespondenceItem) -> Route {
        let mut route = Route::empty(item.id);

        push_correspondent(&mut route, WaypointKind::Sender, item.sender.as_ref());
        push_place(&mut route, WaypointKind::Censor, item.censor.as_ref(), false);
        for entry in ordered_postmarks(&item.postmarks) {
            push_place(
                &mut route,
                WaypointKind::Postmark,
                entry.postmark.place.as_ref(),
                true,
            );
        }
        push_correspondent(&mut route, WaypointKind::Addressee, item.addressee.as_ref());

        route
    }
}

/// Returns postmarks in journey order.
pub fn ordered_postmarks(postmarks: &[ItemPostmark]) -> Vec<&ItemPostmark> {
    let mut ordered: Vec<&ItemPostmark> = postmarks.iter().collect();
    ordered.sort_by(|a, b| compare_postmarks(a, b));
    ordered
}

fn compare_postmarks(a: &ItemPostmark, b: &ItemPostmark) -> Ordering {
    present_first(a.postmark.arrival_order, b.postmark.arrival_order)
        .then_with(|| present_first(a.postmark.date, b.postmark.date))
        .then_with(|| a.position.cmp(&b.position))
}

fn present_first<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn push_correspondent(
    route: &mut Route,
    kind: WaypointKind,
    correspondent: Option<&Correspondent>,
) {
    let Some(correspondent) = correspondent else {
        info!(
            "event=waypoint_skip module=route item_id={} kind={} reason=missing_correspondent",
            route.item_id,
            kind.as_str()
        );
        return;
    };
    push_place(route, kind, correspondent.place.as_ref(), true);
}

fn push_place(route: &mut Route, kind: WaypointKind, place: Option<&Place>, expected: bool) {
    let Some(place) = place else {
        // Censor is optional; only expected waypoints log their absence.
        if expected {
            info!(
                "event=waypoint_skip module=route item_id={} kind={} reason=missing_place",
                route.item_id,
                kind.as_str()
            );
        }
        return;
    };

    match place.coordinates {
        Some(coordinates) => route
            .waypoints
            .push(Waypoint::new(kind, place.id, coordinates)),
        None => info!(
            "event=waypoint_skip module=route item_id={} kind={} place_id={} reason=missing_coordinates",
            route.item_id,
            kind.as_str(),
            place.id
        ),
    }
}

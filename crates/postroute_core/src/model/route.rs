//! Derived route projection.
//!
//! Routes are rebuilt from correspondence items and may be cached, but are
//! never persisted as source of truth.

use crate::model::correspondence::ItemId;
use crate::model::place::{Coordinates, PlaceId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;

/// Role of a waypoint in a journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaypointKind {
    Sender,
    Censor,
    Postmark,
    Addressee,
}

impl WaypointKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sender => "sender",
            Self::Censor => "censor",
            Self::Postmark => "postmark",
            Self::Addressee => "addressee",
        }
    }
}

/// One geocoded point of a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub kind: WaypointKind,
    pub place_id: PlaceId,
    pub latitude: f64,
    pub longitude: f64,
}

impl Waypoint {
    pub fn new(kind: WaypointKind, place_id: PlaceId, coordinates: Coordinates) -> Self {
        Self {
            kind,
            place_id,
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Ordered waypoints of one correspondence item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub item_id: ItemId,
    pub waypoints: Vec<Waypoint>,
}

impl Route {
    pub fn empty(item_id: ItemId) -> Self {
        Self {
            item_id,
            waypoints: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Whether at least one edge can be drawn.
    pub fn is_renderable(&self) -> bool {
        self.waypoints.len() >= 2
    }
}

/// Consecutive waypoint pair, the unit rendered as a map line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// `<item_id>:<segment index>`, stable across recomputation.
    pub id: String,
    /// Ordinal of the owning item within its route set.
    pub route_index: usize,
    pub item_id: ItemId,
    pub from: Waypoint,
    pub to: Waypoint,
}

impl Edge {
    pub(crate) fn geometry_key(&self) -> ((u64, u64), (u64, u64)) {
        (self.from.coordinates().bits(), self.to.coordinates().bits())
    }
}

/// Renderable edges for a collection of items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteSet {
    pub edges: Vec<Edge>,
    /// Items whose route had fewer than two waypoints.
    pub skipped_items: usize,
}

impl RouteSet {
    /// GeoJSON FeatureCollection with one LineString per edge.
    pub fn to_geojson(&self) -> Value {
        let features = self
            .edges
            .iter()
            .map(|edge| {
                json!({
                    "type": "Feature",
                    "properties": {
                        "id": edge.route_index,
                        "edge_id": edge.id,
                        "item_id": edge.item_id.to_string(),
                        "from_kind": edge.from.kind.as_str(),
                        "to_kind": edge.to.kind.as_str(),
                    },
                    "geometry": {
                        "type": "LineString",
                        "coordinates": [
                            edge.from.coordinates().to_lon_lat(),
                            edge.to.coordinates().to_lon_lat(),
                        ],
                    },
                })
            })
            .collect::<Vec<_>>();

        json!({ "type": "FeatureCollection", "features": features })
    }

    /// GeoJSON FeatureCollection of distinct waypoints as Points.
    ///
    /// A place visited in two roles yields one point per role.
    pub fn points_geojson(&self) -> Value {
        let mut seen = HashSet::new();
        let mut features = Vec::new();
        for waypoint in self.edges.iter().flat_map(|edge| [&edge.from, &edge.to]) {
            if !seen.insert((waypoint.place_id, waypoint.kind)) {
                continue;
            }
            features.push(json!({
                "type": "Feature",
                "properties": {
                    "place_id": waypoint.place_id.to_string(),
                    "point_type": waypoint.kind.as_str(),
                },
                "geometry": {
                    "type": "Point",
                    "coordinates": waypoint.coordinates().to_lon_lat(),
                },
            }));
        }

        json!({ "type": "FeatureCollection", "features": features })
    }
}

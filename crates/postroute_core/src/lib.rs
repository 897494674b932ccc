//! Correspondence route core.
//!
//! Reconstructs the journeys of archived postal items (sender, censor,
//! postmarks, addressee) as geocoded waypoint chains, caches them, and
//! aggregates them into map-ready edge sets.

pub mod config;
pub mod db;
pub mod geocode;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{AggregateConfig, CacheConfig, CoreConfig, DirectoryConfig, GeocoderConfig};
pub use geocode::{
    DisabledGeocoder, GeocodeError, GeocodeResult, Geocoder, NominatimGeocoder, PlaceQuery,
    ThrottledGeocoder,
};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget, LoggingError};
pub use model::correspondence::{
    fold_display_name, CorrespondenceItem, Correspondent, CorrespondentDraft, CorrespondentId,
    CorrespondentName, ItemDraft, ItemId, ItemPostmark, Postmark, PostmarkDraft, PostmarkId,
};
pub use model::place::{Coordinates, GeocodeStatus, Place, PlaceDraft, PlaceId, PlaceKey};
pub use model::route::{Edge, Route, RouteSet, Waypoint, WaypointKind};
pub use model::validation::ValidationError;
pub use repo::correspondence_repo::{
    CorrespondenceRepository, CorrespondenceSource, SqliteCorrespondenceRepository,
};
pub use repo::place_repo::{
    GeocodeCandidateQuery, PlaceRepository, RepoError, RepoResult, SqlitePlaceRepository,
};
pub use service::correspondence_service::CorrespondenceService;
pub use service::location_directory::{BackfillOptions, BackfillReport, LocationDirectory};
pub use service::route_aggregator::{edges_for_route, RouteAggregator};
pub use service::route_cache::{CacheStoreError, MemoryRouteStore, RouteCache, RouteStore};
pub use service::waypoint_builder::{ordered_postmarks, BuildRoute, WaypointBuilder};
pub use service::ChangeObserver;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

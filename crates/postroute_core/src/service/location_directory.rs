//! Location directory: deduplicated places plus coordinate backfill.
//!
//! # Responsibility
//! - Resolve a (town/city, province/state, country) triple to one place.
//! - Geocode new places once, and run explicit backfill passes later.
//!
//! # Invariants
//! - `get_or_create` is idempotent over the normalized key.
//! - The geocoder runs at most once per creation, never per lookup.
//! - A place that cannot be geocoded stays valid without coordinates.

use crate::config::DirectoryConfig;
use crate::geocode::{Geocoder, PlaceQuery};
use crate::model::place::{Coordinates, GeocodeStatus, Place, PlaceDraft, PlaceId};
use crate::repo::place_repo::{GeocodeCandidateQuery, PlaceRepository, RepoError, RepoResult};
use crate::service::ChangeObserver;
use log::{info, warn};
use serde::Serialize;

/// Options for one backfill pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillOptions {
    pub limit: Option<u32>,
    pub retry_unresolved: bool,
}

/// Outcome counters of one backfill pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub attempted: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub failed: usize,
}

/// Place registry over a repository and a geocoder.
pub struct LocationDirectory<'obs, R: PlaceRepository, G: Geocoder> {
    repo: R,
    geocoder: G,
    config: DirectoryConfig,
    observer: Option<&'obs dyn ChangeObserver>,
}

impl<'obs, R: PlaceRepository, G: Geocoder> LocationDirectory<'obs, R, G> {
    pub fn new(repo: R, geocoder: G, config: DirectoryConfig) -> Self {
        Self {
            repo,
            geocoder,
            config,
            observer: None,
        }
    }

    /// Registers the observer told about coordinate changes.
    pub fn with_observer(mut self, observer: &'obs dyn ChangeObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Returns the canonical place for the key, creating it when absent.
    ///
    /// # Errors
    /// - `RepoError::Validation` when the town/city is blank.
    /// - Storage errors from the repository. Geocoding problems are never
    ///   returned; the place is kept without coordinates.
    pub fn get_or_create(
        &self,
        town_city: &str,
        province_state: &str,
        country: &str,
    ) -> RepoResult<Place> {
        let draft = PlaceDraft::new(town_city, province_state, country)?;
        let (place, created) = self.repo.insert_or_get_place(&draft)?;
        if !created {
            return Ok(place);
        }

        info!(
            "event=place_create module=directory status=ok place_id={} label={}",
            place.id,
            place.label()
        );
        if !self.config.geocode_on_create || place.coordinates.is_some() {
            return Ok(place);
        }

        self.geocode_place(&place)?;
        self.reload(place.id)
    }

    pub fn get(&self, id: PlaceId) -> RepoResult<Option<Place>> {
        self.repo.get_place(id)
    }

    pub fn list(&self) -> RepoResult<Vec<Place>> {
        self.repo.list_places()
    }

    /// Sets or clears coordinates by hand.
    ///
    /// Clearing resets the place to `pending` so a later backfill retries it.
    pub fn set_coordinates(
        &self,
        id: PlaceId,
        coordinates: Option<Coordinates>,
    ) -> RepoResult<Place> {
        let status = if coordinates.is_some() {
            GeocodeStatus::Resolved
        } else {
            GeocodeStatus::Pending
        };
        self.repo.set_place_coordinates(id, coordinates, status)?;
        self.notify(id);
        self.reload(id)
    }

    /// Geocodes places still missing coordinates.
    ///
    /// Visits `pending` and `failed` places, plus `unresolved` ones when
    /// `retry_unresolved` is set. Lookups go through the configured geocoder,
    /// so throttling applies when it is wrapped in `ThrottledGeocoder`.
    pub fn backfill_coordinates(&self, options: &BackfillOptions) -> RepoResult<BackfillReport> {
        let candidates = self.repo.list_geocode_candidates(&GeocodeCandidateQuery {
            include_unresolved: options.retry_unresolved,
            limit: options.limit,
        })?;

        let mut report = BackfillReport::default();
        for place in &candidates {
            report.attempted += 1;
            match self.geocode_place(place)? {
                GeocodeStatus::Resolved => report.resolved += 1,
                GeocodeStatus::Unresolved => report.unresolved += 1,
                GeocodeStatus::Failed => report.failed += 1,
                GeocodeStatus::Pending => {}
            }
        }

        info!(
            "event=place_backfill module=directory status=ok attempted={} resolved={} unresolved={} failed={}",
            report.attempted, report.resolved, report.unresolved, report.failed
        );
        Ok(report)
    }

    fn geocode_place(&self, place: &Place) -> RepoResult<GeocodeStatus> {
        let query = PlaceQuery::from(place);
        let (coordinates, status) = match self.geocoder.geocode(&query) {
            Ok(Some(coordinates)) => (Some(coordinates), GeocodeStatus::Resolved),
            Ok(None) => {
                info!(
                    "event=place_geocode module=directory status=no_match place_id={} query={}",
                    place.id,
                    query.to_query_string()
                );
                (None, GeocodeStatus::Unresolved)
            }
            Err(err) if !err.is_transient() => {
                info!(
                    "event=place_geocode module=directory status=malformed place_id={} error={}",
                    place.id, err
                );
                (None, GeocodeStatus::Unresolved)
            }
            Err(err) => {
                warn!(
                    "event=place_geocode module=directory status=error place_id={} error={}",
                    place.id, err
                );
                (None, GeocodeStatus::Failed)
            }
        };

        self.repo
            .set_place_coordinates(place.id, coordinates, status)?;
        if coordinates.is_some() {
            self.notify(place.id);
        }
        Ok(status)
    }

    fn reload(&self, id: PlaceId) -> RepoResult<Place> {
        self.repo.get_place(id)?.ok_or(RepoError::NotFound(id))
    }

    fn notify(&self, id: PlaceId) {
        if let Some(observer) = self.observer {
            observer.place_changed(id);
        }
    }
}

//! Route cache: memoized routes keyed by correspondence item.
//!
//! # Responsibility
//! - Serve routes from an injected `RouteStore` within the TTL.
//! - Recompute on miss, expiry or invalidation.
//! - Translate data changes into invalidations (`ChangeObserver`).
//!
//! # Invariants
//! - Store failures are logged and bypassed (fail-open); a route request
//!   never fails because of the store.
//! - At most one computation per key is in flight; concurrent misses wait
//!   for it and then read the stored result.
//! - A computation that overlaps an invalidation of its item, or of all
//!   items, is returned but not stored. Invalidating one item leaves other
//!   in-flight computations storable.

use crate::config::CacheConfig;
use crate::model::correspondence::{CorrespondentId, ItemId};
use crate::model::place::PlaceId;
use crate::model::route::Route;
use crate::repo::correspondence_repo::CorrespondenceSource;
use crate::service::waypoint_builder::{BuildRoute, WaypointBuilder};
use crate::service::ChangeObserver;
use log::{debug, error, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Failure of the cache store itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStoreError {
    Unavailable(String),
}

impl Display for CacheStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "route store unavailable: {reason}"),
        }
    }
}

impl Error for CacheStoreError {}

/// Key-value store with per-entry expiry.
pub trait RouteStore {
    fn get(&self, item: ItemId) -> Result<Option<Route>, CacheStoreError>;
    fn put(&self, item: ItemId, route: &Route, ttl: Duration) -> Result<(), CacheStoreError>;
    fn remove(&self, item: ItemId) -> Result<(), CacheStoreError>;
    fn clear(&self) -> Result<(), CacheStoreError>;
}

struct StoredRoute {
    route: Route,
    expires_at: Instant,
}

/// In-process route store.
#[derive(Default)]
pub struct MemoryRouteStore {
    entries: Mutex<HashMap<ItemId, StoredRoute>>,
}

impl MemoryRouteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<ItemId, StoredRoute>>, CacheStoreError> {
        self.entries
            .lock()
            .map_err(|_| CacheStoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl RouteStore for MemoryRouteStore {
    fn get(&self, item: ItemId) -> Result<Option<Route>, CacheStoreError> {
        let mut entries = self.lock()?;
        match entries.get(&item) {
            Some(stored) if Instant::now() < stored.expires_at => Ok(Some(stored.route.clone())),
            Some(_) => {
                entries.remove(&item);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn put(&self, item: ItemId, route: &Route, ttl: Duration) -> Result<(), CacheStoreError> {
        let expires_at = Instant::now() + ttl;
        self.lock()?.insert(
            item,
            StoredRoute {
                route: route.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    fn remove(&self, item: ItemId) -> Result<(), CacheStoreError> {
        self.lock()?.remove(&item);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheStoreError> {
        self.lock()?.clear();
        Ok(())
    }
}

/// Per-item computation slot; lives only while a computation is in flight.
#[derive(Default)]
struct Gate {
    in_flight: Mutex<()>,
    generation: AtomicU64,
}

/// Invalidation state shared by computations and invalidations.
#[derive(Default)]
struct InFlight {
    epoch: u64,
    gates: HashMap<ItemId, Arc<Gate>>,
}

/// Generations observed when a computation started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    epoch: u64,
    generation: u64,
}

/// Memoizing front of the waypoint builder.
pub struct RouteCache<S, C, B = WaypointBuilder> {
    source: S,
    store: C,
    builder: B,
    ttl: Duration,
    in_flight: Mutex<InFlight>,
}

impl<S, C, B> RouteCache<S, C, B>
where
    S: CorrespondenceSource,
    C: RouteStore,
    B: BuildRoute,
{
    pub fn new(source: S, store: C, builder: B, config: &CacheConfig) -> Self {
        Self {
            source,
            store,
            builder,
            ttl: config.ttl,
            in_flight: Mutex::new(InFlight::default()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the route of `item`, computing and storing it on a miss.
    ///
    /// A missing item or a source failure yields an empty, uncached route.
    pub fn get_route(&self, item: ItemId) -> Route {
        if let Some(route) = self.lookup(item) {
            return route;
        }

        let gate = self.gate(item);
        let route = {
            let _in_flight = gate
                .in_flight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match self.lookup(item) {
                Some(route) => route,
                None => self.compute_and_store(item, &gate),
            }
        };
        self.release_gate(item, &gate);
        route
    }

    /// Drops the stored route of `item`.
    ///
    /// Blocks while a store of `item` is being written, so the next
    /// `get_route` never sees the route computed before this call.
    pub fn invalidate(&self, item: ItemId) {
        let in_flight = self.in_flight();
        if let Some(gate) = in_flight.gates.get(&item) {
            gate.generation.fetch_add(1, Ordering::SeqCst);
        }
        if let Err(err) = self.store.remove(item) {
            warn!(
                "event=route_invalidate module=route_cache status=error item_id={item} error={err}"
            );
        }
    }

    /// Drops every stored route.
    pub fn invalidate_all(&self) {
        let mut in_flight = self.in_flight();
        in_flight.epoch += 1;
        if let Err(err) = self.store.clear() {
            warn!("event=route_invalidate_all module=route_cache status=error error={err}");
        }
    }

    fn lookup(&self, item: ItemId) -> Option<Route> {
        match self.store.get(item) {
            Ok(hit) => hit,
            Err(err) => {
                warn!(
                    "event=route_cache_get module=route_cache status=fallback item_id={item} error={err}"
                );
                None
            }
        }
    }

    fn compute_and_store(&self, item: ItemId, gate: &Gate) -> Route {
        let snapshot = self.snapshot(gate);
        let loaded = match self.source.load_item(item) {
            Ok(Some(loaded)) => loaded,
            Ok(None) => {
                warn!("event=route_compute module=route_cache status=not_found item_id={item}");
                return Route::empty(item);
            }
            Err(err) => {
                error!(
                    "event=route_compute module=route_cache status=error item_id={item} error={err}"
                );
                return Route::empty(item);
            }
        };

        let route = self.builder.build(&loaded);
        debug!(
            "event=route_compute module=route_cache status=ok item_id={item} waypoints={}",
            route.len()
        );
        self.store_if_current(item, gate, snapshot, &route);
        route
    }

    // Check and write happen under the in-flight lock that invalidations take.
    fn store_if_current(&self, item: ItemId, gate: &Gate, snapshot: Snapshot, route: &Route) {
        let in_flight = self.in_flight();
        let current = Snapshot {
            epoch: in_flight.epoch,
            generation: gate.generation.load(Ordering::SeqCst),
        };
        if current != snapshot {
            debug!(
                "event=route_store module=route_cache status=skipped item_id={item} reason=invalidated"
            );
            return;
        }
        if let Err(err) = self.store.put(item, route, self.ttl) {
            warn!(
                "event=route_store module=route_cache status=fallback item_id={item} error={err}"
            );
        }
    }

    fn snapshot(&self, gate: &Gate) -> Snapshot {
        let in_flight = self.in_flight();
        Snapshot {
            epoch: in_flight.epoch,
            generation: gate.generation.load(Ordering::SeqCst),
        }
    }

    fn in_flight(&self) -> MutexGuard<'_, InFlight> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn gate(&self, item: ItemId) -> Arc<Gate> {
        let mut in_flight = self.in_flight();
        Arc::clone(in_flight.gates.entry(item).or_default())
    }

    fn release_gate(&self, item: ItemId, gate: &Arc<Gate>) {
        let mut in_flight = self.in_flight();
        // Two references left: the map's and ours, so nobody is waiting.
        let idle = in_flight
            .gates
            .get(&item)
            .is_some_and(|current| Arc::ptr_eq(current, gate) && Arc::strong_count(gate) == 2);
        if idle {
            in_flight.gates.remove(&item);
        }
    }

    fn invalidate_many(&self, items: Vec<ItemId>) {
        for item in items {
            self.invalidate(item);
        }
    }
}

impl<S, C, B> ChangeObserver for RouteCache<S, C, B>
where
    S: CorrespondenceSource,
    C: RouteStore,
    B: BuildRoute,
{
    fn item_changed(&self, item: ItemId) {
        self.invalidate(item);
    }

    fn place_changed(&self, place: PlaceId) {
        match self.source.items_referencing_place(place) {
            Ok(items) => self.invalidate_many(items),
            Err(err) => {
                warn!(
                    "event=route_invalidate module=route_cache status=fallback place_id={place} error={err}"
                );
                self.invalidate_all();
            }
        }
    }

    fn correspondent_changed(&self, correspondent: CorrespondentId) {
        match self.source.items_referencing_correspondent(correspondent) {
            Ok(items) => self.invalidate_many(items),
            Err(err) => {
                warn!(
                    "event=route_invalidate module=route_cache status=fallback \
                     correspondent_id={correspondent} error={err}"
                );
                self.invalidate_all();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryRouteStore, RouteStore};
    use crate::model::route::Route;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn memory_store_expires_entries() {
        let store = MemoryRouteStore::new();
        let live = Uuid::new_v4();
        let expired = Uuid::new_v4();

        store
            .put(live, &Route::empty(live), Duration::from_secs(60))
            .unwrap();
        store
            .put(expired, &Route::empty(expired), Duration::ZERO)
            .unwrap();

        assert_eq!(store.get(live).unwrap(), Some(Route::empty(live)));
        assert_eq!(store.get(expired).unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn memory_store_remove_and_clear() {
        let store = MemoryRouteStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.put(a, &Route::empty(a), Duration::from_secs(60)).unwrap();
        store.put(b, &Route::empty(b), Duration::from_secs(60)).unwrap();

        store.remove(a).unwrap();
        assert_eq!(store.get(a).unwrap(), None);
        assert!(store.get(b).unwrap().is_some());

        store.clear().unwrap();
        assert!(store.is_empty());
    }
}

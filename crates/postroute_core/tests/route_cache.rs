mod common;

use common::{arnhem_berlin_new_york, person, place, CountingBuilder, MemorySource};
use postroute_core::db::open_db_in_memory;
use postroute_core::{
    CacheConfig, CacheStoreError, ChangeObserver, Coordinates, CorrespondenceService,
    CorrespondentDraft, CorrespondentName, DirectoryConfig, DisabledGeocoder, ItemDraft, ItemId,
    LocationDirectory, MemoryRouteStore, PostmarkDraft, Route, RouteCache, RouteStore,
    SqliteCorrespondenceRepository, SqlitePlaceRepository, WaypointBuilder, WaypointKind,
};
use std::time::Duration;

struct FailingStore;

impl RouteStore for FailingStore {
    fn get(&self, _item: ItemId) -> Result<Option<Route>, CacheStoreError> {
        Err(CacheStoreError::Unavailable("connection refused".to_string()))
    }

    fn put(&self, _item: ItemId, _route: &Route, _ttl: Duration) -> Result<(), CacheStoreError> {
        Err(CacheStoreError::Unavailable("connection refused".to_string()))
    }

    fn remove(&self, _item: ItemId) -> Result<(), CacheStoreError> {
        Err(CacheStoreError::Unavailable("connection refused".to_string()))
    }

    fn clear(&self) -> Result<(), CacheStoreError> {
        Err(CacheStoreError::Unavailable("connection refused".to_string()))
    }
}

/// Memory store whose writes take a while.
struct SlowPutStore {
    inner: MemoryRouteStore,
    delay: Duration,
}

impl RouteStore for SlowPutStore {
    fn get(&self, item: ItemId) -> Result<Option<Route>, CacheStoreError> {
        self.inner.get(item)
    }

    fn put(&self, item: ItemId, route: &Route, ttl: Duration) -> Result<(), CacheStoreError> {
        std::thread::sleep(self.delay);
        self.inner.put(item, route, ttl)
    }

    fn remove(&self, item: ItemId) -> Result<(), CacheStoreError> {
        self.inner.remove(item)
    }

    fn clear(&self) -> Result<(), CacheStoreError> {
        self.inner.clear()
    }
}

fn long_ttl() -> CacheConfig {
    CacheConfig {
        ttl: Duration::from_secs(3600),
    }
}

#[test]
fn repeated_requests_hit_the_cache() {
    let item = arnhem_berlin_new_york();
    let id = item.id;
    let builder = CountingBuilder::default();
    let cache = RouteCache::new(
        MemorySource::with_items(vec![item]),
        MemoryRouteStore::new(),
        &builder,
        &long_ttl(),
    );

    let first = cache.get_route(id);
    let second = cache.get_route(id);

    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    assert_eq!(builder.calls(), 1);
    assert_eq!(cache.store().len(), 1);
}

#[test]
fn invalidation_forces_recompute_with_fresh_data() {
    let item = arnhem_berlin_new_york();
    let id = item.id;
    let builder = CountingBuilder::default();
    let cache = RouteCache::new(
        MemorySource::with_items(vec![item.clone()]),
        MemoryRouteStore::new(),
        &builder,
        &long_ttl(),
    );
    assert_eq!(cache.get_route(id).len(), 3);

    let mut edited = item;
    edited.addressee = None;
    cache.source().replace(edited);

    // Stale until someone invalidates.
    assert_eq!(cache.get_route(id).len(), 3);
    cache.invalidate(id);
    assert_eq!(cache.get_route(id).len(), 2);
    assert_eq!(builder.calls(), 2);
}

#[test]
fn expired_entries_are_recomputed() {
    let item = arnhem_berlin_new_york();
    let id = item.id;
    let builder = CountingBuilder::default();
    let cache = RouteCache::new(
        MemorySource::with_items(vec![item]),
        MemoryRouteStore::new(),
        &builder,
        &CacheConfig { ttl: Duration::ZERO },
    );

    cache.get_route(id);
    cache.get_route(id);
    assert_eq!(builder.calls(), 2);
}

#[test]
fn unavailable_store_falls_back_to_direct_computation() {
    let item = arnhem_berlin_new_york();
    let id = item.id;
    let builder = CountingBuilder::default();
    let cache = RouteCache::new(
        MemorySource::with_items(vec![item]),
        FailingStore,
        &builder,
        &long_ttl(),
    );

    assert_eq!(cache.get_route(id).len(), 3);
    assert_eq!(cache.get_route(id).len(), 3);
    cache.invalidate(id);
    cache.invalidate_all();
    assert_eq!(builder.calls(), 2);
}

#[test]
fn unknown_item_yields_empty_uncached_route() {
    let cache = RouteCache::new(
        MemorySource::default(),
        MemoryRouteStore::new(),
        CountingBuilder::default(),
        &long_ttl(),
    );
    let missing = uuid::Uuid::new_v4();

    assert_eq!(cache.get_route(missing), Route::empty(missing));
    assert!(cache.store().is_empty());
}

#[test]
fn concurrent_misses_compute_once() {
    let item = arnhem_berlin_new_york();
    let id = item.id;
    let builder = CountingBuilder::slow(Duration::from_millis(50));
    let cache = RouteCache::new(
        MemorySource::with_items(vec![item]),
        MemoryRouteStore::new(),
        &builder,
        &long_ttl(),
    );

    let routes: Vec<Route> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| cache.get_route(id)))
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert_eq!(builder.calls(), 1);
    assert!(routes.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn place_change_invalidates_only_referencing_items() {
    let moved = arnhem_berlin_new_york();
    let arnhem = moved.sender.as_ref().unwrap().place.clone().unwrap();
    let mut untouched = arnhem_berlin_new_york();
    untouched.sender = Some(person(
        "Anna",
        "Visser",
        Some(place("Utrecht", "Netherlands", Some((52.09, 5.12)))),
    ));
    let (moved_id, untouched_id) = (moved.id, untouched.id);

    let builder = CountingBuilder::default();
    let cache = RouteCache::new(
        MemorySource::with_items(vec![moved, untouched]),
        MemoryRouteStore::new(),
        &builder,
        &long_ttl(),
    );
    cache.get_route(moved_id);
    cache.get_route(untouched_id);
    assert_eq!(builder.calls(), 2);

    cache.place_changed(arnhem.id);
    cache.get_route(moved_id);
    cache.get_route(untouched_id);
    assert_eq!(builder.calls(), 3);
}

#[test]
fn writes_through_services_invalidate_persisted_routes() {
    let conn = open_db_in_memory().unwrap();
    let builder = CountingBuilder::default();
    let cache = RouteCache::new(
        SqliteCorrespondenceRepository::new(&conn),
        MemoryRouteStore::new(),
        &builder,
        &long_ttl(),
    );
    let directory = LocationDirectory::new(
        SqlitePlaceRepository::new(&conn),
        DisabledGeocoder,
        DirectoryConfig::default(),
    )
    .with_observer(&cache);
    let service = CorrespondenceService::new(SqliteCorrespondenceRepository::new(&conn))
        .with_observer(&cache);

    let arnhem = directory.get_or_create("Arnhem", "", "Netherlands").unwrap();
    directory
        .set_coordinates(arnhem.id, Some(Coordinates::new(52.0, 5.9).unwrap()))
        .unwrap();
    let new_york = directory.get_or_create("New York", "", "USA").unwrap();

    let sender = service
        .create_correspondent(&CorrespondentDraft {
            name: CorrespondentName::person("Johanna", "Bakker"),
            place_id: Some(arnhem.id),
        })
        .unwrap();
    let addressee = service
        .create_correspondent(&CorrespondentDraft {
            name: CorrespondentName::person("Pieter", "Bakker"),
            place_id: Some(new_york.id),
        })
        .unwrap();
    let item = service
        .create_item(&ItemDraft {
            title: "Letter".to_string(),
            sender_id: Some(sender),
            ..ItemDraft::default()
        })
        .unwrap();

    assert_eq!(cache.get_route(item).len(), 1);

    service.set_addressee(item, Some(addressee)).unwrap();
    // Addressee place has no coordinates yet.
    assert_eq!(cache.get_route(item).len(), 1);

    directory
        .set_coordinates(new_york.id, Some(Coordinates::new(40.7, -74.0).unwrap()))
        .unwrap();
    let route = cache.get_route(item);
    assert_eq!(route.len(), 2);
    assert_eq!(route.waypoints[1].kind, WaypointKind::Addressee);

    service.set_correspondent_place(sender, None).unwrap();
    assert_eq!(cache.get_route(item).len(), 1);
    assert_eq!(builder.calls(), 4);
}

#[test]
fn invalidation_during_slow_store_write_is_not_lost() {
    let item = arnhem_berlin_new_york();
    let id = item.id;
    let cache = RouteCache::new(
        MemorySource::with_items(vec![item.clone()]),
        SlowPutStore {
            inner: MemoryRouteStore::new(),
            delay: Duration::from_millis(200),
        },
        WaypointBuilder,
        &long_ttl(),
    );

    std::thread::scope(|scope| {
        let first = scope.spawn(|| cache.get_route(id));
        std::thread::sleep(Duration::from_millis(50));

        let mut edited = item.clone();
        edited.addressee = None;
        cache.source().replace(edited);
        cache.invalidate(id);
        first.join().unwrap();
    });

    assert_eq!(cache.get_route(id).len(), 2);
}

#[test]
fn invalidation_during_slow_build_keeps_result_out_of_store() {
    let item = arnhem_berlin_new_york();
    let id = item.id;
    let builder = CountingBuilder::slow(Duration::from_millis(150));
    let cache = RouteCache::new(
        MemorySource::with_items(vec![item.clone()]),
        MemoryRouteStore::new(),
        &builder,
        &long_ttl(),
    );

    std::thread::scope(|scope| {
        let first = scope.spawn(|| cache.get_route(id));
        std::thread::sleep(Duration::from_millis(50));

        let mut edited = item.clone();
        edited.addressee = None;
        cache.source().replace(edited);
        cache.invalidate(id);
        first.join().unwrap();
    });

    assert!(cache.store().is_empty());
    assert_eq!(cache.get_route(id).len(), 2);
    assert_eq!(builder.calls(), 2);
}

#[test]
fn invalidating_one_item_keeps_other_in_flight_routes_storable() {
    let slow = arnhem_berlin_new_york();
    let other = arnhem_berlin_new_york();
    let (slow_id, other_id) = (slow.id, other.id);
    let builder = CountingBuilder::slow(Duration::from_millis(150));
    let cache = RouteCache::new(
        MemorySource::with_items(vec![slow, other]),
        MemoryRouteStore::new(),
        &builder,
        &long_ttl(),
    );

    std::thread::scope(|scope| {
        let first = scope.spawn(|| cache.get_route(slow_id));
        std::thread::sleep(Duration::from_millis(50));
        cache.invalidate(other_id);
        first.join().unwrap();
    });

    cache.get_route(slow_id);
    assert_eq!(builder.calls(), 1);
}

#[test]
fn censor_and_postmark_changes_invalidate_persisted_routes() {
    let conn = open_db_in_memory().unwrap();
    let builder = CountingBuilder::default();
    let cache = RouteCache::new(
        SqliteCorrespondenceRepository::new(&conn),
        MemoryRouteStore::new(),
        &builder,
        &long_ttl(),
    );
    let directory = LocationDirectory::new(
        SqlitePlaceRepository::new(&conn),
        DisabledGeocoder,
        DirectoryConfig::default(),
    )
    .with_observer(&cache);
    let service = CorrespondenceService::new(SqliteCorrespondenceRepository::new(&conn))
        .with_observer(&cache);

    let located = |town: &str, lat: f64, lon: f64| {
        let created = directory.get_or_create(town, "", "").unwrap();
        directory
            .set_coordinates(created.id, Some(Coordinates::new(lat, lon).unwrap()))
            .unwrap()
    };
    let arnhem = located("Arnhem", 52.0, 5.9);
    let new_york = located("New York", 40.7, -74.0);
    let hamburg = located("Hamburg", 53.55, 9.99);
    let berlin = directory.get_or_create("Berlin", "", "").unwrap();
    let cologne = directory.get_or_create("Cologne", "", "").unwrap();

    let sender = service
        .create_correspondent(&CorrespondentDraft {
            name: CorrespondentName::person("Johanna", "Bakker"),
            place_id: Some(arnhem.id),
        })
        .unwrap();
    let addressee = service
        .create_correspondent(&CorrespondentDraft {
            name: CorrespondentName::person("Pieter", "Bakker"),
            place_id: Some(new_york.id),
        })
        .unwrap();
    let item = service
        .create_item(&ItemDraft {
            title: "Censored letter".to_string(),
            sender_id: Some(sender),
            addressee_id: Some(addressee),
            censor_place_id: Some(cologne.id),
            ..ItemDraft::default()
        })
        .unwrap();
    let berlin_mark = service
        .create_postmark(&PostmarkDraft {
            place_id: Some(berlin.id),
            date: None,
            arrival_order: Some(1),
        })
        .unwrap();
    let hamburg_mark = service
        .create_postmark(&PostmarkDraft {
            place_id: Some(hamburg.id),
            date: None,
            arrival_order: Some(2),
        })
        .unwrap();
    service.attach_postmark(item, berlin_mark).unwrap();

    assert_eq!(cache.get_route(item).len(), 2);
    assert_eq!(cache.get_route(item).len(), 2);
    assert_eq!(builder.calls(), 1);

    directory
        .set_coordinates(berlin.id, Some(Coordinates::new(52.5, 13.4).unwrap()))
        .unwrap();
    assert_eq!(cache.get_route(item).len(), 3);
    assert_eq!(builder.calls(), 2);

    directory
        .set_coordinates(cologne.id, Some(Coordinates::new(50.94, 6.96).unwrap()))
        .unwrap();
    let route = cache.get_route(item);
    assert_eq!(route.len(), 4);
    assert_eq!(route.waypoints[1].kind, WaypointKind::Censor);
    assert_eq!(builder.calls(), 3);

    service.attach_postmark(item, hamburg_mark).unwrap();
    assert_eq!(cache.get_route(item).len(), 5);
    assert_eq!(builder.calls(), 4);

    service.detach_postmark(item, hamburg_mark).unwrap();
    assert_eq!(cache.get_route(item).len(), 4);
    assert_eq!(builder.calls(), 5);

    service.set_censor(item, None).unwrap();
    assert_eq!(cache.get_route(item).len(), 3);
    assert_eq!(builder.calls(), 6);
}

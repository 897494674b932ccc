#![allow(dead_code)]

use chrono::NaiveDate;
use postroute_core::{
    fold_display_name, BuildRoute, Coordinates, CorrespondenceItem, CorrespondenceSource,
    Correspondent, CorrespondentId, CorrespondentName, GeocodeResult, GeocodeStatus, Geocoder,
    ItemId, ItemPostmark, Place, PlaceId, PlaceQuery, Postmark, RepoResult, Route,
    WaypointBuilder,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

pub fn place(town: &str, country: &str, coords: Option<(f64, f64)>) -> Place {
    let coordinates = coords.map(|(lat, lon)| Coordinates::new(lat, lon).unwrap());
    Place {
        id: Uuid::new_v4(),
        town_city: town.to_string(),
        province_state: String::new(),
        country: country.to_string(),
        geocode_status: if coordinates.is_some() {
            GeocodeStatus::Resolved
        } else {
            GeocodeStatus::Unresolved
        },
        coordinates,
    }
}

pub fn person(first: &str, last: &str, place: Option<Place>) -> Correspondent {
    Correspondent {
        id: Uuid::new_v4(),
        name: CorrespondentName::person(first, last),
        place,
    }
}

pub fn postmark(
    place: Option<Place>,
    arrival_order: Option<u32>,
    date: Option<(i32, u32, u32)>,
    position: u32,
) -> ItemPostmark {
    ItemPostmark {
        postmark: Postmark {
            id: Uuid::new_v4(),
            place,
            date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            arrival_order,
        },
        position,
    }
}

/// Arnhem → Berlin → New York, the archive's canonical example.
pub fn arnhem_berlin_new_york() -> CorrespondenceItem {
    let mut item = CorrespondenceItem::new("Postcard to New York");
    item.sender = Some(person(
        "Johanna",
        "Bakker",
        Some(place("Arnhem", "Netherlands", Some((52.0, 5.9)))),
    ));
    item.postmarks = vec![postmark(
        Some(place("Berlin", "Germany", Some((52.5, 13.4)))),
        Some(1),
        None,
        1,
    )];
    item.addressee = Some(person(
        "Pieter",
        "Bakker",
        Some(place("New York", "USA", Some((40.7, -74.0)))),
    ));
    item
}

/// Geocoder returning scripted answers per town and counting calls.
#[derive(Default)]
pub struct ScriptedGeocoder {
    answers: Mutex<HashMap<String, Option<(f64, f64)>>>,
    failing: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
}

impl ScriptedGeocoder {
    pub fn with_answer(self, town: &str, coords: Option<(f64, f64)>) -> Self {
        self.answers
            .lock()
            .unwrap()
            .insert(town.to_lowercase(), coords);
        self
    }

    pub fn failing_for(self, town: &str) -> Self {
        self.failing.lock().unwrap().push(town.to_lowercase());
        self
    }

    pub fn stop_failing(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Geocoder for ScriptedGeocoder {
    fn geocode(&self, query: &PlaceQuery) -> GeocodeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let town = query.town_city.to_lowercase();
        if self.failing.lock().unwrap().contains(&town) {
            return Err(postroute_core::GeocodeError::Service {
                status: 503,
                body: "overloaded".to_string(),
            });
        }
        let answer = self.answers.lock().unwrap().get(&town).copied().flatten();
        Ok(answer.map(|(lat, lon)| Coordinates::new(lat, lon).unwrap()))
    }
}

/// Builder wrapper that counts invocations and can simulate slow work.
#[derive(Default)]
pub struct CountingBuilder {
    pub calls: AtomicUsize,
    pub delay: Duration,
}

impl CountingBuilder {
    pub fn slow(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BuildRoute for CountingBuilder {
    fn build(&self, item: &CorrespondenceItem) -> Route {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        WaypointBuilder.build(item)
    }
}

/// Thread-safe in-memory correspondence source.
#[derive(Default)]
pub struct MemorySource {
    items: Mutex<Vec<CorrespondenceItem>>,
}

impl MemorySource {
    pub fn with_items(items: Vec<CorrespondenceItem>) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }

    pub fn replace(&self, item: CorrespondenceItem) {
        let mut items = self.items.lock().unwrap();
        if let Some(slot) = items.iter_mut().find(|existing| existing.id == item.id) {
            *slot = item;
        } else {
            items.push(item);
        }
    }
}

fn references_place(item: &CorrespondenceItem, place: PlaceId) -> bool {
    let correspondent_at = |c: &Option<Correspondent>| {
        c.as_ref()
            .and_then(|c| c.place.as_ref())
            .is_some_and(|p| p.id == place)
    };
    correspondent_at(&item.sender)
        || correspondent_at(&item.addressee)
        || item.censor.as_ref().is_some_and(|p| p.id == place)
        || item
            .postmarks
            .iter()
            .any(|entry| entry.postmark.place.as_ref().is_some_and(|p| p.id == place))
}

impl CorrespondenceSource for MemorySource {
    fn load_item(&self, id: ItemId) -> RepoResult<Option<CorrespondenceItem>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .find(|item| item.id == id)
            .cloned())
    }

    fn item_ids(&self) -> RepoResult<Vec<ItemId>> {
        Ok(self.items.lock().unwrap().iter().map(|item| item.id).collect())
    }

    fn item_ids_for_correspondent(&self, display_name: &str) -> RepoResult<Vec<ItemId>> {
        let wanted = fold_display_name(display_name);
        let matches =
            |c: &Option<Correspondent>| c.as_ref().is_some_and(|c| c.name.display_key() == wanted);
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|item| matches(&item.sender) || matches(&item.addressee))
            .map(|item| item.id)
            .collect())
    }

    fn items_referencing_place(&self, place: PlaceId) -> RepoResult<Vec<ItemId>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|item| references_place(item, place))
            .map(|item| item.id)
            .collect())
    }

    fn items_referencing_correspondent(
        &self,
        correspondent: CorrespondentId,
    ) -> RepoResult<Vec<ItemId>> {
        let is = |c: &Option<Correspondent>| c.as_ref().is_some_and(|c| c.id == correspondent);
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|item| is(&item.sender) || is(&item.addressee))
            .map(|item| item.id)
            .collect())
    }
}

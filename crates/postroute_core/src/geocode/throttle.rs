//! Minimum-interval throttle for batch geocoding.

use super::{GeocodeResult, Geocoder, PlaceQuery};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Wraps a geocoder so consecutive lookups are at least `min_interval` apart.
pub struct ThrottledGeocoder<G> {
    inner: G,
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl<G: Geocoder> ThrottledGeocoder<G> {
    pub fn new(inner: G, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

impl<G: Geocoder> Geocoder for ThrottledGeocoder<G> {
    fn geocode(&self, query: &PlaceQuery) -> GeocodeResult {
        // Held across the lookup so concurrent callers queue behind each other.
        let mut last_call = self
            .last_call
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }

        let result = self.inner.geocode(query);
        *last_call = Some(Instant::now());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::ThrottledGeocoder;
    use crate::geocode::{DisabledGeocoder, Geocoder, PlaceQuery};
    use std::time::{Duration, Instant};

    #[test]
    fn consecutive_calls_respect_min_interval() {
        let geocoder = ThrottledGeocoder::new(DisabledGeocoder, Duration::from_millis(30));
        let query = PlaceQuery::new("Arnhem", "", "Netherlands");

        let started = Instant::now();
        geocoder.geocode(&query).unwrap();
        geocoder.geocode(&query).unwrap();
        geocoder.geocode(&query).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn first_call_is_not_delayed() {
        let geocoder = ThrottledGeocoder::new(DisabledGeocoder, Duration::from_secs(5));
        let started = Instant::now();
        geocoder
            .geocode(&PlaceQuery::new("Berlin", "", "Germany"))
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}

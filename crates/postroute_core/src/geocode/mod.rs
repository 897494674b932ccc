//! Geocoder adapter.
//!
//! # Responsibility
//! - Turn a place description into decimal-degree coordinates.
//! - Keep "no match", "service failed" and "malformed input" distinct for
//!   callers that record them, and flatten them for callers that do not.
//!
//! # Invariants
//! - Geocoding never mutates archive state.
//! - `Geocoder::resolve` never fails; it logs and returns `None`.

use crate::model::place::{Coordinates, Place};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod nominatim;
mod throttle;

pub use nominatim::NominatimGeocoder;
pub use throttle::ThrottledGeocoder;

pub type GeocodeResult = Result<Option<Coordinates>, GeocodeError>;

/// Geocoding failure, distinct from a clean "no match".
#[derive(Debug)]
pub enum GeocodeError {
    /// Description lacks both town/city and country.
    MalformedInput(String),
    /// Transport failure (connect, timeout, TLS).
    Http(reqwest::Error),
    /// Service answered with a non-success status.
    Service { status: u16, body: String },
    /// Service answered with an unreadable payload.
    Decode(String),
}

impl GeocodeError {
    /// Whether retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::MalformedInput(_))
    }
}

impl Display for GeocodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedInput(query) => write!(f, "malformed place description: `{query}`"),
            Self::Http(err) => write!(f, "geocoder http error: {err}"),
            Self::Service { status, body } => {
                write!(f, "geocoder returned status {status}: {body}")
            }
            Self::Decode(message) => write!(f, "failed to decode geocoder response: {message}"),
        }
    }
}

impl Error for GeocodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GeocodeError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

/// Structured place description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceQuery {
    pub house_number: Option<String>,
    pub street: Option<String>,
    pub town_city: String,
    pub province_state: String,
    pub country: String,
}

impl PlaceQuery {
    pub fn new(town_city: &str, province_state: &str, country: &str) -> Self {
        Self {
            town_city: town_city.trim().to_string(),
            province_state: province_state.trim().to_string(),
            country: country.trim().to_string(),
            ..Self::default()
        }
    }

    /// A description needs a town/city or a country to be useful.
    pub fn is_well_formed(&self) -> bool {
        !self.town_city.trim().is_empty() || !self.country.trim().is_empty()
    }

    /// Comma-separated free-text form, skipping empty parts.
    pub fn to_query_string(&self) -> String {
        let street = match (self.house_number.as_deref(), self.street.as_deref()) {
            (Some(number), Some(street)) => format!("{} {}", number.trim(), street.trim()),
            (None, Some(street)) => street.trim().to_string(),
            _ => String::new(),
        };

        [
            street.as_str(),
            self.town_city.trim(),
            self.province_state.trim(),
            self.country.trim(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
    }
}

impl From<&Place> for PlaceQuery {
    fn from(place: &Place) -> Self {
        Self::new(&place.town_city, &place.province_state, &place.country)
    }
}

/// Place lookup service. Implementations may block on network I/O.
pub trait Geocoder {
    fn geocode(&self, query: &PlaceQuery) -> GeocodeResult;

    /// Lookup that treats every failure as "no result".
    fn resolve(&self, query: &PlaceQuery) -> Option<Coordinates> {
        match self.geocode(query) {
            Ok(Some(coordinates)) => Some(coordinates),
            Ok(None) => {
                info!(
                    "event=geocode module=geocode status=no_match query={}",
                    query.to_query_string()
                );
                None
            }
            Err(err) => {
                warn!(
                    "event=geocode module=geocode status=error query={} error={}",
                    query.to_query_string(),
                    err
                );
                None
            }
        }
    }
}

impl<G: Geocoder + ?Sized> Geocoder for &G {
    fn geocode(&self, query: &PlaceQuery) -> GeocodeResult {
        (**self).geocode(query)
    }
}

/// Geocoder that never finds anything; used when lookups are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGeocoder;

impl Geocoder for DisabledGeocoder {
    fn geocode(&self, _query: &PlaceQuery) -> GeocodeResult {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::{GeocodeError, GeocodeResult, Geocoder, PlaceQuery};
    use crate::model::place::Coordinates;

    struct Failing;

    impl Geocoder for Failing {
        fn geocode(&self, _query: &PlaceQuery) -> GeocodeResult {
            Err(GeocodeError::Service {
                status: 503,
                body: "busy".to_string(),
            })
        }
    }

    struct Fixed;

    impl Geocoder for Fixed {
        fn geocode(&self, _query: &PlaceQuery) -> GeocodeResult {
            Ok(Some(Coordinates::new(52.5, 13.4).unwrap()))
        }
    }

    #[test]
    fn query_string_skips_empty_parts() {
        let mut query = PlaceQuery::new(" Arnhem ", "", "Netherlands");
        assert_eq!(query.to_query_string(), "Arnhem, Netherlands");

        query.house_number = Some("12".to_string());
        query.street = Some("Steenstraat".to_string());
        assert_eq!(
            query.to_query_string(),
            "12 Steenstraat, Arnhem, Netherlands"
        );
    }

    #[test]
    fn query_without_town_or_country_is_malformed() {
        assert!(!PlaceQuery::new("", "Gelderland", " ").is_well_formed());
        assert!(PlaceQuery::new("", "", "Germany").is_well_formed());
    }

    #[test]
    fn resolve_flattens_failures_to_none() {
        let query = PlaceQuery::new("Berlin", "", "Germany");
        assert_eq!(Failing.resolve(&query), None);
        assert_eq!(Fixed.resolve(&query).map(|c| c.latitude), Some(52.5));
    }

    #[test]
    fn malformed_input_is_not_transient() {
        assert!(!GeocodeError::MalformedInput(String::new()).is_transient());
        assert!(GeocodeError::Decode("bad".to_string()).is_transient());
    }
}

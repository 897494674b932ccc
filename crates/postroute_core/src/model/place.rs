//! Place domain model.
//!
//! # Responsibility
//! - Define the deduplicated place record and its natural key.
//! - Validate coordinates before they can reach storage.
//!
//! # Invariants
//! - `(town_city, province_state, country)` normalized by [`PlaceKey`] is unique.
//! - Latitude and longitude are either both present or both absent.
//! - A place without coordinates is valid; geocoding may fill them later.

use crate::model::validation::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Stable identifier of a place record.
pub type PlaceId = Uuid;

/// Decimal-degree coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Builds validated coordinates.
    ///
    /// # Errors
    /// - Returns a range error for non-finite or out-of-range components.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ValidationError::LatitudeOutOfRange(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ValidationError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Returns `[longitude, latitude]`, the GeoJSON position order.
    pub fn to_lon_lat(self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }

    /// Bitwise identity used for geometric edge comparison.
    pub(crate) fn bits(self) -> (u64, u64) {
        (self.latitude.to_bits(), self.longitude.to_bits())
    }
}

/// Geocoding lifecycle of a place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeStatus {
    /// No lookup attempted yet.
    Pending,
    /// Coordinates are present.
    Resolved,
    /// The service had no match or the description was malformed.
    Unresolved,
    /// The service failed; eligible for retry.
    Failed,
}

impl GeocodeStatus {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Unresolved => "unresolved",
            Self::Failed => "failed",
        }
    }

    pub fn parse_db_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "resolved" => Some(Self::Resolved),
            "unresolved" => Some(Self::Unresolved),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Collapses whitespace runs and trims, keeping the original case.
pub fn normalize_label(value: &str) -> String {
    WHITESPACE_RE.replace_all(value.trim(), " ").into_owned()
}

fn normalize_key_part(value: &str) -> String {
    normalize_label(value).to_lowercase()
}

/// Case- and whitespace-insensitive natural key of a place.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaceKey {
    pub town_city: String,
    pub province_state: String,
    pub country: String,
}

impl PlaceKey {
    /// Normalizes the three key components.
    ///
    /// # Errors
    /// - Returns `EmptyTownCity` when the town/city is blank.
    pub fn new(
        town_city: &str,
        province_state: &str,
        country: &str,
    ) -> Result<Self, ValidationError> {
        let town_city = normalize_key_part(town_city);
        if town_city.is_empty() {
            return Err(ValidationError::EmptyTownCity);
        }
        Ok(Self {
            town_city,
            province_state: normalize_key_part(province_state),
            country: normalize_key_part(country),
        })
    }
}

/// Input for creating a place record.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceDraft {
    pub key: PlaceKey,
    pub town_city: String,
    pub province_state: String,
    pub country: String,
}

impl PlaceDraft {
    pub fn new(
        town_city: &str,
        province_state: &str,
        country: &str,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            key: PlaceKey::new(town_city, province_state, country)?,
            town_city: normalize_label(town_city),
            province_state: normalize_label(province_state),
            country: normalize_label(country),
        })
    }
}

/// Deduplicated geographic location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: PlaceId,
    pub town_city: String,
    pub province_state: String,
    pub country: String,
    pub coordinates: Option<Coordinates>,
    pub geocode_status: GeocodeStatus,
}

impl Place {
    /// Rebuilds the natural key from display labels.
    pub fn key(&self) -> Result<PlaceKey, ValidationError> {
        PlaceKey::new(&self.town_city, &self.province_state, &self.country)
    }

    /// Human-readable "town, province, country" label without empty parts.
    pub fn label(&self) -> String {
        [
            self.town_city.as_str(),
            self.province_state.as_str(),
            self.country.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
    }
}

//! Nominatim-compatible HTTP geocoder.

use super::{GeocodeError, GeocodeResult, Geocoder, PlaceQuery};
use crate::config::GeocoderConfig;
use crate::model::place::Coordinates;
use log::debug;
use serde::Deserialize;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

/// Blocking client for `GET {base_url}/search?format=json`.
pub struct NominatimGeocoder {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl Geocoder for NominatimGeocoder {
    fn geocode(&self, query: &PlaceQuery) -> GeocodeResult {
        let text = query.to_query_string();
        if !query.is_well_formed() {
            return Err(GeocodeError::MalformedInput(text));
        }

        debug!("event=geocode_request module=geocode status=start query={text}");
        let response = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[("q", text.as_str()), ("format", "json"), ("limit", "1")])
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(GeocodeError::Service {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        parse_search_response(&body)
    }
}

/// Parses a Nominatim `search` JSON array, taking the first hit.
pub(crate) fn parse_search_response(body: &str) -> GeocodeResult {
    let hits: Vec<SearchHit> =
        serde_json::from_str(body).map_err(|err| GeocodeError::Decode(err.to_string()))?;
    let Some(hit) = hits.first() else {
        return Ok(None);
    };

    let latitude = parse_degrees(&hit.lat)?;
    let longitude = parse_degrees(&hit.lon)?;
    Coordinates::new(latitude, longitude)
        .map(Some)
        .map_err(|err| GeocodeError::Decode(err.to_string()))
}

fn parse_degrees(value: &str) -> Result<f64, GeocodeError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| GeocodeError::Decode(format!("invalid coordinate `{value}`")))
}

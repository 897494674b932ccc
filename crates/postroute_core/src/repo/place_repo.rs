//! Place repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist deduplicated places keyed by their normalized natural key.
//! - Store geocoding outcomes atomically per place row.
//!
//! # Invariants
//! - Creation is an upsert on the unique key, so racing creators converge on
//!   one canonical row.
//! - Coordinates are written together with their `GeocodeStatus`.

use crate::db::DbError;
use crate::model::place::{Coordinates, GeocodeStatus, Place, PlaceDraft, PlaceId, PlaceKey};
use crate::model::validation::ValidationError;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const PLACE_SELECT_SQL: &str = "SELECT
    uuid,
    town_city,
    province_state,
    country,
    latitude,
    longitude,
    geocode_status
FROM places";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by every archive repository.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound(Uuid),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Filter for places still lacking coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeocodeCandidateQuery {
    /// Also revisit places the service previously had no match for.
    pub include_unresolved: bool,
    pub limit: Option<u32>,
}

/// Persistence contract for the location directory.
pub trait PlaceRepository {
    /// Inserts the place unless its key exists; returns the canonical row and
    /// whether this call created it.
    fn insert_or_get_place(&self, draft: &PlaceDraft) -> RepoResult<(Place, bool)>;
    fn get_place(&self, id: PlaceId) -> RepoResult<Option<Place>>;
    fn find_place_by_key(&self, key: &PlaceKey) -> RepoResult<Option<Place>>;
    fn set_place_coordinates(
        &self,
        id: PlaceId,
        coordinates: Option<Coordinates>,
        status: GeocodeStatus,
    ) -> RepoResult<()>;
    fn list_geocode_candidates(&self, query: &GeocodeCandidateQuery) -> RepoResult<Vec<Place>>;
    fn list_places(&self) -> RepoResult<Vec<Place>>;
}

/// SQLite-backed place repository.
#[derive(Clone, Copy)]
pub struct SqlitePlaceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePlaceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PlaceRepository for SqlitePlaceRepository<'_> {
    fn insert_or_get_place(&self, draft: &PlaceDraft) -> RepoResult<(Place, bool)> {
        let inserted = self.conn.execute(
            "INSERT INTO places (
                uuid,
                town_city,
                province_state,
                country,
                town_key,
                province_key,
                country_key
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (town_key, province_key, country_key) DO NOTHING;",
            params![
                Uuid::new_v4().to_string(),
                draft.town_city.as_str(),
                draft.province_state.as_str(),
                draft.country.as_str(),
                draft.key.town_city.as_str(),
                draft.key.province_state.as_str(),
                draft.key.country.as_str(),
            ],
        )?;

        let place = self.find_place_by_key(&draft.key)?.ok_or_else(|| {
            RepoError::InvalidData(format!(
                "place `{}` missing after upsert",
                draft.key.town_city
            ))
        })?;
        Ok((place, inserted == 1))
    }

    fn get_place(&self, id: PlaceId) -> RepoResult<Option<Place>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{PLACE_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_place_row(row)?)),
            None => Ok(None),
        }
    }

    fn find_place_by_key(&self, key: &PlaceKey) -> RepoResult<Option<Place>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{PLACE_SELECT_SQL}
             WHERE town_key = ?1
               AND province_key = ?2
               AND country_key = ?3;"
        ))?;
        let mut rows = stmt.query(params![
            key.town_city.as_str(),
            key.province_state.as_str(),
            key.country.as_str(),
        ])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_place_row(row)?)),
            None => Ok(None),
        }
    }

    fn set_place_coordinates(
        &self,
        id: PlaceId,
        coordinates: Option<Coordinates>,
        status: GeocodeStatus,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE places
             SET
                latitude = ?1,
                longitude = ?2,
                geocode_status = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?4;",
            params![
                coordinates.map(|c| c.latitude),
                coordinates.map(|c| c.longitude),
                status.as_db_str(),
                id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn list_geocode_candidates(&self, query: &GeocodeCandidateQuery) -> RepoResult<Vec<Place>> {
        let mut sql = format!(
            "{PLACE_SELECT_SQL}
             WHERE latitude IS NULL
               AND geocode_status IN ('pending', 'failed'"
        );
        if query.include_unresolved {
            sql.push_str(", 'unresolved'");
        }
        sql.push_str(") ORDER BY created_at ASC, uuid ASC");

        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        collect_places(self.conn, &sql, bind_values)
    }

    fn list_places(&self) -> RepoResult<Vec<Place>> {
        collect_places(
            self.conn,
            &format!("{PLACE_SELECT_SQL} ORDER BY town_key ASC, uuid ASC"),
            Vec::new(),
        )
    }
}

fn collect_places(conn: &Connection, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Place>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut places = Vec::new();
    while let Some(row) = rows.next()? {
        places.push(parse_place_row(row)?);
    }
    Ok(places)
}

/// Parses a `places` row selected with [`PLACE_SELECT_SQL`] columns, optionally
/// prefixed (e.g. `sender_place_`) when joined into a wider query.
pub(crate) fn parse_place_columns(row: &Row<'_>, prefix: &str) -> RepoResult<Option<Place>> {
    let uuid_text: Option<String> = row.get(format!("{prefix}uuid").as_str())?;
    let Some(uuid_text) = uuid_text else {
        return Ok(None);
    };

    let id = parse_uuid(&uuid_text, "places.uuid")?;
    let latitude: Option<f64> = row.get(format!("{prefix}latitude").as_str())?;
    let longitude: Option<f64> = row.get(format!("{prefix}longitude").as_str())?;
    let coordinates = match (latitude, longitude) {
        (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon).map_err(|err| {
            RepoError::InvalidData(format!("place {id} has invalid coordinates: {err}"))
        })?),
        (None, None) => None,
        _ => {
            return Err(RepoError::InvalidData(format!(
                "place {id} has only one coordinate set"
            )));
        }
    };

    let status_text: String = row.get(format!("{prefix}geocode_status").as_str())?;
    let geocode_status = GeocodeStatus::parse_db_str(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid geocode status `{status_text}` in places.geocode_status"
        ))
    })?;

    Ok(Some(Place {
        id,
        town_city: row.get(format!("{prefix}town_city").as_str())?,
        province_state: row.get(format!("{prefix}province_state").as_str())?,
        country: row.get(format!("{prefix}country").as_str())?,
        coordinates,
        geocode_status,
    }))
}

fn parse_place_row(row: &Row<'_>) -> RepoResult<Place> {
    parse_place_columns(row, "")?
        .ok_or_else(|| RepoError::InvalidData("places.uuid is null".to_string()))
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

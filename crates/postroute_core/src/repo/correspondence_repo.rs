//! Correspondence repositories and SQLite implementation.
//!
//! # Responsibility
//! - Persist correspondents, postmarks, items and their associations.
//! - Load one item with every association resolved for route building.
//! - Answer "which items does this change affect" for cache invalidation.
//!
//! # Invariants
//! - Postmark positions on an item are assigned atomically as `MAX + 1`.
//! - Loaded postmarks come back in insertion (`position`) order; journey
//!   ordering is the waypoint builder's job.

use crate::model::correspondence::{
    fold_display_name, CorrespondenceItem, Correspondent, CorrespondentDraft, CorrespondentId,
    CorrespondentName, ItemDraft, ItemId, ItemPostmark, Postmark, PostmarkDraft, PostmarkId,
};
use crate::model::place::PlaceId;
use crate::repo::place_repo::{
    parse_place_columns, parse_uuid, PlaceRepository, RepoError, RepoResult,
    SqlitePlaceRepository,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// Write contract for correspondence records and associations.
pub trait CorrespondenceRepository {
    fn create_correspondent(&self, draft: &CorrespondentDraft) -> RepoResult<CorrespondentId>;
    fn set_correspondent_place(
        &self,
        id: CorrespondentId,
        place_id: Option<PlaceId>,
    ) -> RepoResult<()>;
    fn create_postmark(&self, draft: &PostmarkDraft) -> RepoResult<PostmarkId>;
    fn create_item(&self, draft: &ItemDraft) -> RepoResult<ItemId>;
    fn set_item_sender(&self, item: ItemId, sender: Option<CorrespondentId>) -> RepoResult<()>;
    fn set_item_addressee(
        &self,
        item: ItemId,
        addressee: Option<CorrespondentId>,
    ) -> RepoResult<()>;
    fn set_item_censor(&self, item: ItemId, censor_place: Option<PlaceId>) -> RepoResult<()>;
    /// Attaches a postmark and returns its insertion position. Re-attaching
    /// keeps the original position.
    fn attach_postmark(&self, item: ItemId, postmark: PostmarkId) -> RepoResult<u32>;
    fn detach_postmark(&self, item: ItemId, postmark: PostmarkId) -> RepoResult<()>;
}

/// Read contract used by the route core.
pub trait CorrespondenceSource {
    /// Loads one item with sender, addressee, censor and postmarks resolved.
    fn load_item(&self, id: ItemId) -> RepoResult<Option<CorrespondenceItem>>;
    /// All item ids in creation order.
    fn item_ids(&self) -> RepoResult<Vec<ItemId>>;
    /// Items whose sender or addressee display name matches, ignoring case
    /// and whitespace runs.
    fn item_ids_for_correspondent(&self, display_name: &str) -> RepoResult<Vec<ItemId>>;
    /// Items whose route may pass through `place`.
    fn items_referencing_place(&self, place: PlaceId) -> RepoResult<Vec<ItemId>>;
    /// Items that use `correspondent` as sender or addressee.
    fn items_referencing_correspondent(
        &self,
        correspondent: CorrespondentId,
    ) -> RepoResult<Vec<ItemId>>;
}

/// SQLite-backed correspondence repository.
#[derive(Clone, Copy)]
pub struct SqliteCorrespondenceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCorrespondenceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn update_item_column(
        &self,
        item: ItemId,
        column: &str,
        value: Option<Uuid>,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE correspondence_items
                 SET
                    {column} = ?1,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?2;"
            ),
            params![value.map(|id| id.to_string()), item.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(item));
        }
        Ok(())
    }

    fn load_correspondent(&self, id: &str) -> RepoResult<Option<Correspondent>> {
        let row = self
            .conn
            .query_row(
                "SELECT kind, title, first_name, last_name, entity_name, place_uuid
                 FROM correspondents
                 WHERE uuid = ?1;",
                [id],
                |row| {
                    Ok((
                        row.get::<_, String>("kind")?,
                        row.get::<_, Option<String>>("title")?,
                        row.get::<_, Option<String>>("first_name")?,
                        row.get::<_, Option<String>>("last_name")?,
                        row.get::<_, Option<String>>("entity_name")?,
                        row.get::<_, Option<String>>("place_uuid")?,
                    ))
                },
            )
            .optional()?;

        let Some((kind, title, first_name, last_name, entity_name, place_uuid)) = row else {
            return Ok(None);
        };

        let name = match kind.as_str() {
            "person" => CorrespondentName::Person {
                title,
                first_name,
                last_name,
            },
            "entity" => CorrespondentName::Entity {
                name: entity_name.unwrap_or_default(),
            },
            other => {
                return Err(RepoError::InvalidData(format!(
                    "invalid correspondent kind `{other}` in correspondents.kind"
                )));
            }
        };

        let place = match place_uuid {
            Some(text) => SqlitePlaceRepository::new(self.conn)
                .get_place(parse_uuid(&text, "correspondents.place_uuid")?)?,
            None => None,
        };

        Ok(Some(Correspondent {
            id: parse_uuid(id, "correspondents.uuid")?,
            name,
            place,
        }))
    }

    fn load_item_postmarks(&self, item: &str) -> RepoResult<Vec<ItemPostmark>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT
                ip.position AS position,
                p.uuid AS postmark_uuid,
                p.postmark_date AS postmark_date,
                p.arrival_order AS arrival_order,
                pl.uuid AS place_uuid,
                pl.town_city AS place_town_city,
                pl.province_state AS place_province_state,
                pl.country AS place_country,
                pl.latitude AS place_latitude,
                pl.longitude AS place_longitude,
                pl.geocode_status AS place_geocode_status
             FROM item_postmarks ip
             INNER JOIN postmarks p ON p.uuid = ip.postmark_uuid
             LEFT JOIN places pl ON pl.uuid = p.place_uuid
             WHERE ip.item_uuid = ?1
             ORDER BY ip.position ASC;",
        )?;

        let mut rows = stmt.query([item])?;
        let mut postmarks = Vec::new();
        while let Some(row) = rows.next()? {
            let postmark_uuid: String = row.get("postmark_uuid")?;
            postmarks.push(ItemPostmark {
                postmark: Postmark {
                    id: parse_uuid(&postmark_uuid, "postmarks.uuid")?,
                    place: parse_place_columns(row, "place_")?,
                    date: row.get::<_, Option<NaiveDate>>("postmark_date")?,
                    arrival_order: row.get::<_, Option<u32>>("arrival_order")?,
                },
                position: row.get("position")?,
            });
        }
        Ok(postmarks)
    }

    fn collect_ids(&self, sql: &str, param: &str) -> RepoResult<Vec<ItemId>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let mut rows = stmt.query([param])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let text: String = row.get(0)?;
            ids.push(parse_uuid(&text, "correspondence_items.uuid")?);
        }
        Ok(ids)
    }
}

impl CorrespondenceRepository for SqliteCorrespondenceRepository<'_> {
    fn create_correspondent(&self, draft: &CorrespondentDraft) -> RepoResult<CorrespondentId> {
        draft.name.validate()?;

        let id = Uuid::new_v4();
        let (kind, title, first_name, last_name, entity_name) = match &draft.name {
            CorrespondentName::Person {
                title,
                first_name,
                last_name,
            } => (
                "person",
                title.as_deref(),
                first_name.as_deref(),
                last_name.as_deref(),
                None,
            ),
            CorrespondentName::Entity { name } => {
                ("entity", None, None, None, Some(name.as_str()))
            }
        };

        self.conn.execute(
            "INSERT INTO correspondents (
                uuid,
                kind,
                title,
                first_name,
                last_name,
                entity_name,
                display_name,
                display_key,
                place_uuid
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                id.to_string(),
                kind,
                title,
                first_name,
                last_name,
                entity_name,
                draft.name.display_name(),
                draft.name.display_key(),
                draft.place_id.map(|place| place.to_string()),
            ],
        )?;
        Ok(id)
    }

    fn set_correspondent_place(
        &self,
        id: CorrespondentId,
        place_id: Option<PlaceId>,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE correspondents
             SET
                place_uuid = ?1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?2;",
            params![place_id.map(|place| place.to_string()), id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn create_postmark(&self, draft: &PostmarkDraft) -> RepoResult<PostmarkId> {
        draft.validate()?;

        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO postmarks (uuid, place_uuid, postmark_date, arrival_order)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                id.to_string(),
                draft.place_id.map(|place| place.to_string()),
                draft.date,
                draft.arrival_order,
            ],
        )?;
        Ok(id)
    }

    fn create_item(&self, draft: &ItemDraft) -> RepoResult<ItemId> {
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO correspondence_items (
                uuid,
                title,
                date_of_correspondence,
                sender_uuid,
                addressee_uuid,
                censor_place_uuid
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                id.to_string(),
                draft.title.trim(),
                draft.date_of_correspondence,
                draft.sender_id.map(|c| c.to_string()),
                draft.addressee_id.map(|c| c.to_string()),
                draft.censor_place_id.map(|p| p.to_string()),
            ],
        )?;
        Ok(id)
    }

    fn set_item_sender(&self, item: ItemId, sender: Option<CorrespondentId>) -> RepoResult<()> {
        self.update_item_column(item, "sender_uuid", sender)
    }

    fn set_item_addressee(
        &self,
        item: ItemId,
        addressee: Option<CorrespondentId>,
    ) -> RepoResult<()> {
        self.update_item_column(item, "addressee_uuid", addressee)
    }

    fn set_item_censor(&self, item: ItemId, censor_place: Option<PlaceId>) -> RepoResult<()> {
        self.update_item_column(item, "censor_place_uuid", censor_place)
    }

    fn attach_postmark(&self, item: ItemId, postmark: PostmarkId) -> RepoResult<u32> {
        let item_text = item.to_string();
        let postmark_text = postmark.to_string();

        self.conn.execute(
            "INSERT INTO item_postmarks (item_uuid, postmark_uuid, position)
             SELECT ?1, ?2, COALESCE(MAX(position), 0) + 1
             FROM item_postmarks
             WHERE item_uuid = ?1
             ON CONFLICT (item_uuid, postmark_uuid) DO NOTHING;",
            params![item_text, postmark_text],
        )?;

        let position = self.conn.query_row(
            "SELECT position
             FROM item_postmarks
             WHERE item_uuid = ?1 AND postmark_uuid = ?2;",
            params![item_text, postmark_text],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(position)
    }

    fn detach_postmark(&self, item: ItemId, postmark: PostmarkId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM item_postmarks WHERE item_uuid = ?1 AND postmark_uuid = ?2;",
            params![item.to_string(), postmark.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(postmark));
        }
        Ok(())
    }
}

impl CorrespondenceSource for SqliteCorrespondenceRepository<'_> {
    fn load_item(&self, id: ItemId) -> RepoResult<Option<CorrespondenceItem>> {
        let item_text = id.to_string();
        let row = self
            .conn
            .query_row(
                "SELECT
                    title,
                    date_of_correspondence,
                    sender_uuid,
                    addressee_uuid,
                    censor_place_uuid
                 FROM correspondence_items
                 WHERE uuid = ?1;",
                [item_text.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>("title")?,
                        row.get::<_, Option<NaiveDate>>("date_of_correspondence")?,
                        row.get::<_, Option<String>>("sender_uuid")?,
                        row.get::<_, Option<String>>("addressee_uuid")?,
                        row.get::<_, Option<String>>("censor_place_uuid")?,
                    ))
                },
            )
            .optional()?;

        let Some((title, date_of_correspondence, sender, addressee, censor)) = row else {
            return Ok(None);
        };

        let sender = match sender {
            Some(text) => self.load_correspondent(&text)?,
            None => None,
        };
        let addressee = match addressee {
            Some(text) => self.load_correspondent(&text)?,
            None => None,
        };
        let censor = match censor {
            Some(text) => SqlitePlaceRepository::new(self.conn)
                .get_place(parse_uuid(&text, "correspondence_items.censor_place_uuid")?)?,
            None => None,
        };

        Ok(Some(CorrespondenceItem {
            id,
            title,
            date_of_correspondence,
            sender,
            addressee,
            censor,
            postmarks: self.load_item_postmarks(&item_text)?,
        }))
    }

    fn item_ids(&self) -> RepoResult<Vec<ItemId>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT uuid FROM correspondence_items ORDER BY created_at ASC, rowid ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let text: String = row.get(0)?;
            ids.push(parse_uuid(&text, "correspondence_items.uuid")?);
        }
        Ok(ids)
    }

    fn item_ids_for_correspondent(&self, display_name: &str) -> RepoResult<Vec<ItemId>> {
        self.collect_ids(
            "SELECT i.uuid
             FROM correspondence_items i
             WHERE EXISTS (
                SELECT 1
                FROM correspondents c
                WHERE c.uuid IN (i.sender_uuid, i.addressee_uuid)
                  AND c.display_key = ?1
             )
             ORDER BY i.created_at ASC, i.rowid ASC;",
            &fold_display_name(display_name),
        )
    }

    fn items_referencing_place(&self, place: PlaceId) -> RepoResult<Vec<ItemId>> {
        self.collect_ids(
            "SELECT i.uuid
             FROM correspondence_items i
             WHERE i.censor_place_uuid = ?1
                OR EXISTS (
                    SELECT 1
                    FROM correspondents c
                    WHERE c.uuid IN (i.sender_uuid, i.addressee_uuid)
                      AND c.place_uuid = ?1
                )
                OR EXISTS (
                    SELECT 1
                    FROM item_postmarks ip
                    INNER JOIN postmarks p ON p.uuid = ip.postmark_uuid
                    WHERE ip.item_uuid = i.uuid
                      AND p.place_uuid = ?1
                )
             ORDER BY i.created_at ASC, i.rowid ASC;",
            &place.to_string(),
        )
    }

    fn items_referencing_correspondent(
        &self,
        correspondent: CorrespondentId,
    ) -> RepoResult<Vec<ItemId>> {
        self.collect_ids(
            "SELECT uuid
             FROM correspondence_items
             WHERE sender_uuid = ?1 OR addressee_uuid = ?1
             ORDER BY created_at ASC, rowid ASC;",
            &correspondent.to_string(),
        )
    }
}

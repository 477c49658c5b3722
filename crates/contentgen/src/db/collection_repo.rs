//! Collection repository: the day and content block tree.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};
use crate::model::{BlockUpdate, Collection, ContentBlock, Day};

fn parse_date(s: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| DatabaseError::InvalidValue {
        column: "date",
        value: s.to_string(),
    })
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| log::warn!("parse_timestamp: failed to parse '{}': {}", s, e))
        .ok()
}

fn block_from_row(row: &Row<'_>) -> Result<(u32, ContentBlock), rusqlite::Error> {
    Ok((
        row.get("day_position")?,
        ContentBlock {
            id: row.get("id")?,
            content_type: row.get("content_type")?,
            ad_copy: row.get("ad_copy")?,
            image_prompt: row.get("image_prompt")?,
            image_url: row.get("image_url")?,
            key_message: row.get("key_message")?,
            tone_of_voice: row.get("tone_of_voice")?,
            scheduled_time: row.get("scheduled_time")?,
        },
    ))
}

/// Inserts a collection with its whole tree, replacing any existing one with the same id.
pub fn insert(db: &Database, collection: &Collection) -> Result<(), DatabaseError> {
    db.with_transaction(|tx| {
        tx.execute("DELETE FROM collections WHERE id = ?1", params![collection.id])?;
        tx.execute(
            "INSERT INTO collections (id, owner_id, name, content_generated, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                collection.id,
                collection.owner_id,
                collection.name,
                collection.content_generated,
                collection.updated_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        for day in &collection.days {
            tx.execute(
                "INSERT INTO days (collection_id, position, date) VALUES (?1, ?2, ?3)",
                params![
                    collection.id,
                    day.position,
                    day.date.format("%Y-%m-%d").to_string()
                ],
            )?;
            for (index, block) in day.blocks.iter().enumerate() {
                tx.execute(
                    "INSERT INTO blocks (collection_id, day_position, block_index, id, content_type,
                     ad_copy, image_prompt, image_url, key_message, tone_of_voice, scheduled_time)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        collection.id,
                        day.position,
                        index as i64,
                        block.id,
                        block.content_type,
                        block.ad_copy,
                        block.image_prompt,
                        block.image_url,
                        block.key_message,
                        block.tone_of_voice,
                        block.scheduled_time,
                    ],
                )?;
            }
        }
        Ok(())
    })
}

/// Loads the full tree of a collection, days ordered by position.
pub fn load(db: &Database, id: &str) -> Result<Option<Collection>, DatabaseError> {
    db.with_conn(|conn| {
        let header = conn
            .query_row(
                "SELECT owner_id, name, content_generated, updated_at FROM collections WHERE id = ?1",
                params![id],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, bool>(2)?,
                        r.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((owner_id, name, content_generated, updated_at)) = header else {
            return Ok(None);
        };

        let mut days = Vec::new();
        let mut stmt =
            conn.prepare("SELECT position, date FROM days WHERE collection_id = ?1 ORDER BY position")?;
        let rows = stmt
            .query_map(params![id], |r| Ok((r.get::<_, u32>(0)?, r.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        for (position, date) in rows {
            days.push(Day::new(position, parse_date(&date)?));
        }

        let mut stmt = conn.prepare(
            "SELECT * FROM blocks WHERE collection_id = ?1 ORDER BY day_position, block_index",
        )?;
        let blocks = stmt
            .query_map(params![id], block_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        for (position, block) in blocks {
            if let Some(day) = days.iter_mut().find(|d| d.position == position) {
                day.blocks.push(block);
            }
        }

        Ok(Some(Collection {
            id: id.to_string(),
            owner_id,
            name,
            content_generated,
            updated_at: updated_at.as_deref().and_then(parse_timestamp),
            days,
        }))
    })
}

/// Returns the owner of a collection, if it exists.
pub fn owner(db: &Database, id: &str) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT owner_id FROM collections WHERE id = ?1",
                params![id],
                |r| r.get(0),
            )
            .optional()?)
    })
}

/// Writes generated fields to one block. Blank incoming values keep the
/// stored value. Returns false when the block does not exist.
pub fn update_block(
    db: &Database,
    id: &str,
    day_index: usize,
    block_index: usize,
    update: &BlockUpdate,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let position: Option<u32> = conn
            .query_row(
                "SELECT position FROM days WHERE collection_id = ?1 ORDER BY position LIMIT 1 OFFSET ?2",
                params![id, day_index as i64],
                |r| r.get(0),
            )
            .optional()?;
        let Some(position) = position else {
            return Ok(false);
        };

        let changed = conn.execute(
            "UPDATE blocks SET
                ad_copy = COALESCE(NULLIF(TRIM(?4), ''), ad_copy),
                image_prompt = COALESCE(NULLIF(TRIM(?5), ''), image_prompt),
                image_url = COALESCE(NULLIF(TRIM(?6), ''), image_url)
             WHERE collection_id = ?1 AND day_position = ?2 AND block_index = ?3",
            params![
                id,
                position,
                block_index as i64,
                update.ad_copy,
                update.image_prompt,
                update.image_url,
            ],
        )?;
        Ok(changed == 1)
    })
}

/// Flags the collection as generated and bumps its update timestamp.
pub fn mark_generated(db: &Database, id: &str, at: DateTime<Utc>) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE collections SET content_generated = 1, updated_at = ?2 WHERE id = ?1",
            params![id, at.to_rfc3339()],
        )?;
        Ok(changed == 1)
    })
}

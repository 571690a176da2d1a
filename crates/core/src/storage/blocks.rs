//! Furniture block storage

use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{date_to_sql, parse_block_type, parse_date, parse_datetime, parse_uuid, placeholders};
use crate::error::Result;
use crate::models::{FurnitureBlock, FurnitureId};

const BLOCK_COLUMNS: &str =
    "id, furniture_id, start_date, end_date, block_type, reason, created_by, created_at";

fn block_from_row(row: &Row<'_>) -> rusqlite::Result<FurnitureBlock> {
    Ok(FurnitureBlock {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        furniture_id: FurnitureId(row.get(1)?),
        start_date: parse_date(&row.get::<_, String>(2)?)?,
        end_date: parse_date(&row.get::<_, String>(3)?)?,
        block_type: parse_block_type(&row.get::<_, String>(4)?)?,
        reason: row.get(5)?,
        created_by: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?)?,
    })
}

pub struct BlockStore<'a> {
    conn: &'a Connection,
}

impl<'a> BlockStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, block), fields(block_id = %block.id, furniture_id = %block.furniture_id))]
    pub fn insert(&self, block: &FurnitureBlock) -> Result<()> {
        self.conn.execute(
            "INSERT INTO furniture_blocks (id, furniture_id, start_date, end_date, block_type,
                reason, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                block.id.to_string(),
                block.furniture_id.0,
                date_to_sql(block.start_date),
                date_to_sql(block.end_date),
                block.block_type.as_str(),
                block.reason,
                block.created_by,
                block.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<FurnitureBlock>> {
        let block = self
            .conn
            .query_row(
                &format!("SELECT {} FROM furniture_blocks WHERE id = ?1", BLOCK_COLUMNS),
                params![id.to_string()],
                block_from_row,
            )
            .optional()?;
        Ok(block)
    }

    #[instrument(skip(self))]
    pub fn delete(&self, id: Uuid) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM furniture_blocks WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(deleted)
    }

    /// Blocks on one furniture item overlapping an inclusive range
    #[instrument(skip(self))]
    pub fn list_for_furniture(
        &self,
        furniture_id: FurnitureId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<FurnitureBlock>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM furniture_blocks
             WHERE furniture_id = ?1 AND start_date <= ?3 AND end_date >= ?2
             ORDER BY start_date",
            BLOCK_COLUMNS
        ))?;
        let blocks = stmt
            .query_map(
                params![furniture_id.0, date_to_sql(from), date_to_sql(to)],
                block_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(blocks)
    }

    /// Blocks on any of the furniture overlapping an inclusive range
    #[instrument(skip(self, furniture_ids), fields(count = furniture_ids.len()))]
    pub fn overlapping(
        &self,
        furniture_ids: &[FurnitureId],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<FurnitureBlock>> {
        if furniture_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM furniture_blocks
             WHERE start_date <= ?1 AND end_date >= ?2 AND furniture_id IN ({})
             ORDER BY furniture_id, start_date",
            BLOCK_COLUMNS,
            placeholders(3, furniture_ids.len())
        );
        let values: Vec<rusqlite::types::Value> = [
            rusqlite::types::Value::Text(date_to_sql(to)),
            rusqlite::types::Value::Text(date_to_sql(from)),
        ]
        .into_iter()
        .chain(furniture_ids.iter().map(|id| rusqlite::types::Value::Integer(id.0)))
        .collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let blocks = stmt
            .query_map(params_from_iter(values), block_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(blocks)
    }
}

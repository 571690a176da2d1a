//! Furniture catalog storage

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::instrument;

use super::parse::placeholders;
use crate::error::Result;
use crate::models::{Furniture, FurnitureId, NewFurniture};

const FURNITURE_COLUMNS: &str = "id, number, zone, furniture_type, capacity, active";

fn furniture_from_row(row: &Row<'_>) -> rusqlite::Result<Furniture> {
    Ok(Furniture {
        id: FurnitureId(row.get(0)?),
        number: row.get(1)?,
        zone: row.get(2)?,
        furniture_type: row.get(3)?,
        capacity: row.get(4)?,
        active: row.get::<_, i32>(5)? != 0,
    })
}

pub struct FurnitureStore<'a> {
    conn: &'a Connection,
}

impl<'a> FurnitureStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert furniture, returning the stored row
    #[instrument(skip(self, furniture), fields(number = %furniture.number))]
    pub fn create(&self, furniture: &NewFurniture) -> Result<Furniture> {
        self.conn.execute(
            "INSERT INTO furniture (number, zone, furniture_type, capacity, active)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                furniture.number,
                furniture.zone,
                furniture.furniture_type,
                furniture.capacity,
                furniture.active as i32,
            ],
        )?;
        Ok(Furniture {
            id: FurnitureId(self.conn.last_insert_rowid()),
            number: furniture.number.clone(),
            zone: furniture.zone.clone(),
            furniture_type: furniture.furniture_type.clone(),
            capacity: furniture.capacity,
            active: furniture.active,
        })
    }

    /// Insert or update by number (catalog seeding)
    #[instrument(skip(self, furniture), fields(number = %furniture.number))]
    pub fn upsert(&self, furniture: &NewFurniture) -> Result<Furniture> {
        self.conn.execute(
            "INSERT INTO furniture (number, zone, furniture_type, capacity, active)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(number) DO UPDATE SET
                zone = excluded.zone,
                furniture_type = excluded.furniture_type,
                capacity = excluded.capacity,
                active = excluded.active",
            params![
                furniture.number,
                furniture.zone,
                furniture.furniture_type,
                furniture.capacity,
                furniture.active as i32,
            ],
        )?;
        let stored = self
            .conn
            .query_row(
                &format!("SELECT {} FROM furniture WHERE number = ?1", FURNITURE_COLUMNS),
                params![furniture.number],
                furniture_from_row,
            )?;
        Ok(stored)
    }

    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: FurnitureId) -> Result<Option<Furniture>> {
        let furniture = self
            .conn
            .query_row(
                &format!("SELECT {} FROM furniture WHERE id = ?1", FURNITURE_COLUMNS),
                params![id.0],
                furniture_from_row,
            )
            .optional()?;
        Ok(furniture)
    }

    #[instrument(skip(self))]
    pub fn find_by_number(&self, number: &str) -> Result<Option<Furniture>> {
        let furniture = self
            .conn
            .query_row(
                &format!("SELECT {} FROM furniture WHERE number = ?1", FURNITURE_COLUMNS),
                params![number],
                furniture_from_row,
            )
            .optional()?;
        Ok(furniture)
    }

    /// Load several items at once; missing ids are simply absent
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub fn find_many(&self, ids: &[FurnitureId]) -> Result<Vec<Furniture>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM furniture WHERE id IN ({}) ORDER BY id",
            FURNITURE_COLUMNS,
            placeholders(1, ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let furniture = stmt
            .query_map(params_from_iter(ids.iter().map(|id| id.0)), furniture_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(furniture)
    }

    /// List furniture ordered by zone then number
    #[instrument(skip(self))]
    pub fn list(&self, active_only: bool) -> Result<Vec<Furniture>> {
        let sql = format!(
            "SELECT {} FROM furniture WHERE (?1 = 0 OR active = 1) ORDER BY zone, number",
            FURNITURE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let furniture = stmt
            .query_map(params![active_only as i32], furniture_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(furniture)
    }

    #[instrument(skip(self))]
    pub fn set_active(&self, id: FurnitureId, active: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE furniture SET active = ?1 WHERE id = ?2",
            params![active as i32, id.0],
        )?;
        Ok(())
    }
}

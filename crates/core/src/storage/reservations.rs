//! Reservation and assignment storage
//!
//! Plain row access. Nothing here opens a transaction: callers running a
//! booking hand in the connection of their [`super::WriteTxn`].

use chrono::{NaiveDate, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{
    date_to_sql, parse_date, parse_datetime, parse_state, parse_state_opt, parse_uuid,
    parse_uuid_opt, placeholders,
};
use crate::error::Result;
use crate::models::{FurnitureId, Reservation, ReservationState, StateChange};

const RESERVATION_COLUMNS: &str = "id, ticket_number, customer_id, reservation_date, start_date, \
     end_date, party_size, state, parent_id, notes, created_at";

/// Reservation row without its furniture
fn reservation_from_row(row: &Row<'_>) -> rusqlite::Result<Reservation> {
    Ok(Reservation {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        ticket_number: row.get(1)?,
        customer_id: parse_uuid(&row.get::<_, String>(2)?)?,
        reservation_date: parse_date(&row.get::<_, String>(3)?)?,
        start_date: parse_date(&row.get::<_, String>(4)?)?,
        end_date: parse_date(&row.get::<_, String>(5)?)?,
        party_size: row.get(6)?,
        state: parse_state(&row.get::<_, String>(7)?)?,
        parent_id: parse_uuid_opt(row.get::<_, Option<String>>(8)?)?,
        notes: row.get(9)?,
        created_at: parse_datetime(&row.get::<_, String>(10)?)?,
        furniture_ids: Vec::new(),
    })
}

/// One assignment joined with the state of its reservation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyRow {
    pub furniture_id: FurnitureId,
    pub date: NaiveDate,
    pub reservation_id: Uuid,
    pub ticket_number: String,
    pub state: ReservationState,
}

/// A (furniture, date) held by more than one reservation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyClash {
    pub furniture_id: FurnitureId,
    pub date: NaiveDate,
    pub tickets: Vec<String>,
}

fn occupancy_from_row(row: &Row<'_>) -> rusqlite::Result<OccupancyRow> {
    Ok(OccupancyRow {
        furniture_id: FurnitureId(row.get(0)?),
        date: parse_date(&row.get::<_, String>(1)?)?,
        reservation_id: parse_uuid(&row.get::<_, String>(2)?)?,
        ticket_number: row.get(3)?,
        state: parse_state(&row.get::<_, String>(4)?)?,
    })
}

pub struct ReservationStore<'a> {
    conn: &'a Connection,
}

impl<'a> ReservationStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Next ticket for a date: `YYMMDD` plus a 3-digit per-date sequence.
    ///
    /// Only race-free inside a write transaction.
    pub fn next_ticket(&self, date: NaiveDate) -> Result<(u32, String)> {
        let last: Option<u32> = self.conn.query_row(
            "SELECT MAX(ticket_seq) FROM reservations WHERE reservation_date = ?1",
            params![date_to_sql(date)],
            |row| row.get(0),
        )?;
        let seq = last.unwrap_or(0) + 1;
        Ok((seq, format!("{}{:03}", date.format("%y%m%d"), seq)))
    }

    /// Insert the reservation row. Assignments are written separately.
    #[instrument(skip(self, reservation), fields(ticket = %reservation.ticket_number, date = %reservation.reservation_date))]
    pub fn insert(&self, reservation: &Reservation, ticket_seq: u32) -> Result<()> {
        self.conn.execute(
            "INSERT INTO reservations (id, ticket_number, ticket_seq, customer_id, reservation_date,
                start_date, end_date, party_size, state, parent_id, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                reservation.id.to_string(),
                reservation.ticket_number,
                ticket_seq,
                reservation.customer_id.to_string(),
                date_to_sql(reservation.reservation_date),
                date_to_sql(reservation.start_date),
                date_to_sql(reservation.end_date),
                reservation.party_size,
                reservation.state.as_str(),
                reservation.parent_id.map(|p| p.to_string()),
                reservation.notes,
                reservation.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Assign furniture to a reservation for one date
    #[instrument(skip(self, furniture_ids), fields(count = furniture_ids.len()))]
    pub fn insert_assignments(
        &self,
        reservation_id: Uuid,
        date: NaiveDate,
        furniture_ids: &[FurnitureId],
    ) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO reservation_furniture (reservation_id, furniture_id, assignment_date)
             VALUES (?1, ?2, ?3)",
        )?;
        let date = date_to_sql(date);
        for furniture_id in furniture_ids {
            stmt.execute(params![reservation_id.to_string(), furniture_id.0, date])?;
        }
        Ok(())
    }

    /// Remove every assignment of a reservation
    #[instrument(skip(self))]
    pub fn delete_assignments(&self, reservation_id: Uuid) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM reservation_furniture WHERE reservation_id = ?1",
            params![reservation_id.to_string()],
        )?;
        Ok(deleted)
    }

    /// Furniture assigned to a reservation
    pub fn furniture_for(&self, reservation_id: Uuid) -> Result<Vec<FurnitureId>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT furniture_id FROM reservation_furniture
             WHERE reservation_id = ?1 ORDER BY furniture_id",
        )?;
        let ids = stmt
            .query_map(params![reservation_id.to_string()], |row| {
                Ok(FurnitureId(row.get(0)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn with_furniture(&self, mut reservation: Reservation) -> Result<Reservation> {
        reservation.furniture_ids = self.furniture_for(reservation.id)?;
        Ok(reservation)
    }

    fn query_reservations(&self, sql: &str, param: String) -> Result<Vec<Reservation>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![param], reservation_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(|r| self.with_furniture(r)).collect()
    }

    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Reservation>> {
        let reservation = self
            .conn
            .query_row(
                &format!("SELECT {} FROM reservations WHERE id = ?1", RESERVATION_COLUMNS),
                params![id.to_string()],
                reservation_from_row,
            )
            .optional()?;
        reservation.map(|r| self.with_furniture(r)).transpose()
    }

    #[instrument(skip(self))]
    pub fn find_by_ticket(&self, ticket_number: &str) -> Result<Option<Reservation>> {
        let reservation = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM reservations WHERE ticket_number = ?1",
                    RESERVATION_COLUMNS
                ),
                params![ticket_number],
                reservation_from_row,
            )
            .optional()?;
        reservation.map(|r| self.with_furniture(r)).transpose()
    }

    #[instrument(skip(self))]
    pub fn list_for_customer(&self, customer_id: Uuid) -> Result<Vec<Reservation>> {
        self.query_reservations(
            &format!(
                "SELECT {} FROM reservations WHERE customer_id = ?1
                 ORDER BY reservation_date, ticket_number",
                RESERVATION_COLUMNS
            ),
            customer_id.to_string(),
        )
    }

    /// Every leg of the stay identified by `group_id`, by date
    #[instrument(skip(self))]
    pub fn list_stay(&self, group_id: Uuid) -> Result<Vec<Reservation>> {
        self.query_reservations(
            &format!(
                "SELECT {} FROM reservations WHERE id = ?1 OR parent_id = ?1
                 ORDER BY reservation_date",
                RESERVATION_COLUMNS
            ),
            group_id.to_string(),
        )
    }

    #[instrument(skip(self))]
    pub fn count_for_customer(&self, customer_id: Uuid) -> Result<u64> {
        let count: u64 = self.conn.query_row(
            "SELECT COUNT(*) FROM reservations WHERE customer_id = ?1",
            params![customer_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    #[instrument(skip(self))]
    pub fn set_state(&self, id: Uuid, state: ReservationState) -> Result<usize> {
        let updated = self.conn.execute(
            "UPDATE reservations SET state = ?1 WHERE id = ?2",
            params![state.as_str(), id.to_string()],
        )?;
        Ok(updated)
    }

    /// Delete a reservation; assignments, history and (for a parent) legs cascade
    #[instrument(skip(self))]
    pub fn delete(&self, id: Uuid) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM reservations WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(deleted)
    }

    pub fn record_state_change(
        &self,
        reservation_id: Uuid,
        from_state: Option<ReservationState>,
        to_state: ReservationState,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO reservation_state_history (reservation_id, from_state, to_state, changed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                reservation_id.to_string(),
                from_state.map(|s| s.as_str()),
                to_state.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn state_history(&self, reservation_id: Uuid) -> Result<Vec<StateChange>> {
        let mut stmt = self.conn.prepare(
            "SELECT reservation_id, from_state, to_state, changed_at
             FROM reservation_state_history WHERE reservation_id = ?1 ORDER BY id",
        )?;
        let history = stmt
            .query_map(params![reservation_id.to_string()], |row| {
                Ok(StateChange {
                    reservation_id: parse_uuid(&row.get::<_, String>(0)?)?,
                    from_state: parse_state_opt(row.get::<_, Option<String>>(1)?)?,
                    to_state: parse_state(&row.get::<_, String>(2)?)?,
                    changed_at: parse_datetime(&row.get::<_, String>(3)?)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(history)
    }

    /// Assignments on the given furniture and dates, whatever their state
    #[instrument(skip(self, furniture_ids, dates), fields(furniture = furniture_ids.len(), dates = dates.len()))]
    pub fn occupancy(
        &self,
        furniture_ids: &[FurnitureId],
        dates: &[NaiveDate],
    ) -> Result<Vec<OccupancyRow>> {
        if furniture_ids.is_empty() || dates.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT rf.furniture_id, rf.assignment_date, r.id, r.ticket_number, r.state
             FROM reservation_furniture rf
             INNER JOIN reservations r ON r.id = rf.reservation_id
             WHERE rf.furniture_id IN ({}) AND rf.assignment_date IN ({})
             ORDER BY rf.assignment_date, rf.furniture_id, r.ticket_number",
            placeholders(1, furniture_ids.len()),
            placeholders(furniture_ids.len() + 1, dates.len()),
        );
        let values: Vec<rusqlite::types::Value> = furniture_ids
            .iter()
            .map(|id| rusqlite::types::Value::Integer(id.0))
            .chain(dates.iter().map(|d| rusqlite::types::Value::Text(date_to_sql(*d))))
            .collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), occupancy_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Assignments on one furniture item within an inclusive date range
    #[instrument(skip(self))]
    pub fn occupancy_in_range(
        &self,
        furniture_id: FurnitureId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OccupancyRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT rf.furniture_id, rf.assignment_date, r.id, r.ticket_number, r.state
             FROM reservation_furniture rf
             INNER JOIN reservations r ON r.id = rf.reservation_id
             WHERE rf.furniture_id = ?1 AND rf.assignment_date BETWEEN ?2 AND ?3
             ORDER BY rf.assignment_date, r.ticket_number",
        )?;
        let rows = stmt
            .query_map(
                params![furniture_id.0, date_to_sql(start_date), date_to_sql(end_date)],
                occupancy_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Slots that would be held more than once if exactly `occupying`
    /// states held their furniture
    #[instrument(skip(self, occupying), fields(states = occupying.len()))]
    pub fn clashes_under(&self, occupying: &[ReservationState]) -> Result<Vec<OccupancyClash>> {
        if occupying.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT rf.furniture_id, rf.assignment_date, GROUP_CONCAT(r.ticket_number, ',')
             FROM reservation_furniture rf
             INNER JOIN reservations r ON r.id = rf.reservation_id
             WHERE r.state IN ({})
             GROUP BY rf.furniture_id, rf.assignment_date
             HAVING COUNT(*) > 1
             ORDER BY rf.assignment_date, rf.furniture_id",
            placeholders(1, occupying.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let clashes = stmt
            .query_map(
                params_from_iter(occupying.iter().map(|s| s.as_str())),
                |row| {
                    let tickets: String = row.get(2)?;
                    let mut tickets: Vec<String> =
                        tickets.split(',').map(str::to_string).collect();
                    tickets.sort();
                    Ok(OccupancyClash {
                        furniture_id: FurnitureId(row.get(0)?),
                        date: parse_date(&row.get::<_, String>(1)?)?,
                        tickets,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(clashes)
    }

    /// Tickets in `occupying` states whose assignments fall inside a block
    #[instrument(skip(self, occupying), fields(states = occupying.len()))]
    pub fn blocked_under(&self, occupying: &[ReservationState]) -> Result<Vec<String>> {
        if occupying.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT DISTINCT r.ticket_number
             FROM reservation_furniture rf
             INNER JOIN reservations r ON r.id = rf.reservation_id
             INNER JOIN furniture_blocks b ON b.furniture_id = rf.furniture_id
                AND rf.assignment_date BETWEEN b.start_date AND b.end_date
             WHERE r.state IN ({})
             ORDER BY r.ticket_number",
            placeholders(1, occupying.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let tickets = stmt
            .query_map(
                params_from_iter(occupying.iter().map(|s| s.as_str())),
                |row| row.get(0),
            )?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(tickets)
    }
}

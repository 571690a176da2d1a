//! Reservation state catalog storage

use rusqlite::{params, Connection};
use tracing::{info, instrument};

use crate::error::Result;
use crate::models::ReservationState;

/// Raw catalog row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRow {
    pub code: String,
    pub name: String,
    pub is_releasing: bool,
}

pub struct StateStore<'a> {
    conn: &'a Connection,
}

impl<'a> StateStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Every catalog row in display order
    #[instrument(skip(self))]
    pub fn rows(&self) -> Result<Vec<StateRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT code, name, is_releasing FROM reservation_states ORDER BY display_order",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StateRow {
                    code: row.get(0)?,
                    name: row.get(1)?,
                    is_releasing: row.get::<_, i32>(2)? != 0,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Make exactly `releasing` the releasing states. Startup only.
    #[instrument(skip(self))]
    pub fn set_releasing(&self, releasing: &[ReservationState]) -> Result<()> {
        for state in ReservationState::all() {
            let is_releasing = releasing.contains(state);
            self.conn.execute(
                "UPDATE reservation_states SET is_releasing = ?1 WHERE code = ?2",
                params![is_releasing as i32, state.as_str()],
            )?;
        }
        info!(count = releasing.len(), "Releasing states configured");
        Ok(())
    }
}

//! SQLite storage layer
//!
//! [`Database`] owns one connection. Row-level stores borrow either that
//! connection (plain reads) or the connection of an open [`WriteTxn`].

mod blocks;
mod furniture;
mod migrations;
mod parse;
mod reservations;
mod states;
mod traits;
mod txn;

use rusqlite::Connection;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, instrument, warn};

use crate::config::{DatabaseConfig, EngineConfig, JournalMode};
use crate::error::{Error, Result};
use crate::models::{Furniture, NewFurniture, ReservationState};

pub use blocks::BlockStore;
pub use furniture::FurnitureStore;
pub use reservations::{OccupancyClash, OccupancyRow, ReservationStore};
pub use states::{StateRow, StateStore};
pub use traits::BookingEngine;
pub use txn::{ReadTxn, TxnHandle, WriteTxn};

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path with default settings
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::configure(&conn, &DatabaseConfig::default())?;
        let mut db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open the database described by a configuration file, creating the
    /// parent directory and applying the state catalog overrides
    #[instrument(skip(config))]
    pub fn open_with_config(config: &EngineConfig) -> Result<Self> {
        let path = config.database_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        Self::configure(&conn, &config.database)?;
        let mut db = Self { conn };
        db.init()?;

        if let Some(releasing) = &config.states.releasing {
            db.configure_releasing_states(releasing)?;
        }

        info!(path = %path.display(), "Database ready");
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let mut db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn configure(conn: &Connection, settings: &DatabaseConfig) -> Result<()> {
        // Before anything that may need a lock
        conn.busy_timeout(std::time::Duration::from_millis(settings.busy_timeout_ms))?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let mode: String = conn.pragma_update_and_check(
            None,
            "journal_mode",
            settings.journal_mode.as_pragma(),
            |row| row.get(0),
        )?;
        if settings.journal_mode == JournalMode::Wal && !mode.eq_ignore_ascii_case("wal") {
            warn!(mode = %mode, "WAL journal mode not available");
        }
        Ok(())
    }

    /// Initialize database schema via migrations
    fn init(&mut self) -> Result<()> {
        migrations::run_migrations(&mut self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> Result<u32> {
        let version: Option<u32> =
            self.conn
                .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                    row.get(0)
                })?;
        Ok(version.unwrap_or(0))
    }

    /// Acquire the write lock (`BEGIN IMMEDIATE`).
    ///
    /// The returned handle borrows the connection exclusively until it is
    /// committed, rolled back or dropped.
    pub fn begin_write(&mut self) -> Result<WriteTxn<'_>> {
        WriteTxn::begin(&mut self.conn)
    }

    /// Open a deferred read snapshot
    pub fn begin_read(&mut self) -> Result<ReadTxn<'_>> {
        ReadTxn::begin(&mut self.conn)
    }

    /// Underlying connection, for reads outside any transaction
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Get furniture store (reads outside any transaction)
    pub fn furniture(&self) -> FurnitureStore<'_> {
        FurnitureStore::new(&self.conn)
    }

    /// Get reservation store (reads outside any transaction)
    pub fn reservations(&self) -> ReservationStore<'_> {
        ReservationStore::new(&self.conn)
    }

    /// Get block store (reads outside any transaction)
    pub fn blocks(&self) -> BlockStore<'_> {
        BlockStore::new(&self.conn)
    }

    /// Get state catalog store
    pub fn states(&self) -> StateStore<'_> {
        StateStore::new(&self.conn)
    }

    /// Replace the set of releasing states.
    ///
    /// A no-op when the catalog already matches. Refused with
    /// `InvalidOperation` if the new set would make existing reservations
    /// hold the same slot twice, or hold a blocked slot.
    #[instrument(skip(self))]
    pub fn configure_releasing_states(&mut self, releasing: &[ReservationState]) -> Result<()> {
        if releasing.contains(&ReservationState::Confirmed) {
            return Err(Error::Validation(
                "'confirmed' cannot be a releasing state".to_string(),
            ));
        }
        let wanted: BTreeSet<ReservationState> = releasing.iter().copied().collect();

        let txn = self.begin_write()?;
        let current: BTreeSet<ReservationState> = txn
            .states()
            .rows()?
            .into_iter()
            .filter(|row| row.is_releasing)
            .filter_map(|row| ReservationState::from_str(&row.code))
            .collect();
        if current == wanted {
            return txn.commit();
        }

        let occupying: Vec<ReservationState> = ReservationState::all()
            .iter()
            .copied()
            .filter(|s| !wanted.contains(s))
            .collect();

        // Dropping txn on the error paths rolls back
        if let Some(clash) = txn.reservations().clashes_under(&occupying)?.first() {
            warn!(furniture_id = %clash.furniture_id, date = %clash.date, "Releasing states would double-book");
            return Err(Error::InvalidOperation(format!(
                "releasing states {:?} would give {} on {} to tickets {}",
                releasing,
                clash.furniture_id,
                clash.date,
                clash.tickets.join(", ")
            )));
        }
        let blocked = txn.reservations().blocked_under(&occupying)?;
        if !blocked.is_empty() {
            return Err(Error::InvalidOperation(format!(
                "releasing states {:?} would put blocked furniture back in use by tickets {}",
                releasing,
                blocked.join(", ")
            )));
        }

        txn.states().set_releasing(releasing)?;
        txn.commit()
    }

    /// Insert or update catalog furniture by number, all or nothing
    #[instrument(skip(self, seeds), fields(count = seeds.len()))]
    pub fn seed_furniture(&mut self, seeds: &[NewFurniture]) -> Result<Vec<Furniture>> {
        let txn = self.begin_write()?;
        let stored = seeds
            .iter()
            .map(|seed| txn.furniture().upsert(seed))
            .collect::<Result<Vec<_>>>()?;
        txn.commit()?;
        info!(count = stored.len(), "Furniture catalog seeded");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlockType, NewFurnitureBlock, NewReservation, Reservation};
    use chrono::NaiveDate;
    use tempfile::tempdir;
    use uuid::Uuid;

    #[test]
    fn test_open_in_memory_runs_migrations() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.schema_version().unwrap() >= 3);
    }

    #[test]
    fn test_open_file_twice() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("beach.db");

        let first = Database::open(&path).unwrap();
        let version = first.schema_version().unwrap();
        drop(first);

        let second = Database::open(&path).unwrap();
        assert_eq!(second.schema_version().unwrap(), version);
    }

    #[test]
    fn test_open_with_config_applies_states() {
        let dir = tempdir().unwrap();
        let toml = format!(
            "[database]\npath = {:?}\n\n[states]\nreleasing = [\"cancelled\"]\n",
            dir.path().join("nested").join("beach.db")
        );
        let config = EngineConfig::from_toml(&toml).unwrap();
        let db = Database::open_with_config(&config).unwrap();

        let rows = db.states().rows().unwrap();
        let releasing: Vec<_> = rows
            .iter()
            .filter(|r| r.is_releasing)
            .map(|r| r.code.as_str())
            .collect();
        assert_eq!(releasing, vec!["cancelled"]);
    }

    fn rebooked_after_cancel(db: &mut Database) -> (Reservation, Reservation) {
        let f1 = db
            .seed_furniture(&[NewFurniture::new("A-01", "front_row", "sunbed")])
            .unwrap()[0]
            .id;
        let date = NaiveDate::from_ymd_opt(2026, 7, 10).unwrap();
        let first = db
            .create_reservation(&NewReservation::new(Uuid::new_v4(), date, 2, vec![f1]))
            .unwrap();
        db.change_state(first.id, ReservationState::Cancelled).unwrap();
        let second = db
            .create_reservation(&NewReservation::new(Uuid::new_v4(), date, 2, vec![f1]))
            .unwrap();
        (first, second)
    }

    fn releasing_codes(db: &Database) -> Vec<String> {
        db.states()
            .rows()
            .unwrap()
            .into_iter()
            .filter(|r| r.is_releasing)
            .map(|r| r.code)
            .collect()
    }

    #[test]
    fn test_releasing_change_refused_when_it_would_double_book() {
        let mut db = Database::open_in_memory().unwrap();
        let (first, second) = rebooked_after_cancel(&mut db);
        let before = releasing_codes(&db);

        let err = db
            .configure_releasing_states(&[ReservationState::NoShow])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
        assert!(err.to_string().contains(&first.ticket_number));
        assert!(err.to_string().contains(&second.ticket_number));
        assert_eq!(releasing_codes(&db), before);

        // dropping no_show is harmless, nobody is in that state
        db.configure_releasing_states(&[ReservationState::Cancelled])
            .unwrap();
        assert_eq!(releasing_codes(&db), vec!["cancelled"]);
    }

    #[test]
    fn test_reopen_with_conflicting_states_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("beach.db");
        {
            let mut db = Database::open(&path).unwrap();
            rebooked_after_cancel(&mut db);
        }

        let toml = format!("[database]\npath = {:?}\n\n[states]\nreleasing = [\"no_show\"]\n", path);
        let config = EngineConfig::from_toml(&toml).unwrap();
        assert!(matches!(
            Database::open_with_config(&config),
            Err(Error::InvalidOperation(_))
        ));

        let db = Database::open(&path).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 7, 10).unwrap();
        let f1 = db.furniture().find_by_number("A-01").unwrap().unwrap().id;
        let occupying = db
            .reservations()
            .occupancy(&[f1], &[date])
            .unwrap()
            .into_iter()
            .filter(|row| row.state == ReservationState::Confirmed)
            .count();
        assert_eq!(occupying, 1);
        assert!(releasing_codes(&db).contains(&"cancelled".to_string()));
    }

    #[test]
    fn test_releasing_change_refused_over_block() {
        let mut db = Database::open_in_memory().unwrap();
        let f1 = db
            .seed_furniture(&[NewFurniture::new("A-01", "front_row", "sunbed")])
            .unwrap()[0]
            .id;
        let date = NaiveDate::from_ymd_opt(2026, 7, 10).unwrap();
        let booked = db
            .create_reservation(&NewReservation::new(Uuid::new_v4(), date, 2, vec![f1]))
            .unwrap();
        db.change_state(booked.id, ReservationState::Expired).unwrap();
        db.create_furniture_block(&NewFurnitureBlock::new(f1, date, date, BlockType::Event))
            .unwrap();

        let err = db
            .configure_releasing_states(&[ReservationState::Cancelled])
            .unwrap_err();
        assert!(err.to_string().contains(&booked.ticket_number));
        assert!(matches!(
            db.configure_releasing_states(&[ReservationState::Confirmed]),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_seed_furniture_upserts() {
        let mut db = Database::open_in_memory().unwrap();
        let seeds = vec![
            NewFurniture::new("A-01", "front_row", "sunbed"),
            NewFurniture::new("A-02", "front_row", "sunbed"),
        ];
        let first = db.seed_furniture(&seeds).unwrap();
        assert_eq!(first.len(), 2);

        let reseeded = db
            .seed_furniture(&[NewFurniture::new("A-01", "vip", "balinese_bed").with_capacity(4)])
            .unwrap();
        assert_eq!(reseeded[0].id, first[0].id);
        assert_eq!(reseeded[0].zone, "vip");
        assert_eq!(db.furniture().list(false).unwrap().len(), 2);
    }

    #[test]
    fn test_dropped_write_txn_rolls_back() {
        let mut db = Database::open_in_memory().unwrap();
        {
            let txn = db.begin_write().unwrap();
            txn.furniture()
                .create(&NewFurniture::new("A-01", "front_row", "sunbed"))
                .unwrap();
            // dropped without commit
        }
        assert!(db.furniture().list(false).unwrap().is_empty());
    }
}

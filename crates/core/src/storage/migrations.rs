//! Database migration system
//!
//! Tracks schema versions and applies migrations in order.

use rusqlite::{Connection, TransactionBehavior};
use tracing::{info, instrument};

use crate::error::Result;

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: r#"
            -- Bookable furniture
            CREATE TABLE IF NOT EXISTS furniture (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                number TEXT NOT NULL UNIQUE,
                zone TEXT NOT NULL,
                furniture_type TEXT NOT NULL,
                capacity INTEGER NOT NULL DEFAULT 2,
                active INTEGER NOT NULL DEFAULT 1
            );

            -- Closed catalog of lifecycle states
            CREATE TABLE IF NOT EXISTS reservation_states (
                code TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                is_releasing INTEGER NOT NULL,
                display_order INTEGER NOT NULL
            );

            INSERT OR IGNORE INTO reservation_states (code, name, is_releasing, display_order) VALUES
                ('pending', 'Pending', 0, 1),
                ('confirmed', 'Confirmed', 0, 2),
                ('seated', 'Seated', 0, 3),
                ('completed', 'Completed', 1, 4),
                ('cancelled', 'Cancelled', 1, 5),
                ('no_show', 'No-show', 1, 6),
                ('expired', 'Expired', 1, 7);

            -- Reservations; multi-day stays are one row per day
            CREATE TABLE IF NOT EXISTS reservations (
                id TEXT PRIMARY KEY,
                ticket_number TEXT NOT NULL UNIQUE,
                ticket_seq INTEGER NOT NULL,
                customer_id TEXT NOT NULL,
                reservation_date TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                party_size INTEGER NOT NULL,
                state TEXT NOT NULL,
                parent_id TEXT,
                notes TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (state) REFERENCES reservation_states(code),
                FOREIGN KEY (parent_id) REFERENCES reservations(id) ON DELETE CASCADE
            );

            -- Occupancy: one row per (reservation, furniture, date)
            CREATE TABLE IF NOT EXISTS reservation_furniture (
                reservation_id TEXT NOT NULL,
                furniture_id INTEGER NOT NULL,
                assignment_date TEXT NOT NULL,
                PRIMARY KEY (reservation_id, furniture_id, assignment_date),
                FOREIGN KEY (reservation_id) REFERENCES reservations(id) ON DELETE CASCADE,
                FOREIGN KEY (furniture_id) REFERENCES furniture(id)
            );

            -- Administrative holds, inclusive date range
            CREATE TABLE IF NOT EXISTS furniture_blocks (
                id TEXT PRIMARY KEY,
                furniture_id INTEGER NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                block_type TEXT NOT NULL,
                reason TEXT,
                created_by TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (furniture_id) REFERENCES furniture(id) ON DELETE CASCADE,
                CHECK (start_date <= end_date)
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Add indexes for availability queries",
        sql: r#"
            CREATE INDEX IF NOT EXISTS idx_assignments_slot
                ON reservation_furniture(furniture_id, assignment_date);
            CREATE INDEX IF NOT EXISTS idx_reservations_customer ON reservations(customer_id);
            CREATE INDEX IF NOT EXISTS idx_reservations_parent ON reservations(parent_id);
            CREATE INDEX IF NOT EXISTS idx_reservations_date ON reservations(reservation_date);
            CREATE INDEX IF NOT EXISTS idx_blocks_furniture_range
                ON furniture_blocks(furniture_id, start_date, end_date);
        "#,
    },
    Migration {
        version: 3,
        description: "Add reservation state history",
        sql: r#"
            CREATE TABLE IF NOT EXISTS reservation_state_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                reservation_id TEXT NOT NULL,
                -- NULL for the state a reservation was created in
                from_state TEXT,
                to_state TEXT NOT NULL,
                changed_at TEXT NOT NULL,
                FOREIGN KEY (reservation_id) REFERENCES reservations(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_state_history_reservation
                ON reservation_state_history(reservation_id);
        "#,
    },
];

/// Initialize the migrations table
fn init_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version
fn get_current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })?;
    Ok(version.unwrap_or(0))
}

/// Record that a migration was applied
fn record_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Run all pending migrations
///
/// Runs inside an immediate transaction so two processes opening the same
/// file serialize on the version check.
#[instrument(skip(conn))]
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    init_migrations_table(&tx)?;

    let current_version = get_current_version(&tx)?;
    info!(current_version, "Checking for pending migrations");

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                description = migration.description,
                "Applying migration"
            );

            tx.execute_batch(migration.sql)?;
            record_migration(&tx, migration)?;

            info!(version = migration.version, "Migration complete");
        }
    }

    let new_version = get_current_version(&tx)?;
    tx.commit()?;

    if new_version > current_version {
        info!(
            from = current_version,
            to = new_version,
            "Database schema updated"
        );
    }

    Ok(())
}

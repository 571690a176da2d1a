//! Beachbook Core Library
//!
//! Furniture catalog, reservations, blocks and the transactional booking
//! engine over SQLite.

pub mod booking;
pub mod config;
pub mod error;
pub mod invariants;
pub mod models;
pub mod storage;

pub use booking::{
    check_availability_in, create_furniture_block_in, create_multiday_reservation_in,
    create_reservation_in, releasing_states, StateCatalog,
};
pub use config::{default_config_path, DatabaseConfig, EngineConfig, JournalMode, StatesConfig};
pub use error::{Error, Result};
pub use models::*;
pub use storage::{BookingEngine, Database, ReadTxn, TxnHandle, WriteTxn};

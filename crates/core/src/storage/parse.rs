//! Database value parsing utilities
//!
//! Provides error-safe parsing of stored values.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::Error as SqlError;
use uuid::Uuid;

use crate::models::{BlockType, ReservationState};

/// Storage format for calendar dates; sorts lexicographically
const DATE_FORMAT: &str = "%Y-%m-%d";

fn conversion_error<E>(column: usize, e: E) -> SqlError
where
    E: std::error::Error + Send + Sync + 'static,
{
    SqlError::FromSqlConversionFailure(column, Type::Text, Box::new(e))
}

#[derive(Debug)]
struct UnknownCode(String);

impl std::fmt::Display for UnknownCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown code '{}'", self.0)
    }
}

impl std::error::Error for UnknownCode {}

/// Parse a UUID from a database string column
pub fn parse_uuid(s: &str) -> Result<Uuid, SqlError> {
    Uuid::parse_str(s).map_err(|e| conversion_error(0, e))
}

/// Parse an optional UUID from a database string column
pub fn parse_uuid_opt(s: Option<String>) -> Result<Option<Uuid>, SqlError> {
    s.map(|s| parse_uuid(&s)).transpose()
}

/// Parse a DateTime from an RFC3339 string
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(0, e))
}

/// Parse a calendar date stored as YYYY-MM-DD
pub fn parse_date(s: &str) -> Result<NaiveDate, SqlError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| conversion_error(0, e))
}

/// Format a calendar date for storage
pub fn date_to_sql(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Convert a stored state code to ReservationState
pub fn parse_state(s: &str) -> Result<ReservationState, SqlError> {
    ReservationState::from_str(s).ok_or_else(|| conversion_error(0, UnknownCode(s.to_string())))
}

/// Convert an optional stored state code
pub fn parse_state_opt(s: Option<String>) -> Result<Option<ReservationState>, SqlError> {
    s.map(|s| parse_state(&s)).transpose()
}

/// Convert a stored block type code to BlockType
pub fn parse_block_type(s: &str) -> Result<BlockType, SqlError> {
    BlockType::from_str(s).ok_or_else(|| conversion_error(0, UnknownCode(s.to_string())))
}

/// `?1, ?2, ... ?n` starting at `first`
pub fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_round_trip() {
        let date = NaiveDate::from_ymd_opt(2026, 7, 10).unwrap();
        assert_eq!(date_to_sql(date), "2026-07-10");
        assert_eq!(parse_date("2026-07-10").unwrap(), date);
        assert!(parse_date("10/07/2026").is_err());
    }

    #[test]
    fn test_unknown_state_is_error() {
        assert_eq!(parse_state("no_show").unwrap(), ReservationState::NoShow);
        assert!(parse_state("vanished").is_err());
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1, 3), "?1, ?2, ?3");
        assert_eq!(placeholders(4, 1), "?4");
        assert_eq!(placeholders(1, 0), "");
    }
}

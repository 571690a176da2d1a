//! Error types for the booking engine

use thiserror::Error;

use crate::models::{BlockedSlot, Conflict};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Furniture unavailable: {}", describe_unavailable(conflicts, blocked))]
    FurnitureUnavailable {
        conflicts: Vec<Conflict>,
        blocked: Vec<BlockedSlot>,
    },

    #[error("Active reservations in blocked range: {}", tickets.join(", "))]
    ActiveReservationConflict { tickets: Vec<String> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Conflicts the caller may retry with different furniture or dates.
    /// Everything else is either the caller's fault or fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::FurnitureUnavailable { .. } | Error::ActiveReservationConflict { .. }
        )
    }

    /// Ticket numbers named by a conflict error, in order, without repeats.
    pub fn conflicting_tickets(&self) -> Vec<String> {
        let named: Vec<&String> = match self {
            Error::FurnitureUnavailable { conflicts, .. } => {
                conflicts.iter().map(|c| &c.ticket_number).collect()
            }
            Error::ActiveReservationConflict { tickets } => tickets.iter().collect(),
            _ => Vec::new(),
        };
        let mut tickets: Vec<String> = Vec::with_capacity(named.len());
        for ticket in named {
            if !tickets.contains(ticket) {
                tickets.push(ticket.clone());
            }
        }
        tickets
    }
}

fn describe_unavailable(conflicts: &[Conflict], blocked: &[BlockedSlot]) -> String {
    let mut parts: Vec<String> = conflicts
        .iter()
        .map(|c| format!("{} on {} held by ticket {}", c.furniture_id, c.date, c.ticket_number))
        .collect();
    parts.extend(
        blocked
            .iter()
            .map(|b| format!("{} on {} blocked ({})", b.furniture_id, b.date, b.block_type)),
    );
    parts.join("; ")
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FurnitureId;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn conflict(furniture: i64, ticket: &str) -> Conflict {
        Conflict {
            date: NaiveDate::from_ymd_opt(2026, 7, 10).unwrap(),
            furniture_id: FurnitureId(furniture),
            ticket_number: ticket.to_string(),
            reservation_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_conflicting_tickets_without_repeats() {
        let err = Error::FurnitureUnavailable {
            conflicts: vec![
                conflict(1, "260710001"),
                conflict(2, "260710002"),
                conflict(3, "260710001"),
            ],
            blocked: Vec::new(),
        };
        assert_eq!(err.conflicting_tickets(), vec!["260710001", "260710002"]);
        assert!(err.to_string().contains("furniture #3 on 2026-07-10 held by ticket 260710001"));
    }

    #[test]
    fn test_only_conflicts_are_recoverable() {
        assert!(Error::ActiveReservationConflict { tickets: vec![] }.is_recoverable());
        assert!(!Error::Validation("x".into()).is_recoverable());
        assert!(!Error::Database(rusqlite::Error::InvalidQuery).is_recoverable());
        assert!(Error::NotFound("x".into()).conflicting_tickets().is_empty());
    }
}

//! Reservation lifecycle states

use serde::{Deserialize, Serialize};

/// Closed set of lifecycle states a reservation can be in.
///
/// Whether a state releases its furniture is not decided here but by the
/// `reservation_states` catalog (see [`crate::booking::StateCatalog`]).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ReservationState {
    Pending,
    #[default]
    Confirmed,
    Seated,
    Completed,
    Cancelled,
    NoShow,
    Expired,
}

impl ReservationState {
    /// Code stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationState::Pending => "pending",
            ReservationState::Confirmed => "confirmed",
            ReservationState::Seated => "seated",
            ReservationState::Completed => "completed",
            ReservationState::Cancelled => "cancelled",
            ReservationState::NoShow => "no_show",
            ReservationState::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReservationState::Pending),
            "confirmed" => Some(ReservationState::Confirmed),
            "seated" => Some(ReservationState::Seated),
            "completed" => Some(ReservationState::Completed),
            "cancelled" => Some(ReservationState::Cancelled),
            "no_show" => Some(ReservationState::NoShow),
            "expired" => Some(ReservationState::Expired),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ReservationState::Pending => "Pending",
            ReservationState::Confirmed => "Confirmed",
            ReservationState::Seated => "Seated",
            ReservationState::Completed => "Completed",
            ReservationState::Cancelled => "Cancelled",
            ReservationState::NoShow => "No-show",
            ReservationState::Expired => "Expired",
        }
    }

    /// Releasing flag seeded into a fresh catalog
    pub fn releases_by_default(&self) -> bool {
        matches!(
            self,
            ReservationState::Completed
                | ReservationState::Cancelled
                | ReservationState::NoShow
                | ReservationState::Expired
        )
    }

    /// All states in lifecycle order
    pub fn all() -> &'static [ReservationState] {
        &[
            ReservationState::Pending,
            ReservationState::Confirmed,
            ReservationState::Seated,
            ReservationState::Completed,
            ReservationState::Cancelled,
            ReservationState::NoShow,
            ReservationState::Expired,
        ]
    }
}

impl std::fmt::Display for ReservationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for state in ReservationState::all() {
            assert_eq!(ReservationState::from_str(state.as_str()), Some(*state));
        }
        assert_eq!(ReservationState::from_str("checked_in"), None);
    }

    #[test]
    fn test_default_releasing_set() {
        let releasing: Vec<_> = ReservationState::all()
            .iter()
            .filter(|s| s.releases_by_default())
            .collect();
        assert_eq!(releasing.len(), 4);
        assert!(!ReservationState::Confirmed.releases_by_default());
        assert!(!ReservationState::Seated.releases_by_default());
        assert!(ReservationState::NoShow.releases_by_default());
    }

    #[test]
    fn test_serde_uses_codes() {
        #[derive(Deserialize)]
        struct Wrap {
            state: ReservationState,
        }
        let wrap: Wrap = toml::from_str(r#"state = "no_show""#).unwrap();
        assert_eq!(wrap.state, ReservationState::NoShow);
    }
}

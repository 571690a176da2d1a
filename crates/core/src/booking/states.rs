//! Releasing vs occupying classification

use std::collections::BTreeSet;

use rusqlite::Connection;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::models::ReservationState;
use crate::storage::StateStore;

/// The state catalog, loaded into the closed [`ReservationState`] enum.
///
/// Loading fails unless every state has exactly one catalog row, so
/// [`StateCatalog::is_releasing`] is total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateCatalog {
    releasing: BTreeSet<ReservationState>,
}

impl StateCatalog {
    /// Read the catalog. Works on a plain connection or on the connection of
    /// an open transaction; never writes.
    #[instrument(skip(conn))]
    pub fn load(conn: &Connection) -> Result<Self> {
        let rows = StateStore::new(conn).rows()?;

        let mut seen = BTreeSet::new();
        let mut releasing = BTreeSet::new();
        for row in rows {
            let state = ReservationState::from_str(&row.code).ok_or_else(|| {
                Error::InvalidOperation(format!("unknown state '{}' in catalog", row.code))
            })?;
            seen.insert(state);
            if row.is_releasing {
                releasing.insert(state);
            }
        }

        if let Some(missing) = ReservationState::all().iter().find(|s| !seen.contains(s)) {
            return Err(Error::InvalidOperation(format!(
                "state catalog has no entry for '{}'",
                missing.as_str()
            )));
        }

        Ok(Self { releasing })
    }

    /// Catalog with the built-in defaults, without touching storage
    pub fn defaults() -> Self {
        Self {
            releasing: ReservationState::all()
                .iter()
                .copied()
                .filter(ReservationState::releases_by_default)
                .collect(),
        }
    }

    pub fn is_releasing(&self, state: ReservationState) -> bool {
        self.releasing.contains(&state)
    }

    pub fn occupies(&self, state: ReservationState) -> bool {
        !self.is_releasing(state)
    }

    pub fn releasing(&self) -> &BTreeSet<ReservationState> {
        &self.releasing
    }
}

/// States whose reservations do not hold their furniture
pub fn releasing_states(conn: &Connection) -> Result<BTreeSet<ReservationState>> {
    Ok(StateCatalog::load(conn)?.releasing)
}

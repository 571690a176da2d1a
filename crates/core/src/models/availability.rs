//! Availability query and result types

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BlockType, FurnitureId};

/// Which furniture/date pairs to check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub furniture_ids: BTreeSet<FurnitureId>,
    pub dates: BTreeSet<NaiveDate>,
    /// Reservation whose own assignments are ignored (edit flows)
    pub exclude_reservation: Option<Uuid>,
}

impl AvailabilityQuery {
    pub fn new(
        furniture_ids: impl IntoIterator<Item = FurnitureId>,
        dates: impl IntoIterator<Item = NaiveDate>,
    ) -> Self {
        Self {
            furniture_ids: furniture_ids.into_iter().collect(),
            dates: dates.into_iter().collect(),
            exclude_reservation: None,
        }
    }

    pub fn excluding(mut self, reservation_id: Uuid) -> Self {
        self.exclude_reservation = Some(reservation_id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.furniture_ids.is_empty() || self.dates.is_empty()
    }
}

/// A slot held by an occupying reservation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Conflict {
    pub date: NaiveDate,
    pub furniture_id: FurnitureId,
    pub ticket_number: String,
    pub reservation_id: Uuid,
}

/// A slot held by an administrative block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedSlot {
    pub date: NaiveDate,
    pub furniture_id: FurnitureId,
    pub block_id: Uuid,
    pub block_type: BlockType,
}

/// Per-(furniture, date) availability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityResult {
    pub all_available: bool,
    pub conflicts: Vec<Conflict>,
    pub blocked: Vec<BlockedSlot>,
    pub matrix: BTreeMap<NaiveDate, BTreeMap<FurnitureId, bool>>,
}

impl AvailabilityResult {
    pub fn is_available(&self, furniture_id: FurnitureId, date: NaiveDate) -> Option<bool> {
        self.matrix.get(&date)?.get(&furniture_id).copied()
    }

    /// Furniture free on every checked date
    pub fn free_furniture(&self) -> BTreeSet<FurnitureId> {
        let mut days = self.matrix.values();
        let Some(first) = days.next() else {
            return BTreeSet::new();
        };
        let mut free: BTreeSet<FurnitureId> = first
            .iter()
            .filter(|(_, available)| **available)
            .map(|(id, _)| *id)
            .collect();
        for day in days {
            free.retain(|id| day.get(id).copied().unwrap_or(false));
        }
        free
    }
}

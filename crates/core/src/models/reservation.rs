//! Reservation models

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FurnitureId, ReservationState};

/// A reservation for one date. Multi-day stays are several of these (legs)
/// linked through `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    /// Human-readable, unique; shown in conflict messages
    pub ticket_number: String,
    pub customer_id: Uuid,
    /// Date this reservation (or leg) occupies its furniture
    pub reservation_date: NaiveDate,
    /// First day of the stay this reservation belongs to
    pub start_date: NaiveDate,
    /// Last day of the stay (inclusive)
    pub end_date: NaiveDate,
    pub party_size: u32,
    pub state: ReservationState,
    /// First leg of the stay, for every leg but the first
    pub parent_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Furniture assigned on `reservation_date`
    pub furniture_ids: Vec<FurnitureId>,
}

impl Reservation {
    /// Identity shared by every leg of a stay
    pub fn group_id(&self) -> Uuid {
        self.parent_id.unwrap_or(self.id)
    }

    pub fn is_leg(&self) -> bool {
        self.parent_id.is_some() || self.start_date != self.end_date
    }
}

/// Request for a single-day reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReservation {
    pub customer_id: Uuid,
    pub date: NaiveDate,
    pub party_size: u32,
    pub furniture_ids: Vec<FurnitureId>,
    #[serde(default)]
    pub state: ReservationState,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewReservation {
    pub fn new(
        customer_id: Uuid,
        date: NaiveDate,
        party_size: u32,
        furniture_ids: Vec<FurnitureId>,
    ) -> Self {
        Self {
            customer_id,
            date,
            party_size,
            furniture_ids,
            state: ReservationState::default(),
            notes: None,
        }
    }

    pub fn with_state(mut self, state: ReservationState) -> Self {
        self.state = state;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Which furniture each day of a stay should get
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FurnitureSelection {
    /// Same furniture every day
    Uniform(Vec<FurnitureId>),
    /// Explicit furniture per date; must cover exactly the requested dates
    PerDate(BTreeMap<NaiveDate, Vec<FurnitureId>>),
}

impl FurnitureSelection {
    /// Furniture for one date, if the selection has any
    pub fn for_date(&self, date: NaiveDate) -> Option<&[FurnitureId]> {
        match self {
            FurnitureSelection::Uniform(ids) => Some(ids.as_slice()),
            FurnitureSelection::PerDate(map) => map.get(&date).map(Vec::as_slice),
        }
    }
}

/// Request for a linked multi-day stay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMultiDayReservation {
    pub customer_id: Uuid,
    /// Dates in the order legs are created
    pub dates: Vec<NaiveDate>,
    pub party_size: u32,
    pub furniture: FurnitureSelection,
    #[serde(default)]
    pub state: ReservationState,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewMultiDayReservation {
    pub fn new(
        customer_id: Uuid,
        dates: Vec<NaiveDate>,
        party_size: u32,
        furniture: FurnitureSelection,
    ) -> Self {
        Self {
            customer_id,
            dates,
            party_size,
            furniture,
            state: ReservationState::default(),
            notes: None,
        }
    }

    pub fn with_state(mut self, state: ReservationState) -> Self {
        self.state = state;
        self
    }
}

/// One row of a reservation's state history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub reservation_id: Uuid,
    /// None for the initial state at creation
    pub from_state: Option<ReservationState>,
    pub to_state: ReservationState,
    pub changed_at: DateTime<Utc>,
}

//! Single-day booking transactor
//!
//! Insert the reservation, check availability on the same handle, then
//! write the assignments. A conflict rolls back the whole handle (or, for
//! the `_in` step, its savepoint), so the reservation row inserted first
//! never survives without its furniture.

use std::collections::BTreeSet;

use chrono::{NaiveDate, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::availability::check_with_catalog;
use super::states::StateCatalog;
use crate::error::{Error, Result};
use crate::invariants::assert_reservation_invariants;
use crate::models::{AvailabilityQuery, FurnitureId, NewReservation, Reservation, ReservationState};
use crate::storage::{Database, WriteTxn};

/// One reservation row to book on an open handle
pub(crate) struct LegSpec<'a> {
    pub customer_id: Uuid,
    pub date: NaiveDate,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub party_size: u32,
    pub state: ReservationState,
    pub parent_id: Option<Uuid>,
    pub notes: Option<&'a str>,
    pub furniture_ids: &'a [FurnitureId],
}

/// Reject empty or repeated furniture lists
pub(crate) fn validate_furniture_list(ids: &[FurnitureId], context: &str) -> Result<()> {
    if ids.is_empty() {
        return Err(Error::Validation(format!("{}: no furniture selected", context)));
    }
    let mut seen = BTreeSet::new();
    if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
        return Err(Error::Validation(format!(
            "{}: {} selected twice",
            context, dup
        )));
    }
    Ok(())
}

pub(crate) fn validate_party_size(party_size: u32) -> Result<()> {
    if party_size == 0 {
        return Err(Error::Validation("party size must be at least 1".to_string()));
    }
    Ok(())
}

/// All furniture must exist and be active
pub(crate) fn ensure_bookable(txn: &WriteTxn<'_>, ids: &[FurnitureId]) -> Result<()> {
    let wanted: BTreeSet<FurnitureId> = ids.iter().copied().collect();
    let wanted: Vec<FurnitureId> = wanted.into_iter().collect();
    let found = txn.furniture().find_many(&wanted)?;

    if let Some(missing) = wanted.iter().find(|id| !found.iter().any(|f| f.id == **id)) {
        return Err(Error::Validation(format!("unknown {}", missing)));
    }
    if let Some(inactive) = found.iter().find(|f| !f.active) {
        return Err(Error::Validation(format!(
            "furniture {} is out of service",
            inactive.number
        )));
    }
    Ok(())
}

/// New reservations must start in a state that holds their furniture
pub(crate) fn ensure_occupying(catalog: &StateCatalog, state: ReservationState) -> Result<()> {
    if catalog.is_releasing(state) {
        return Err(Error::Validation(format!(
            "cannot create a reservation in releasing state '{}'",
            state.as_str()
        )));
    }
    Ok(())
}

/// Insert one reservation and its assignments on `txn`.
///
/// On conflict returns `FurnitureUnavailable` and leaves the inserted row in
/// the transaction; callers run this inside a savepoint or roll back.
#[instrument(skip(txn, catalog, leg), fields(date = %leg.date, furniture = leg.furniture_ids.len()))]
pub(crate) fn book_leg(
    txn: &mut WriteTxn<'_>,
    catalog: &StateCatalog,
    leg: &LegSpec<'_>,
) -> Result<Reservation> {
    let (ticket_seq, ticket_number) = txn.reservations().next_ticket(leg.date)?;
    let mut reservation = Reservation {
        id: Uuid::new_v4(),
        ticket_number,
        customer_id: leg.customer_id,
        reservation_date: leg.date,
        start_date: leg.start_date,
        end_date: leg.end_date,
        party_size: leg.party_size,
        state: leg.state,
        parent_id: leg.parent_id,
        notes: leg.notes.map(str::to_string),
        created_at: Utc::now(),
        furniture_ids: Vec::new(),
    };
    txn.reservations().insert(&reservation, ticket_seq)?;

    let query = AvailabilityQuery::new(leg.furniture_ids.iter().copied(), [leg.date]);
    let availability = check_with_catalog(txn, catalog, &query)?;
    if !availability.all_available {
        warn!(
            ticket = %reservation.ticket_number,
            conflicts = availability.conflicts.len(),
            blocked = availability.blocked.len(),
            "Furniture unavailable"
        );
        return Err(Error::FurnitureUnavailable {
            conflicts: availability.conflicts,
            blocked: availability.blocked,
        });
    }

    txn.reservations()
        .insert_assignments(reservation.id, leg.date, leg.furniture_ids)?;
    txn.reservations()
        .record_state_change(reservation.id, None, reservation.state)?;

    let mut furniture_ids = leg.furniture_ids.to_vec();
    furniture_ids.sort();
    reservation.furniture_ids = furniture_ids;
    assert_reservation_invariants(&reservation);
    Ok(reservation)
}

fn validate(request: &NewReservation) -> Result<()> {
    validate_party_size(request.party_size)?;
    validate_furniture_list(&request.furniture_ids, "reservation")
}

fn book(txn: &mut WriteTxn<'_>, request: &NewReservation) -> Result<Reservation> {
    let catalog = StateCatalog::load(txn.conn())?;
    ensure_occupying(&catalog, request.state)?;
    ensure_bookable(txn, &request.furniture_ids)?;
    book_leg(
        txn,
        &catalog,
        &LegSpec {
            customer_id: request.customer_id,
            date: request.date,
            start_date: request.date,
            end_date: request.date,
            party_size: request.party_size,
            state: request.state,
            parent_id: None,
            notes: request.notes.as_deref(),
            furniture_ids: &request.furniture_ids,
        },
    )
}

/// Book a single-day reservation as one step of a larger operation.
///
/// Does not commit. On error the step's own writes are undone and `txn`
/// stays usable, so the caller may retry with other furniture or roll back.
pub fn create_reservation_in(
    txn: &mut WriteTxn<'_>,
    request: &NewReservation,
) -> Result<Reservation> {
    validate(request)?;
    txn.savepoint("reservation_step", |txn| book(txn, request))
}

/// Roll back after a failed step, keeping the step's error
pub(crate) fn abort<T>(txn: WriteTxn<'_>, err: Error) -> Result<T> {
    if let Err(rollback_err) = txn.rollback() {
        warn!(error = %rollback_err, "Rollback failed; connection drop will discard the transaction");
    }
    Err(err)
}

impl Database {
    /// Book furniture for one date under a fresh write lock
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, date = %request.date))]
    pub fn create_reservation(&mut self, request: &NewReservation) -> Result<Reservation> {
        validate(request)?;

        let mut txn = self.begin_write()?;
        match book(&mut txn, request) {
            Ok(reservation) => {
                txn.commit()?;
                info!(
                    reservation_id = %reservation.id,
                    ticket = %reservation.ticket_number,
                    "Reservation created"
                );
                Ok(reservation)
            }
            Err(e) => abort(txn, e),
        }
    }
}

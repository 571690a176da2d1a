//! Reservation lifecycle
//!
//! State changes and furniture swaps re-run the availability check whenever
//! the reservation will hold furniture afterwards.

use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::availability::check_with_catalog;
use super::single::{abort, ensure_bookable, validate_furniture_list};
use super::states::StateCatalog;
use crate::error::{Error, Result};
use crate::invariants::assert_reservation_invariants;
use crate::models::{
    AvailabilityQuery, Furniture, FurnitureId, NewFurniture, Reservation, ReservationState,
    StateChange,
};
use crate::storage::{Database, WriteTxn};

fn load(txn: &WriteTxn<'_>, id: Uuid) -> Result<Reservation> {
    txn.reservations()
        .find_by_id(id)?
        .ok_or_else(|| Error::NotFound(format!("reservation {}", id)))
}

/// Fail with `FurnitureUnavailable` if anyone else holds `furniture_ids`
/// on the reservation's date
fn ensure_free_for(
    txn: &mut WriteTxn<'_>,
    catalog: &StateCatalog,
    reservation: &Reservation,
    furniture_ids: &[FurnitureId],
) -> Result<()> {
    let query = AvailabilityQuery::new(
        furniture_ids.iter().copied(),
        [reservation.reservation_date],
    )
    .excluding(reservation.id);
    let availability = check_with_catalog(txn, catalog, &query)?;
    if availability.all_available {
        return Ok(());
    }
    warn!(
        ticket = %reservation.ticket_number,
        conflicts = availability.conflicts.len(),
        "Furniture taken in the meantime"
    );
    Err(Error::FurnitureUnavailable {
        conflicts: availability.conflicts,
        blocked: availability.blocked,
    })
}

fn apply_state(
    txn: &mut WriteTxn<'_>,
    id: Uuid,
    state: ReservationState,
) -> Result<Reservation> {
    let mut reservation = load(txn, id)?;
    if reservation.state == state {
        return Ok(reservation);
    }

    let catalog = StateCatalog::load(txn.conn())?;
    if catalog.is_releasing(reservation.state) && catalog.occupies(state) {
        let furniture_ids = reservation.furniture_ids.clone();
        ensure_free_for(txn, &catalog, &reservation, &furniture_ids)?;
    }

    txn.reservations().set_state(id, state)?;
    txn.reservations()
        .record_state_change(id, Some(reservation.state), state)?;
    reservation.state = state;
    Ok(reservation)
}

fn apply_reassignment(
    txn: &mut WriteTxn<'_>,
    id: Uuid,
    furniture_ids: &[FurnitureId],
) -> Result<Reservation> {
    let mut reservation = load(txn, id)?;
    ensure_bookable(txn, furniture_ids)?;

    let catalog = StateCatalog::load(txn.conn())?;
    if catalog.occupies(reservation.state) {
        ensure_free_for(txn, &catalog, &reservation, furniture_ids)?;
    }

    txn.reservations().delete_assignments(id)?;
    txn.reservations()
        .insert_assignments(id, reservation.reservation_date, furniture_ids)?;

    let mut sorted = furniture_ids.to_vec();
    sorted.sort();
    reservation.furniture_ids = sorted;
    assert_reservation_invariants(&reservation);
    Ok(reservation)
}

impl Database {
    /// Move a reservation to another state. Leaving a releasing state for an
    /// occupying one fails if its furniture was rebooked meanwhile.
    #[instrument(skip(self))]
    pub fn change_state(&mut self, reservation_id: Uuid, state: ReservationState) -> Result<Reservation> {
        let mut txn = self.begin_write()?;
        match apply_state(&mut txn, reservation_id, state) {
            Ok(reservation) => {
                txn.commit()?;
                info!(ticket = %reservation.ticket_number, "Reservation state changed");
                Ok(reservation)
            }
            Err(e) => abort(txn, e),
        }
    }

    /// Replace the furniture assigned to one reservation
    #[instrument(skip(self, furniture_ids), fields(furniture = furniture_ids.len()))]
    pub fn reassign_furniture(
        &mut self,
        reservation_id: Uuid,
        furniture_ids: &[FurnitureId],
    ) -> Result<Reservation> {
        validate_furniture_list(furniture_ids, "reassignment")?;

        let mut txn = self.begin_write()?;
        match apply_reassignment(&mut txn, reservation_id, furniture_ids) {
            Ok(reservation) => {
                txn.commit()?;
                info!(ticket = %reservation.ticket_number, "Furniture reassigned");
                Ok(reservation)
            }
            Err(e) => abort(txn, e),
        }
    }

    /// Delete a reservation. Deleting the first leg of a stay deletes the
    /// whole stay.
    #[instrument(skip(self))]
    pub fn delete_reservation(&mut self, reservation_id: Uuid) -> Result<()> {
        let txn = self.begin_write()?;
        if txn.reservations().delete(reservation_id)? == 0 {
            return abort(txn, Error::NotFound(format!("reservation {}", reservation_id)));
        }
        txn.commit()?;
        info!(%reservation_id, "Reservation deleted");
        Ok(())
    }

    pub fn find_reservation(&self, reservation_id: Uuid) -> Result<Option<Reservation>> {
        self.reservations().find_by_id(reservation_id)
    }

    pub fn find_reservation_by_ticket(&self, ticket_number: &str) -> Result<Option<Reservation>> {
        self.reservations().find_by_ticket(ticket_number)
    }

    pub fn list_reservations_for_customer(&self, customer_id: Uuid) -> Result<Vec<Reservation>> {
        self.reservations().list_for_customer(customer_id)
    }

    /// Every leg of a stay, by date
    pub fn list_stay(&self, group_id: Uuid) -> Result<Vec<Reservation>> {
        self.reservations().list_stay(group_id)
    }

    pub fn count_reservations_for_customer(&self, customer_id: Uuid) -> Result<u64> {
        self.reservations().count_for_customer(customer_id)
    }

    pub fn state_history(&self, reservation_id: Uuid) -> Result<Vec<StateChange>> {
        self.reservations().state_history(reservation_id)
    }

    pub fn create_furniture(&mut self, furniture: &NewFurniture) -> Result<Furniture> {
        let txn = self.begin_write()?;
        let created = txn.furniture().create(furniture)?;
        txn.commit()?;
        info!(number = %created.number, id = %created.id, "Furniture created");
        Ok(created)
    }

    pub fn find_furniture(&self, id: FurnitureId) -> Result<Option<Furniture>> {
        self.furniture().find_by_id(id)
    }

    pub fn list_furniture(&self, active_only: bool) -> Result<Vec<Furniture>> {
        self.furniture().list(active_only)
    }

    /// Take furniture out of service or back in. Existing reservations keep
    /// their assignments; new bookings are refused while inactive.
    #[instrument(skip(self))]
    pub fn set_furniture_active(&mut self, id: FurnitureId, active: bool) -> Result<()> {
        let txn = self.begin_write()?;
        if txn.furniture().find_by_id(id)?.is_none() {
            return abort(txn, Error::NotFound(id.to_string()));
        }
        txn.furniture().set_active(id, active)?;
        txn.commit()
    }
}

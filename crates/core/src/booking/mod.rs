//! Booking engine
//!
//! Every public operation on [`Database`] acquires its own write lock. The
//! `*_in` functions run on a caller's [`crate::storage::WriteTxn`] instead,
//! so several steps can share one lock and commit together.

mod availability;
mod blocks;
mod lifecycle;
mod multiday;
mod single;
mod states;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AvailabilityQuery, AvailabilityResult, FurnitureBlock, FurnitureId, NewFurnitureBlock,
    NewMultiDayReservation, NewReservation, Reservation, ReservationState,
};
use crate::storage::{BookingEngine, Database};

pub use availability::check_availability_in;
pub use blocks::create_furniture_block_in;
pub use multiday::create_multiday_reservation_in;
pub use single::create_reservation_in;
pub use states::{releasing_states, StateCatalog};

impl BookingEngine for Database {
    fn check_availability(&mut self, query: &AvailabilityQuery) -> Result<AvailabilityResult> {
        Database::check_availability(self, query)
    }

    fn create_reservation(&mut self, request: &NewReservation) -> Result<Reservation> {
        Database::create_reservation(self, request)
    }

    fn create_multiday_reservation(
        &mut self,
        request: &NewMultiDayReservation,
    ) -> Result<Vec<Reservation>> {
        Database::create_multiday_reservation(self, request)
    }

    fn create_furniture_block(&mut self, request: &NewFurnitureBlock) -> Result<FurnitureBlock> {
        Database::create_furniture_block(self, request)
    }

    fn change_state(&mut self, reservation_id: Uuid, state: ReservationState) -> Result<Reservation> {
        Database::change_state(self, reservation_id, state)
    }

    fn reassign_furniture(
        &mut self,
        reservation_id: Uuid,
        furniture_ids: &[FurnitureId],
    ) -> Result<Reservation> {
        Database::reassign_furniture(self, reservation_id, furniture_ids)
    }

    fn delete_furniture_block(&mut self, block_id: Uuid) -> Result<()> {
        Database::delete_furniture_block(self, block_id)
    }

    fn list_blocks(
        &self,
        furniture_id: FurnitureId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<FurnitureBlock>> {
        Database::list_blocks(self, furniture_id, from, to)
    }
}

//! Booking engine interface
//!
//! The operations the outer layers (HTTP handlers, the CLI) call. Each one
//! is a whole logical operation: it acquires its own write lock, runs every
//! check on that one handle, and either commits everything or nothing.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AvailabilityQuery, AvailabilityResult, FurnitureBlock, FurnitureId, NewFurnitureBlock,
    NewMultiDayReservation, NewReservation, Reservation, ReservationState,
};

pub trait BookingEngine {
    /// Availability matrix and conflicts, from a fresh read snapshot
    fn check_availability(&mut self, query: &AvailabilityQuery) -> Result<AvailabilityResult>;

    /// Book furniture for one date
    fn create_reservation(&mut self, request: &NewReservation) -> Result<Reservation>;

    /// Book a linked multi-day stay, all legs or none
    fn create_multiday_reservation(
        &mut self,
        request: &NewMultiDayReservation,
    ) -> Result<Vec<Reservation>>;

    /// Block furniture unless it has active reservations in the range
    fn create_furniture_block(&mut self, request: &NewFurnitureBlock) -> Result<FurnitureBlock>;

    /// Move a reservation to another lifecycle state
    fn change_state(&mut self, reservation_id: Uuid, state: ReservationState) -> Result<Reservation>;

    /// Replace the furniture of a single-day reservation
    fn reassign_furniture(
        &mut self,
        reservation_id: Uuid,
        furniture_ids: &[FurnitureId],
    ) -> Result<Reservation>;

    /// Remove a block
    fn delete_furniture_block(&mut self, block_id: Uuid) -> Result<()>;

    /// Blocks on one item overlapping a range
    fn list_blocks(
        &self,
        furniture_id: FurnitureId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<FurnitureBlock>>;
}

//! Block conflict guard
//!
//! The occupancy check and the block insert share one write handle.

use chrono::{NaiveDate, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::single::abort;
use super::states::StateCatalog;
use crate::error::{Error, Result};
use crate::models::{FurnitureBlock, FurnitureId, NewFurnitureBlock};
use crate::storage::{Database, WriteTxn};

fn validate(request: &NewFurnitureBlock) -> Result<()> {
    if request.start_date > request.end_date {
        return Err(Error::Validation(format!(
            "block starts on {} after it ends on {}",
            request.start_date, request.end_date
        )));
    }
    Ok(())
}

fn guard_and_insert(txn: &mut WriteTxn<'_>, request: &NewFurnitureBlock) -> Result<FurnitureBlock> {
    if txn.furniture().find_by_id(request.furniture_id)?.is_none() {
        return Err(Error::Validation(format!("unknown {}", request.furniture_id)));
    }

    let catalog = StateCatalog::load(txn.conn())?;
    let mut tickets: Vec<String> = txn
        .reservations()
        .occupancy_in_range(request.furniture_id, request.start_date, request.end_date)?
        .into_iter()
        .filter(|row| catalog.occupies(row.state))
        .map(|row| row.ticket_number)
        .collect();
    if !tickets.is_empty() {
        tickets.sort();
        tickets.dedup();
        warn!(furniture_id = %request.furniture_id, tickets = ?tickets, "Block overlaps active reservations");
        return Err(Error::ActiveReservationConflict { tickets });
    }

    let block = FurnitureBlock {
        id: Uuid::new_v4(),
        furniture_id: request.furniture_id,
        start_date: request.start_date,
        end_date: request.end_date,
        block_type: request.block_type,
        reason: request.reason.clone(),
        created_by: request.created_by.clone(),
        created_at: Utc::now(),
    };
    txn.blocks().insert(&block)?;
    Ok(block)
}

/// Create a block as one step of a larger operation. Does not commit.
/// A refused block leaves `txn` as it was.
pub fn create_furniture_block_in(
    txn: &mut WriteTxn<'_>,
    request: &NewFurnitureBlock,
) -> Result<FurnitureBlock> {
    validate(request)?;
    txn.savepoint("block_step", |txn| guard_and_insert(txn, request))
}

impl Database {
    /// Block furniture over an inclusive range unless an occupying
    /// reservation holds it on any day of the range
    #[instrument(skip(self, request), fields(furniture_id = %request.furniture_id, start = %request.start_date, end = %request.end_date))]
    pub fn create_furniture_block(&mut self, request: &NewFurnitureBlock) -> Result<FurnitureBlock> {
        validate(request)?;

        let mut txn = self.begin_write()?;
        match guard_and_insert(&mut txn, request) {
            Ok(block) => {
                txn.commit()?;
                info!(block_id = %block.id, block_type = %block.block_type, "Furniture blocked");
                Ok(block)
            }
            Err(e) => abort(txn, e),
        }
    }

    /// Lift a block
    #[instrument(skip(self))]
    pub fn delete_furniture_block(&mut self, block_id: Uuid) -> Result<()> {
        let txn = self.begin_write()?;
        if txn.blocks().delete(block_id)? == 0 {
            return abort(txn, Error::NotFound(format!("block {}", block_id)));
        }
        txn.commit()?;
        info!(%block_id, "Furniture block removed");
        Ok(())
    }

    /// Blocks on one item overlapping an inclusive range
    pub fn list_blocks(
        &self,
        furniture_id: FurnitureId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<FurnitureBlock>> {
        self.blocks().list_for_furniture(furniture_id, from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::test_support::*;
    use crate::models::{BlockType, FurnitureSelection, NewMultiDayReservation, NewReservation, ReservationState};

    #[test]
    fn test_block_rejected_then_accepted_after_cancel() {
        let mut db = Database::open_in_memory().unwrap();
        let f1 = furniture(&mut db, "A-01");
        let r1 = db
            .create_reservation(&NewReservation::new(customer(), day(10), 2, vec![f1]))
            .unwrap();

        let request = NewFurnitureBlock::new(f1, day(8), day(12), BlockType::Maintenance)
            .with_reason("broken umbrella")
            .with_created_by("lifeguard");
        let err = db.create_furniture_block(&request).unwrap_err();
        match &err {
            Error::ActiveReservationConflict { tickets } => {
                assert_eq!(tickets, &vec![r1.ticket_number.clone()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains(&r1.ticket_number));
        assert!(err.is_recoverable());
        assert_eq!(count_rows(&db, "furniture_blocks"), 0);

        db.change_state(r1.id, ReservationState::Cancelled).unwrap();
        let block = db.create_furniture_block(&request).unwrap();
        assert_eq!(block.reason.as_deref(), Some("broken umbrella"));
        assert_eq!(block.created_by.as_deref(), Some("lifeguard"));
        assert_eq!(count_rows(&db, "furniture_blocks"), 1);

        let stored = db.blocks().find_by_id(block.id).unwrap().unwrap();
        assert_eq!(stored, block);
        assert!(stored.covers(day(10)));
        assert!(!stored.covers(day(13)));
    }

    #[test]
    fn test_block_outside_reserved_days_succeeds() {
        let mut db = Database::open_in_memory().unwrap();
        let f1 = furniture(&mut db, "A-01");
        let f2 = furniture(&mut db, "A-02");
        db.create_reservation(&NewReservation::new(customer(), day(10), 2, vec![f1]))
            .unwrap();

        assert!(db
            .create_furniture_block(&NewFurnitureBlock::new(f1, day(11), day(14), BlockType::Event))
            .is_ok());
        assert!(db
            .create_furniture_block(&NewFurnitureBlock::new(f2, day(10), day(10), BlockType::Event))
            .is_ok());
    }

    #[test]
    fn test_block_lists_every_active_leg() {
        let mut db = Database::open_in_memory().unwrap();
        let f1 = furniture(&mut db, "A-01");
        let legs = db
            .create_multiday_reservation(&NewMultiDayReservation::new(
                customer(),
                vec![day(10), day(11), day(12)],
                2,
                FurnitureSelection::Uniform(vec![f1]),
            ))
            .unwrap();
        db.change_state(legs[1].id, ReservationState::NoShow).unwrap();

        let err = db
            .create_furniture_block(&NewFurnitureBlock::new(f1, day(1), day(31), BlockType::VipHold))
            .unwrap_err();
        let mut expected = vec![legs[0].ticket_number.clone(), legs[2].ticket_number.clone()];
        expected.sort();
        assert_eq!(err.conflicting_tickets(), expected);
    }

    #[test]
    fn test_block_validation() {
        let mut db = Database::open_in_memory().unwrap();
        let f1 = furniture(&mut db, "A-01");

        let reversed = NewFurnitureBlock::new(f1, day(12), day(10), BlockType::Other);
        assert!(matches!(
            db.create_furniture_block(&reversed).unwrap_err(),
            Error::Validation(_)
        ));

        let unknown = NewFurnitureBlock::new(FurnitureId(77), day(10), day(12), BlockType::Other);
        assert!(matches!(
            db.create_furniture_block(&unknown).unwrap_err(),
            Error::Validation(_)
        ));
    }

    #[test]
    fn test_delete_and_list_blocks() {
        let mut db = Database::open_in_memory().unwrap();
        let f1 = furniture(&mut db, "A-01");
        let early = db
            .create_furniture_block(&NewFurnitureBlock::new(f1, day(1), day(3), BlockType::Maintenance))
            .unwrap();
        let late = db
            .create_furniture_block(&NewFurnitureBlock::new(f1, day(20), day(25), BlockType::Event))
            .unwrap();

        let listed = db.list_blocks(f1, day(2), day(21)).unwrap();
        assert_eq!(listed.iter().map(|b| b.id).collect::<Vec<_>>(), vec![early.id, late.id]);
        assert_eq!(db.list_blocks(f1, day(5), day(10)).unwrap().len(), 0);

        db.delete_furniture_block(early.id).unwrap();
        assert_eq!(db.list_blocks(f1, day(1), day(31)).unwrap().len(), 1);
        assert!(matches!(
            db.delete_furniture_block(early.id).unwrap_err(),
            Error::NotFound(_)
        ));
    }
}

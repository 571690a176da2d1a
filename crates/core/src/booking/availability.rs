//! Availability checker
//!
//! Recomputes occupancy from the assignment rows on every call; nothing is
//! cached. Two entry points:
//!
//! - [`check_availability_in`] runs on the caller's open handle (write or
//!   read) and never begins, commits or rolls back anything.
//! - `Database::check_availability` opens its own read snapshot.

use std::collections::BTreeMap;

use rusqlite::Connection;
use tracing::{debug, instrument};

use super::states::StateCatalog;
use crate::error::Result;
use crate::invariants::assert_availability_invariants;
use crate::models::{AvailabilityQuery, AvailabilityResult, BlockedSlot, Conflict, FurnitureId};
use crate::storage::{BlockStore, Database, ReservationStore, TxnHandle};

/// Check availability on an open transaction
pub fn check_availability_in<H: TxnHandle>(
    txn: &mut H,
    query: &AvailabilityQuery,
) -> Result<AvailabilityResult> {
    let conn = txn.conn();
    compute(conn, &StateCatalog::load(conn)?, query)
}

/// Check with a catalog the caller already loaded for this operation
pub(crate) fn check_with_catalog<H: TxnHandle>(
    txn: &mut H,
    catalog: &StateCatalog,
    query: &AvailabilityQuery,
) -> Result<AvailabilityResult> {
    compute(txn.conn(), catalog, query)
}

#[instrument(skip(conn, catalog, query), fields(furniture = query.furniture_ids.len(), dates = query.dates.len(), exclude = ?query.exclude_reservation))]
fn compute(
    conn: &Connection,
    catalog: &StateCatalog,
    query: &AvailabilityQuery,
) -> Result<AvailabilityResult> {
    if query.is_empty() {
        return Ok(AvailabilityResult {
            all_available: true,
            ..AvailabilityResult::default()
        });
    }

    let furniture: Vec<FurnitureId> = query.furniture_ids.iter().copied().collect();
    let dates: Vec<_> = query.dates.iter().copied().collect();

    let mut conflicts: Vec<Conflict> = ReservationStore::new(conn)
        .occupancy(&furniture, &dates)?
        .into_iter()
        .filter(|row| Some(row.reservation_id) != query.exclude_reservation)
        .filter(|row| catalog.occupies(row.state))
        .map(|row| Conflict {
            date: row.date,
            furniture_id: row.furniture_id,
            ticket_number: row.ticket_number,
            reservation_id: row.reservation_id,
        })
        .collect();
    conflicts.sort();

    // dates is non-empty and sorted (BTreeSet)
    let (first, last) = (dates[0], dates[dates.len() - 1]);
    let mut blocked = Vec::new();
    for block in BlockStore::new(conn).overlapping(&furniture, first, last)? {
        for date in query.dates.range(block.start_date..=block.end_date) {
            blocked.push(BlockedSlot {
                date: *date,
                furniture_id: block.furniture_id,
                block_id: block.id,
                block_type: block.block_type,
            });
        }
    }
    blocked.sort_by(|a, b| (a.date, a.furniture_id).cmp(&(b.date, b.furniture_id)));

    let mut matrix: BTreeMap<_, BTreeMap<FurnitureId, bool>> = query
        .dates
        .iter()
        .map(|date| (*date, furniture.iter().map(|id| (*id, true)).collect()))
        .collect();
    let taken = conflicts
        .iter()
        .map(|c| (c.date, c.furniture_id))
        .chain(blocked.iter().map(|b| (b.date, b.furniture_id)));
    for (date, furniture_id) in taken {
        if let Some(slot) = matrix.get_mut(&date).and_then(|day| day.get_mut(&furniture_id)) {
            *slot = false;
        }
    }

    let result = AvailabilityResult {
        all_available: conflicts.is_empty() && blocked.is_empty(),
        conflicts,
        blocked,
        matrix,
    };
    assert_availability_invariants(&result);
    debug!(
        all_available = result.all_available,
        conflicts = result.conflicts.len(),
        blocked = result.blocked.len(),
        "Availability computed"
    );
    Ok(result)
}

impl Database {
    /// Standalone availability check on a short-lived read snapshot
    pub fn check_availability(&mut self, query: &AvailabilityQuery) -> Result<AvailabilityResult> {
        let mut txn = self.begin_read()?;
        let result = check_availability_in(&mut txn, query)?;
        txn.finish()?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::test_support::*;
    use crate::models::{BlockType, NewFurnitureBlock, NewReservation, ReservationState};

    #[test]
    fn test_empty_database_is_available() {
        let mut db = Database::open_in_memory().unwrap();
        let f1 = furniture(&mut db, "A-01");
        let f2 = furniture(&mut db, "A-02");

        let result = db
            .check_availability(&AvailabilityQuery::new([f1, f2], [day(10), day(11)]))
            .unwrap();
        assert!(result.all_available);
        assert!(result.conflicts.is_empty());
        assert_eq!(result.matrix.len(), 2);
        assert_eq!(result.is_available(f1, day(10)), Some(true));
        assert_eq!(result.is_available(f2, day(11)), Some(true));
        assert_eq!(result.free_furniture().len(), 2);
    }

    #[test]
    fn test_empty_query() {
        let mut db = Database::open_in_memory().unwrap();
        let result = db.check_availability(&AvailabilityQuery::default()).unwrap();
        assert!(result.all_available);
        assert!(result.matrix.is_empty());
    }

    #[test]
    fn test_occupied_slot_reports_ticket() {
        let mut db = Database::open_in_memory().unwrap();
        let f1 = furniture(&mut db, "A-01");
        let f2 = furniture(&mut db, "A-02");
        let booked = db
            .create_reservation(&NewReservation::new(customer(), day(10), 2, vec![f1]))
            .unwrap();

        let result = db
            .check_availability(&AvailabilityQuery::new([f1, f2], [day(9), day(10)]))
            .unwrap();
        assert!(!result.all_available);
        assert_eq!(result.conflicts.len(), 1);
        let conflict = &result.conflicts[0];
        assert_eq!(conflict.furniture_id, f1);
        assert_eq!(conflict.date, day(10));
        assert_eq!(conflict.reservation_id, booked.id);
        assert_eq!(conflict.ticket_number, booked.ticket_number);

        assert_eq!(result.is_available(f1, day(10)), Some(false));
        assert_eq!(result.is_available(f1, day(9)), Some(true));
        assert_eq!(result.is_available(f2, day(10)), Some(true));
        assert_eq!(result.free_furniture().into_iter().collect::<Vec<_>>(), vec![f2]);
    }

    #[test]
    fn test_releasing_state_is_available() {
        let mut db = Database::open_in_memory().unwrap();
        let f1 = furniture(&mut db, "A-01");
        let booked = db
            .create_reservation(&NewReservation::new(customer(), day(10), 2, vec![f1]))
            .unwrap();
        db.change_state(booked.id, ReservationState::NoShow).unwrap();

        let result = db
            .check_availability(&AvailabilityQuery::new([f1], [day(10)]))
            .unwrap();
        assert!(result.all_available);
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn test_excluded_reservation_is_ignored() {
        let mut db = Database::open_in_memory().unwrap();
        let f1 = furniture(&mut db, "A-01");
        let booked = db
            .create_reservation(&NewReservation::new(customer(), day(10), 2, vec![f1]))
            .unwrap();

        let query = AvailabilityQuery::new([f1], [day(10)]).excluding(booked.id);
        let result = db.check_availability(&query).unwrap();
        assert!(result.all_available);
    }

    #[test]
    fn test_block_marks_slots_unavailable() {
        let mut db = Database::open_in_memory().unwrap();
        let f1 = furniture(&mut db, "A-01");
        let block = db
            .create_furniture_block(&NewFurnitureBlock::new(f1, day(11), day(12), BlockType::Maintenance))
            .unwrap();

        let result = db
            .check_availability(&AvailabilityQuery::new([f1], [day(10), day(12), day(14)]))
            .unwrap();
        assert!(!result.all_available);
        assert!(result.conflicts.is_empty());
        assert_eq!(result.blocked.len(), 1);
        assert_eq!(result.blocked[0].date, day(12));
        assert_eq!(result.blocked[0].block_id, block.id);
        assert_eq!(result.is_available(f1, day(10)), Some(true));
        assert_eq!(result.is_available(f1, day(12)), Some(false));
        assert_eq!(result.is_available(f1, day(14)), Some(true));
    }

    #[test]
    fn test_repeated_check_is_identical() {
        let mut db = Database::open_in_memory().unwrap();
        let f1 = furniture(&mut db, "A-01");
        let f2 = furniture(&mut db, "A-02");
        db.create_reservation(&NewReservation::new(customer(), day(10), 2, vec![f1]))
            .unwrap();
        db.create_furniture_block(&NewFurnitureBlock::new(f2, day(11), day(11), BlockType::VipHold))
            .unwrap();

        let query = AvailabilityQuery::new([f1, f2], [day(10), day(11)]);
        let first = db.check_availability(&query).unwrap();
        let second = db.check_availability(&query).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_check_on_read_snapshot() {
        let mut db = Database::open_in_memory().unwrap();
        let f1 = furniture(&mut db, "A-01");
        let booked = db
            .create_reservation(&NewReservation::new(customer(), day(10), 2, vec![f1]))
            .unwrap();

        let mut snapshot = db.begin_read().unwrap();
        let query = AvailabilityQuery::new([f1], [day(10), day(11)]);
        let first = check_availability_in(&mut snapshot, &query).unwrap();
        let second = check_availability_in(&mut snapshot, &query).unwrap();
        snapshot.finish().unwrap();

        assert_eq!(first, second);
        assert_eq!(first.conflicts[0].ticket_number, booked.ticket_number);
        assert_eq!(first.is_available(f1, day(11)), Some(true));
    }

    #[test]
    fn test_check_in_write_txn_sees_uncommitted_rows() {
        let mut db = Database::open_in_memory().unwrap();
        let f1 = furniture(&mut db, "A-01");

        let mut txn = db.begin_write().unwrap();
        let pending = crate::booking::create_reservation_in(
            &mut txn,
            &NewReservation::new(customer(), day(10), 2, vec![f1]),
        )
        .unwrap();
        let result =
            check_availability_in(&mut txn, &AvailabilityQuery::new([f1], [day(10)])).unwrap();
        assert_eq!(result.conflicts[0].reservation_id, pending.id);
        txn.rollback().unwrap();

        let after = db
            .check_availability(&AvailabilityQuery::new([f1], [day(10)]))
            .unwrap();
        assert!(after.all_available);
    }

    #[test]
    fn test_loaded_catalog_is_reused_within_operation() {
        let mut db = Database::open_in_memory().unwrap();
        let f1 = furniture(&mut db, "A-01");
        let booked = db
            .create_reservation(&NewReservation::new(customer(), day(10), 2, vec![f1]))
            .unwrap();
        db.change_state(booked.id, ReservationState::NoShow).unwrap();

        let mut txn = db.begin_write().unwrap();
        let catalog = StateCatalog::load(txn.conn()).unwrap();
        txn.states().set_releasing(&[ReservationState::Cancelled]).unwrap();

        let query = AvailabilityQuery::new([f1], [day(10)]);
        let with_loaded = check_with_catalog(&mut txn, &catalog, &query).unwrap();
        let reread = check_availability_in(&mut txn, &query).unwrap();
        txn.rollback().unwrap();

        assert!(with_loaded.all_available);
        assert_eq!(reread.conflicts[0].ticket_number, booked.ticket_number);
    }
}

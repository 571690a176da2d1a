//! Multi-day linked booking orchestrator
//!
//! Every leg of a stay is booked on one write handle. A conflict on any leg
//! rolls back all legs created before it.

use std::collections::BTreeSet;

use tracing::{info, instrument};

use super::single::{
    abort, book_leg, ensure_bookable, ensure_occupying, validate_furniture_list,
    validate_party_size, LegSpec,
};
use super::states::StateCatalog;
use crate::error::{Error, Result};
use crate::invariants::assert_stay_invariants;
use crate::models::{FurnitureSelection, NewMultiDayReservation, Reservation};
use crate::storage::{Database, WriteTxn};

/// Reject malformed requests. Runs before any lock is taken, in this order:
/// dates, party size, furniture selection.
fn validate(request: &NewMultiDayReservation) -> Result<()> {
    if request.dates.is_empty() {
        return Err(Error::Validation("stay has no dates".to_string()));
    }
    let mut seen = BTreeSet::new();
    if let Some(dup) = request.dates.iter().find(|d| !seen.insert(**d)) {
        return Err(Error::Validation(format!("date {} requested twice", dup)));
    }

    validate_party_size(request.party_size)?;

    match &request.furniture {
        FurnitureSelection::Uniform(ids) => validate_furniture_list(ids, "stay")?,
        FurnitureSelection::PerDate(map) => {
            for date in &request.dates {
                let ids = map.get(date).ok_or_else(|| {
                    Error::Validation(format!("no furniture selected for {}", date))
                })?;
                validate_furniture_list(ids, &date.to_string())?;
            }
            if let Some(extra) = map.keys().find(|d| !seen.contains(*d)) {
                return Err(Error::Validation(format!(
                    "furniture selected for {} which is not part of the stay",
                    extra
                )));
            }
        }
    }
    Ok(())
}

fn book(txn: &mut WriteTxn<'_>, request: &NewMultiDayReservation) -> Result<Vec<Reservation>> {
    let catalog = StateCatalog::load(txn.conn())?;
    ensure_occupying(&catalog, request.state)?;

    let all_furniture: Vec<_> = request
        .dates
        .iter()
        .filter_map(|d| request.furniture.for_date(*d))
        .flatten()
        .copied()
        .collect();
    ensure_bookable(txn, &all_furniture)?;

    // validate() guarantees at least one date
    let start_date = request.dates.iter().min().copied().unwrap_or_default();
    let end_date = request.dates.iter().max().copied().unwrap_or_default();

    let mut legs: Vec<Reservation> = Vec::with_capacity(request.dates.len());
    for date in &request.dates {
        let furniture_ids = request.furniture.for_date(*date).ok_or_else(|| {
            Error::Validation(format!("no furniture selected for {}", date))
        })?;
        let leg = book_leg(
            txn,
            &catalog,
            &LegSpec {
                customer_id: request.customer_id,
                date: *date,
                start_date,
                end_date,
                party_size: request.party_size,
                state: request.state,
                parent_id: legs.first().map(|parent| parent.id),
                notes: request.notes.as_deref(),
                furniture_ids,
            },
        )?;
        legs.push(leg);
    }

    assert_stay_invariants(&legs);
    Ok(legs)
}

/// Book a stay as one step of a larger operation. Does not commit.
///
/// A failing leg undoes every leg of this stay; `txn` stays usable.
pub fn create_multiday_reservation_in(
    txn: &mut WriteTxn<'_>,
    request: &NewMultiDayReservation,
) -> Result<Vec<Reservation>> {
    validate(request)?;
    txn.savepoint("stay_step", |txn| book(txn, request))
}

impl Database {
    /// Book a linked multi-day stay under one write lock, all legs or none
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, days = request.dates.len()))]
    pub fn create_multiday_reservation(
        &mut self,
        request: &NewMultiDayReservation,
    ) -> Result<Vec<Reservation>> {
        validate(request)?;

        let mut txn = self.begin_write()?;
        match book(&mut txn, request) {
            Ok(legs) => {
                txn.commit()?;
                info!(
                    group_id = %legs[0].group_id(),
                    legs = legs.len(),
                    "Multi-day reservation created"
                );
                Ok(legs)
            }
            Err(e) => abort(txn, e),
        }
    }
}

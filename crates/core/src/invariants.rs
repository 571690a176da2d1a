//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::models::{AvailabilityResult, Reservation};

/// Validate that a booked reservation is internally consistent
pub fn assert_reservation_invariants(reservation: &Reservation) {
    debug_assert!(
        reservation.customer_id != Uuid::nil(),
        "Reservation {} has nil customer_id",
        reservation.id
    );

    // YYMMDD + 3-digit sequence
    debug_assert!(
        reservation.ticket_number.len() >= 9
            && reservation.ticket_number.chars().all(|c| c.is_ascii_digit()),
        "Reservation {} has malformed ticket {:?}",
        reservation.id,
        reservation.ticket_number
    );

    debug_assert!(
        reservation.start_date <= reservation.reservation_date
            && reservation.reservation_date <= reservation.end_date,
        "Reservation {} date {} outside its stay {}..{}",
        reservation.id,
        reservation.reservation_date,
        reservation.start_date,
        reservation.end_date
    );

    debug_assert!(
        reservation.party_size >= 1,
        "Reservation {} has empty party",
        reservation.id
    );

    debug_assert!(
        reservation.parent_id != Some(reservation.id),
        "Reservation {} is its own parent",
        reservation.id
    );

    debug_assert!(
        !reservation.furniture_ids.is_empty()
            && reservation.furniture_ids.windows(2).all(|w| w[0] < w[1]),
        "Reservation {} furniture not a sorted non-empty set: {:?}",
        reservation.id,
        reservation.furniture_ids
    );
}

/// Validate that the legs of one stay point at the same parent
pub fn assert_stay_invariants(legs: &[Reservation]) {
    let Some(first) = legs.first() else {
        debug_assert!(false, "Stay with no legs");
        return;
    };

    debug_assert!(
        first.parent_id.is_none(),
        "First leg {} has parent {:?}",
        first.id,
        first.parent_id
    );

    for leg in &legs[1..] {
        debug_assert!(
            leg.parent_id == Some(first.id),
            "Leg {} points at {:?}, expected {}",
            leg.id,
            leg.parent_id,
            first.id
        );
        debug_assert!(
            leg.start_date == first.start_date && leg.end_date == first.end_date,
            "Leg {} spans {}..{}, first leg spans {}..{}",
            leg.id,
            leg.start_date,
            leg.end_date,
            first.start_date,
            first.end_date
        );
    }

    let dates: BTreeSet<_> = legs.iter().map(|l| l.reservation_date).collect();
    debug_assert!(
        dates.len() == legs.len(),
        "Stay {} books the same date twice",
        first.id
    );
}

/// Validate that the summary flag, the conflict lists and the matrix agree
pub fn assert_availability_invariants(result: &AvailabilityResult) {
    debug_assert!(
        result.all_available == (result.conflicts.is_empty() && result.blocked.is_empty()),
        "all_available = {} with {} conflicts and {} blocked slots",
        result.all_available,
        result.conflicts.len(),
        result.blocked.len()
    );

    let taken: BTreeSet<_> = result
        .conflicts
        .iter()
        .map(|c| (c.date, c.furniture_id))
        .chain(result.blocked.iter().map(|b| (b.date, b.furniture_id)))
        .collect();

    for (date, row) in &result.matrix {
        for (furniture_id, free) in row {
            debug_assert!(
                *free != taken.contains(&(*date, *furniture_id)),
                "Matrix says {} on {} is free = {}, conflicts disagree",
                furniture_id,
                date,
                free
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Conflict, FurnitureId, ReservationState};
    use chrono::{NaiveDate, Utc};
    use std::collections::BTreeMap;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, d).unwrap()
    }

    fn reservation(d: u32) -> Reservation {
        Reservation {
            id: Uuid::new_v4(),
            ticket_number: format!("2607{:02}001", d),
            customer_id: Uuid::new_v4(),
            reservation_date: date(d),
            start_date: date(d),
            end_date: date(d),
            party_size: 2,
            state: ReservationState::Confirmed,
            parent_id: None,
            notes: None,
            created_at: Utc::now(),
            furniture_ids: vec![FurnitureId(1), FurnitureId(2)],
        }
    }

    #[test]
    fn test_valid_reservation() {
        assert_reservation_invariants(&reservation(10));
    }

    #[test]
    #[should_panic(expected = "outside its stay")]
    fn test_date_outside_stay() {
        let mut r = reservation(10);
        r.end_date = date(9);
        r.start_date = date(9);
        assert_reservation_invariants(&r);
    }

    #[test]
    #[should_panic(expected = "sorted non-empty set")]
    fn test_duplicate_furniture() {
        let mut r = reservation(10);
        r.furniture_ids = vec![FurnitureId(1), FurnitureId(1)];
        assert_reservation_invariants(&r);
    }

    /// Linked legs on consecutive days, all spanning the whole stay
    fn stay(days: std::ops::RangeInclusive<u32>) -> Vec<Reservation> {
        let (start, end) = (date(*days.start()), date(*days.end()));
        let mut legs: Vec<Reservation> = Vec::new();
        for d in days {
            let mut leg = reservation(d);
            leg.start_date = start;
            leg.end_date = end;
            leg.parent_id = legs.first().map(|first| first.id);
            legs.push(leg);
        }
        legs
    }

    #[test]
    fn test_valid_stay() {
        assert_stay_invariants(&stay(10..=11));
        assert_stay_invariants(&stay(10..=14));
    }

    #[test]
    #[should_panic(expected = "expected")]
    fn test_stay_with_stray_leg() {
        let mut legs = stay(10..=11);
        legs[1].parent_id = Some(Uuid::new_v4());
        assert_stay_invariants(&legs);
    }

    #[test]
    #[should_panic(expected = "first leg spans")]
    fn test_stay_with_mismatched_span() {
        let first = reservation(10);
        let mut second = reservation(11);
        second.parent_id = Some(first.id);
        assert_stay_invariants(&[first, second]);
    }

    #[test]
    fn test_consistent_availability() {
        let mut matrix = BTreeMap::new();
        matrix.insert(
            date(10),
            BTreeMap::from([(FurnitureId(1), false), (FurnitureId(2), true)]),
        );
        let result = AvailabilityResult {
            all_available: false,
            conflicts: vec![Conflict {
                date: date(10),
                furniture_id: FurnitureId(1),
                ticket_number: "260710001".to_string(),
                reservation_id: Uuid::new_v4(),
            }],
            blocked: Vec::new(),
            matrix,
        };
        assert_availability_invariants(&result);
    }

    #[test]
    #[should_panic(expected = "all_available")]
    fn test_flag_disagrees_with_conflicts() {
        let result = AvailabilityResult {
            all_available: true,
            conflicts: vec![Conflict {
                date: date(10),
                furniture_id: FurnitureId(1),
                ticket_number: "260710001".to_string(),
                reservation_id: Uuid::new_v4(),
            }],
            ..AvailabilityResult::default()
        };
        assert_availability_invariants(&result);
    }
}

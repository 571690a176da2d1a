//! Command execution
//!
//! Each command runs one engine operation and returns its result as JSON.

use beachbook_core::{
    AvailabilityQuery, Database, EngineConfig, Error, FurnitureId, FurnitureSelection,
    NewFurnitureBlock, NewMultiDayReservation, NewReservation,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::cli::Command;

pub type CommandResult = std::result::Result<Value, Box<dyn std::error::Error>>;

/// Resolve furniture numbers (e.g. `A-01`) to ids
fn resolve_furniture(db: &Database, numbers: &[String]) -> beachbook_core::Result<Vec<FurnitureId>> {
    numbers
        .iter()
        .map(|number| {
            db.furniture()
                .find_by_number(number)?
                .map(|f| f.id)
                .ok_or_else(|| Error::NotFound(format!("furniture '{}'", number)))
        })
        .collect()
}

pub fn run(db: &mut Database, config: &EngineConfig, command: Command) -> CommandResult {
    debug!(?command, "Running command");
    match command {
        Command::Init => {
            let furniture = db.seed_furniture(&config.furniture)?;
            info!(count = furniture.len(), "Database initialized");
            Ok(json!({
                "schema_version": db.schema_version()?,
                "furniture": furniture,
            }))
        }

        Command::Availability {
            dates,
            furniture,
            exclude,
        } => {
            let ids = resolve_furniture(db, &furniture)?;
            let mut query = AvailabilityQuery::new(ids, dates);
            if let Some(reservation_id) = exclude {
                query = query.excluding(reservation_id);
            }
            Ok(serde_json::to_value(db.check_availability(&query)?)?)
        }

        Command::Book {
            customer,
            date,
            party,
            furniture,
            notes,
        } => {
            let ids = resolve_furniture(db, &furniture)?;
            let mut request = NewReservation::new(customer, date, party, ids);
            if let Some(notes) = notes {
                request = request.with_notes(notes);
            }
            Ok(serde_json::to_value(db.create_reservation(&request)?)?)
        }

        Command::BookStay {
            customer,
            dates,
            party,
            furniture,
            notes,
        } => {
            let ids = resolve_furniture(db, &furniture)?;
            let mut request = NewMultiDayReservation::new(
                customer,
                dates,
                party,
                FurnitureSelection::Uniform(ids),
            );
            request.notes = notes;
            Ok(serde_json::to_value(db.create_multiday_reservation(&request)?)?)
        }

        Command::Block {
            furniture,
            from,
            to,
            block_type,
            reason,
            created_by,
        } => {
            let id = resolve_furniture(db, std::slice::from_ref(&furniture))?[0];
            let mut request = NewFurnitureBlock::new(id, from, to, block_type);
            request.reason = reason;
            request.created_by = created_by;
            Ok(serde_json::to_value(db.create_furniture_block(&request)?)?)
        }

        Command::SetState { reservation, state } => {
            Ok(serde_json::to_value(db.change_state(reservation, state)?)?)
        }
    }
}

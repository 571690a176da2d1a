//! Command-line arguments

use std::path::PathBuf;

use beachbook_core::{BlockType, ReservationState};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Beachbook: beach furniture reservations over a shared SQLite file.
#[derive(Parser, Debug)]
#[command(
    name = "beachbook",
    version,
    about = "Book beach furniture without double-booking",
    long_about = "Beachbook: availability checks, single and multi-day bookings, \
                  and maintenance blocks for beach furniture.\n\n\
                  Every command prints JSON on stdout. Logs go to stderr."
)]
pub struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "BEACHBOOK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database and seed the furniture listed in the config.
    Init,

    /// Show which furniture is free on which dates.
    Availability {
        #[arg(long = "date", required = true, num_args = 1..)]
        dates: Vec<NaiveDate>,
        /// Furniture numbers, e.g. A-01
        #[arg(long = "furniture", required = true, num_args = 1..)]
        furniture: Vec<String>,
        /// Ignore this reservation's own assignments.
        #[arg(long)]
        exclude: Option<Uuid>,
    },

    /// Book furniture for one date.
    Book {
        #[arg(long)]
        customer: Uuid,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        party: u32,
        #[arg(long = "furniture", required = true, num_args = 1..)]
        furniture: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Book the same furniture for several dates, all or nothing.
    BookStay {
        #[arg(long)]
        customer: Uuid,
        #[arg(long = "date", required = true, num_args = 1..)]
        dates: Vec<NaiveDate>,
        #[arg(long)]
        party: u32,
        #[arg(long = "furniture", required = true, num_args = 1..)]
        furniture: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Take one furniture item out of service for an inclusive date range.
    Block {
        #[arg(long)]
        furniture: String,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long = "type", value_parser = parse_block_type, default_value = "maintenance")]
        block_type: BlockType,
        #[arg(long)]
        reason: Option<String>,
        #[arg(long)]
        created_by: Option<String>,
    },

    /// Move a reservation to another state.
    SetState {
        #[arg(long)]
        reservation: Uuid,
        #[arg(long, value_parser = parse_state)]
        state: ReservationState,
    },
}

fn parse_block_type(s: &str) -> Result<BlockType, String> {
    BlockType::from_str(s).ok_or_else(|| {
        format!("unknown block type '{}' (maintenance, vip_hold, event, other)", s)
    })
}

fn parse_state(s: &str) -> Result<ReservationState, String> {
    ReservationState::from_str(s).ok_or_else(|| {
        let known: Vec<_> = ReservationState::all().iter().map(|st| st.as_str()).collect();
        format!("unknown state '{}' (one of {})", s, known.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_book() {
        let cli = Cli::try_parse_from([
            "beachbook",
            "book",
            "--customer",
            "6f1c2d3e-4b5a-4c6d-8e7f-001122334455",
            "--date",
            "2026-07-10",
            "--party",
            "2",
            "--furniture",
            "A-01",
            "A-02",
        ])
        .unwrap();
        match cli.command {
            Command::Book { date, furniture, .. } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2026, 7, 10).unwrap());
                assert_eq!(furniture, vec!["A-01", "A-02"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_block_and_state() {
        let cli = Cli::try_parse_from([
            "beachbook",
            "--log-level",
            "debug",
            "block",
            "--furniture",
            "A-01",
            "--from",
            "2026-07-08",
            "--to",
            "2026-07-12",
            "--type",
            "vip_hold",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(
            cli.command,
            Command::Block { block_type: BlockType::VipHold, .. }
        ));

        assert!(Cli::try_parse_from([
            "beachbook",
            "set-state",
            "--reservation",
            "6f1c2d3e-4b5a-4c6d-8e7f-001122334455",
            "--state",
            "gone_fishing",
        ])
        .is_err());
    }
}

//! Beachbook - beach furniture reservations
//!
//! ```sh
//! # Create the database and seed furniture from the config
//! beachbook init
//!
//! # Book two sunbeds for one day
//! beachbook book --customer <uuid> --date 2026-07-10 --party 2 --furniture A-01 A-02
//!
//! # Custom config path
//! beachbook --config /etc/beachbook/config.toml availability --date 2026-07-10 --furniture A-01
//! ```

use std::process::ExitCode;

use beachbook_core::{default_config_path, Database, EngineConfig};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod commands;

use cli::Cli;

fn init_tracing(level: Option<&str>) {
    // --log-level wins over RUST_LOG
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> beachbook_core::Result<EngineConfig> {
    match &cli.config {
        Some(path) => EngineConfig::load(path),
        None => {
            let path = default_config_path()?;
            if path.exists() {
                EngineConfig::load(&path)
            } else {
                info!(path = %path.display(), "No config file, using defaults");
                Ok(EngineConfig::default())
            }
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut db = match Database::open_with_config(&config) {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let output = commands::run(&mut db, &config, cli.command)
        .and_then(|value| Ok(serde_json::to_string_pretty(&value)?));
    match output {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

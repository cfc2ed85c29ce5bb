//! Rainfall Status
//!
//! Prints the persisted station readings, with the latest diff and the
//! archived rain days, from whatever backend rainmon.toml points at.
//! Read-only: never fetches and never writes.
//!
//! Usage:
//!   cargo run --bin rain_status
//!   cargo run --bin rain_status -- --config other.toml
//!   cargo run --bin rain_status -- --json
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string (postgres backend)

use rainmon_service::config::{self, DEFAULT_CONFIG_PATH};
use rainmon_service::store::{self, load_state};
use rainmon_service::view::{format_millis, render_text, station_views};
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    let mut as_json = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                config_path = PathBuf::from(&args[i + 1]);
                i += 2;
            }
            "--json" => {
                as_json = true;
                i += 1;
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                eprintln!("Usage: {} [--config PATH] [--json]", args[0]);
                std::process::exit(1);
            }
        }
    }

    let service_config = config::load_config(&config_path)?;
    let mut store = store::open_store(&service_config.storage)?;
    let state = load_state(store.as_mut())?;
    let views = station_views(&state);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    println!("🌧 Rainfall Status");
    println!("==================\n");
    println!(
        "Rain day: {}",
        state.last_rain_day.as_deref().unwrap_or("(none yet)")
    );
    if let Some(ts) = state.last_fetch_timestamp {
        println!("Last fetch: {}", format_millis(ts));
    }
    println!();
    print!("{}", render_text(&views));

    Ok(())
}

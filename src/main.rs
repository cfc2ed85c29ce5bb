//! Rainfall Monitoring Service - Main Daemon
//!
//! A small daemon that continuously:
//! 1. Polls the VRAIN rainfall API for the current station snapshot
//! 2. Reconciles it against persisted state (current, history, changes)
//! 3. Saves the new state in one bulk write
//! 4. Sends a short summary when readings moved
//! 5. Optionally serves a read-only HTTP view of the stored data
//!
//! Usage:
//!   cargo run --release                          # Poll forever with rainmon.toml
//!   cargo run --release -- --config other.toml   # Use another config file
//!   cargo run --release -- --endpoint 8080       # Also serve the view on port 8080
//!   cargo run --release -- --once                # Run a single cycle and exit
//!   cargo run --release -- --once --dry-run      # Single cycle against an in-memory store
//!
//! Environment:
//!   DATABASE_URL          - PostgreSQL connection string (postgres backend)
//!   RAINMON_PUBSUB_TOKEN  - bearer token for the Pub/Sub notifier

use rainmon_service::config::{self, DEFAULT_CONFIG_PATH, StorageBackend};
use rainmon_service::daemon::{Daemon, DaemonConfig};
use rainmon_service::endpoint;
use rainmon_service::ingest::vrain::HttpSource;
use rainmon_service::logging::{self, Component};
use rainmon_service::notify::build_notifier;
use rainmon_service::store::{self, KeyValueStore, MemoryStore};
use std::env;
use std::path::Path;

fn usage(program: &str) -> ! {
    eprintln!(
        "Usage: {} [--config PATH] [--endpoint PORT] [--once] [--dry-run]",
        program
    );
    std::process::exit(1);
}

fn main() {
    println!("🌧 Rainfall Monitoring Service");
    println!("==============================\n");

    // Parse command-line arguments
    let args: Vec<String> = env::args().collect();
    let mut config_path = DEFAULT_CONFIG_PATH.to_string();
    let mut endpoint_port: Option<u16> = None;
    let mut once = false;
    let mut dry_run = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                if i + 1 < args.len() {
                    config_path = args[i + 1].clone();
                    i += 2;
                } else {
                    eprintln!("Error: --config requires a file path");
                    std::process::exit(1);
                }
            }
            "--endpoint" => {
                if i + 1 < args.len() {
                    endpoint_port = args[i + 1].parse().ok();
                    if endpoint_port.is_none() {
                        eprintln!("Error: invalid port '{}'", args[i + 1]);
                        std::process::exit(1);
                    }
                    i += 2;
                } else {
                    eprintln!("Error: --endpoint requires a port number");
                    std::process::exit(1);
                }
            }
            "--once" => {
                once = true;
                i += 1;
            }
            "--dry-run" => {
                dry_run = true;
                i += 1;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                usage(&args[0]);
            }
        }
    }

    let service_config = match config::load_config(Path::new(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    logging::init_logger(
        service_config.logging.min_level(),
        service_config.logging.file.as_deref(),
        service_config.logging.timestamps,
    );

    // Open the state store
    let store: Box<dyn KeyValueStore + Send> = if dry_run {
        println!("🧪 Dry run: state is kept in memory only\n");
        Box::new(MemoryStore::new())
    } else {
        match store::open_store(&service_config.storage) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("\n❌ Failed to open {:?} store: {}\n", service_config.storage.backend, e);
                std::process::exit(1);
            }
        }
    };

    // Start HTTP endpoint if requested (in background thread)
    let endpoint_port = endpoint_port.or(service_config.endpoint.port);
    if let Some(port) = endpoint_port {
        if dry_run || service_config.storage.backend == StorageBackend::Memory {
            eprintln!("⚠️  Endpoint needs a shared backend (file or postgres); not starting it\n");
        } else {
            println!("🚀 Starting HTTP endpoint server...");

            // The endpoint gets its own store handle
            match store::open_store(&service_config.storage) {
                Ok(endpoint_store) => {
                    std::thread::spawn(move || {
                        if let Err(e) = endpoint::start_endpoint_server(port, endpoint_store) {
                            logging::error(Component::Http, None, &format!("❌ Endpoint server error: {}", e));
                        }
                    });
                    println!("   Endpoint running on http://0.0.0.0:{}\n", port);
                }
                Err(e) => {
                    eprintln!("❌ Failed to open store for endpoint: {}", e);
                    eprintln!("   Continuing without HTTP endpoint\n");
                }
            }
        }
    }

    let source = match HttpSource::new(&service_config.api.url, service_config.api.timeout()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let notifier = match build_notifier(&service_config.notify, service_config.api.timeout()) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("❌ Failed to set up notifications: {}", e);
            std::process::exit(1);
        }
    };

    let daemon_config = DaemonConfig {
        poll_interval_minutes: service_config.daemon.poll_interval_minutes,
        summary_limit: service_config.notify.summary_limit,
        notify_enabled: service_config.notify.enabled,
    };
    let mut daemon = Daemon::with_config(daemon_config, Box::new(source), store, notifier);

    if once {
        match daemon.run_cycle() {
            Ok(report) => {
                println!(
                    "✓ {} stations, {} changed, {} skipped",
                    report.stations,
                    report.changed.len(),
                    report.skipped
                );
                if let Some(summary) = report.summary {
                    println!("{}", summary);
                }
            }
            Err(e) => {
                logging::log_cycle_failure(&e);
                std::process::exit(1);
            }
        }
        return;
    }

    // Run the main polling loop
    println!("🔄 Starting continuous polling loop...");
    println!("   Poll interval: {} minutes", daemon.config().poll_interval_minutes);
    println!("   Source: {}", service_config.api.url);
    println!("   Press Ctrl+C to stop\n");

    if let Err(e) = daemon.run() {
        eprintln!("\n❌ Daemon error: {}", e);
        std::process::exit(1);
    }
}

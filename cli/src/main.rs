//! EV Booking: CLI server
//!
//! ```sh
//! # Run with default config (~/.config/ev-booking/config.toml)
//! ev-booking
//!
//! # Custom config path and port
//! ev-booking --config /etc/ev-booking/config.toml --api-port 9090
//!
//! # Throwaway instance without a database
//! ev-booking --in-memory
//!
//! # Write a default config file, or validate one without starting
//! ev-booking --init-config
//! ev-booking --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use ev_booking::config::{AppConfig, CONFIG_ENV};
use ev_booking::server::{init_tracing, ServerHandle, ServerOptions};

/// EV Booking: reservation engine for EV charging stations.
#[derive(Parser, Debug)]
#[command(
    name = "ev-booking",
    version,
    about = "Reservation allocation service for EV charging stations",
    long_about = "REST API server that books charging slots, enforces the booking and \
                  change windows, and keeps slot and reservation records consistent.\n\n\
                  Default config: ~/.config/ev-booking/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Override the REST API listen port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,

    /// Write the default configuration to the config path and exit.
    #[arg(long, conflicts_with = "check")]
    init_config: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,

    /// Use the in-memory store instead of the configured database.
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(ev_booking::default_config_path);

    if cli.init_config {
        AppConfig::default().save(&config_path)?;
        println!("✅ Default configuration written to {}", config_path.display());
        return Ok(());
    }

    // ── Load configuration ─────────────────────────────────────
    let mut config = match AppConfig::load(&config_path) {
        Ok(cfg) => {
            init_tracing(&cfg);
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) if cli.check => {
            eprintln!("❌ Invalid configuration: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            let fallback = AppConfig::default();
            init_tracing(&fallback);
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
            fallback
        }
    };

    // ── Apply CLI overrides ────────────────────────────────────
    if let Some(port) = cli.api_port {
        info!("CLI override: api_port = {}", port);
        config.server.api_port = port;
    }
    if let Some(ref level) = cli.log_level {
        info!("CLI override: log_level = {}", level);
        config.logging.level = level.clone();
    }

    if cli.check {
        println!("✅ Configuration is valid");
        println!("   Config file     : {}", config_path.display());
        println!("   API address     : {}", config.api_address());
        println!("   Database        : {}", config.database.url);
        println!("   Booking window  : {}h", config.booking.admission_window_hours);
        println!("   Change lockout  : {}h", config.booking.lockout_window_hours);
        println!(
            "   Slots           : {:02}:00-{:02}:00 every {} min",
            config.slots.opening_hour, config.slots.closing_hour, config.slots.slot_minutes
        );
        println!("   Log level       : {}", config.logging.level);
        return Ok(());
    }

    // ── Start server ───────────────────────────────────────────
    let handle = ServerHandle::start(ServerOptions {
        config,
        auto_migrate: !cli.no_migrate,
        in_memory: cli.in_memory,
    })
    .await?;

    handle.install_signal_handler();
    info!("🚀 Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    Ok(())
}

//! Customer Login Stats - daily login counters for customer accounts
//!
//! Receives login notifications from the hosting application and keeps:
//! - Total customer logins per day
//! - Unique customers per day (each customer counted once per day)
//! - A rolling 30-day report for administrators

mod cli;
mod clock;
mod config;
mod db;
mod events;
mod stats;
mod web;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Command};
use crate::clock::SystemDayClock;
use crate::stats::LoginStats;

fn init_logging(level: &str) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Use LOG_FORMAT=gcp for structured GCP Cloud Logging
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "gcp" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before any other initialization)
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let config = config::Config::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;
    init_logging(&config.logging.level.to_lowercase());
    info!("Configuration loaded from {}", args.config);

    let db = db::Database::new(&config.database).await?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Install => {
            db.install().await?;
            info!("Schema installed");
        }
        Command::Uninstall => {
            db.uninstall().await?;
            info!("Login stats removed");
        }
        Command::Serve => {
            db.install().await?;
            info!("Database initialized");

            let clock = SystemDayClock::from_offset_minutes(config.stats.utc_offset_minutes)
                .context("UTC offset out of range")?;
            let event_bus = events::EventBus::with_capacity(1000);
            let db = Arc::new(db);
            let stats = LoginStats::new(
                db.clone(),
                db.clone(),
                db,
                Arc::new(clock),
                &config.stats.customer_role,
            )
            .with_event_bus(event_bus.clone());
            info!(
                "Counting logins for role '{}', today is {}",
                config.stats.customer_role,
                stats.today()
            );

            let state = Arc::new(web::AppState::new(
                stats,
                event_bus,
                config.stats.report_capabilities.clone(),
            ));
            web::start_server(&config, state).await?;
        }
    }

    Ok(())
}

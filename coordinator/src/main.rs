//! HTLC Coordinator Service
//!
//! Runs the ledger-backed HTLC escrow behind a REST API.
//!
//! ## Overview
//!
//! The service:
//! 1. Records escrows whose tokens sit in its custody account on external ledgers
//! 2. Pays out claims and refunds by issuing transfers against those ledgers
//! 3. Keeps failed payouts pending until they are retried
//! 4. Serves resolver queries (active, expired, by sender/receiver) and events
//!
//! ## Security Model
//!
//! The service trusts the `x-caller` header for caller identity. It must run
//! behind a gateway that authenticates callers.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use htlc::ledger::LedgerHtlc;
use htlc::SystemClock;
use htlc_coordinator::api::ApiServer;
use htlc_coordinator::config::{Config, CONFIG_PATH_ENV};
use htlc_coordinator::HttpTokenLedger;

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

/// Main application entry point that initializes and runs the coordinator service.
///
/// This function:
/// 1. Initializes logging and tracing
/// 2. Loads configuration from TOML file
/// 3. Builds the token ledger client and the escrow core
/// 4. Runs the API server until shutdown
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!("HTLC Coordinator Service");
        println!();
        println!("Usage: htlc-coordinator [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --config <path>   Use custom config file path");
        println!("  --help, -h        Show this help message");
        println!();
        println!("Environment variables:");
        println!("  {}    Path to config file (overrides --config)", CONFIG_PATH_ENV);
        println!("  RUST_LOG                        Log filter (default: info)");
        return Ok(());
    }

    info!("Starting HTLC Coordinator Service v{}", htlc::VERSION);

    let mut config_path = None;
    for (i, arg) in args.iter().enumerate() {
        if arg == "--config" && i + 1 < args.len() {
            config_path = Some(args[i + 1].clone());
            break;
        }
    }

    let config = match (std::env::var(CONFIG_PATH_ENV).ok(), config_path) {
        (Some(path), _) => {
            info!("Using config from {}: {}", CONFIG_PATH_ENV, path);
            Config::load_from(&path)?
        }
        (None, Some(path)) => {
            info!("Using custom config: {}", path);
            Config::load_from(&path)?
        }
        (None, None) => Config::load()?,
    };
    info!("Configuration loaded successfully");

    let ledger = HttpTokenLedger::new(
        &config.ledger.url,
        &config.htlc.custody_principal,
        config.ledger.timeout_ms,
    )?;
    info!(
        "Token ledger gateway {} (custody {})",
        config.ledger.url, config.htlc.custody_principal
    );

    let htlc = Arc::new(LedgerHtlc::new(
        config.ledger_htlc_config(),
        Arc::new(ledger),
        Arc::new(SystemClock),
    ));

    let api_server = ApiServer::new(config, htlc);
    api_server.run().await?;

    Ok(())
}

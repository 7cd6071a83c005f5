//! HTLC Coordinator Service Library
//!
//! This crate hosts the ledger-backed HTLC escrow as a service: it loads the
//! configuration, reaches the external token ledgers over HTTP and exposes the
//! escrow operations and resolver queries as a REST API.

pub mod api;
pub mod config;
pub mod ledger_client;

// Re-export commonly used types
pub use config::{ApiConfig, Config, HtlcConfig, LedgerConfig};
pub use ledger_client::HttpTokenLedger;

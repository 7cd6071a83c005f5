//! REST API Server Module
//!
//! This module provides the REST API of the HTLC coordinator service:
//! escrow mutations and resolver queries over the ledger-backed escrow core,
//! plus service-level endpoints.

// Generic shared code (response envelope, filters, rejection handling, server)
mod generic;

// Escrow contract endpoints
mod contracts;

pub use contracts::ContractEntry;
pub use generic::{ApiResponse, ApiServer, VerifyRequest};

//! Token ledger capability
//!
//! The ledger-backed escrow pulls a sender's tokens into custody with an
//! ICRC2 `transfer_from` when an escrow is created, and pays out by issuing
//! transfer instructions against the same ledger. A call can fail at two levels:
//! the call itself (`Err(LedgerCallError)`) or the ledger's verdict
//! (`Ok(TransferResult::Err(..))`).

use async_trait::async_trait;
use thiserror::Error;

use super::types::{TransferArg, TransferFromArg, TransferResult};

/// Failure to obtain a verdict from the ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerCallError {
    #[error("Ledger unreachable: {0}")]
    Unreachable(String),

    #[error("Ledger rejected call with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid ledger response: {0}")]
    InvalidResponse(String),

    /// The id cannot address a ledger; nothing was sent
    #[error("Invalid ledger id: {0}")]
    InvalidLedgerId(String),
}

/// Transfer capability against named external ledgers.
///
/// The implementor acts as the custody principal: `transfer` debits the
/// custody account, `transfer_from` spends an allowance granted to it.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    async fn transfer(&self, ledger_id: &str, arg: TransferArg) -> Result<TransferResult, LedgerCallError>;

    async fn transfer_from(
        &self,
        ledger_id: &str,
        arg: TransferFromArg,
    ) -> Result<TransferResult, LedgerCallError>;
}

//! Ledger-backed variant
//!
//! Escrows over external ICRC1-style token ledgers reached through the
//! [`TokenLedger`] capability. Every mutating operation answers with a
//! [`ContractResponse`] envelope.

pub mod client;
pub mod contract;
pub mod htlc;
pub mod memory;
pub mod types;

pub use client::{LedgerCallError, TokenLedger};
pub use contract::{
    ClaimRequest, ContractError, ContractResponse, ContractStatus, NewContractRequest, Payout,
    RefundRequest, TimeLockContract, TransferRequest,
};
pub use htlc::{LedgerHtlc, LedgerHtlcConfig};
pub use memory::{InMemoryTokenLedger, RecordedTransfer, RecordedTransferFrom, ScriptedFailure};
pub use types::{Account, BlockIndex, NumTokens, TransferArg, TransferError, TransferFromArg, TransferResult};

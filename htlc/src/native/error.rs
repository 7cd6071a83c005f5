//! Error types

use thiserror::Error;

use crate::types::{Address, Amount};

/// Failures of the native-asset ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BankError {
    #[error("Insufficient funds in {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: Address,
        balance: Amount,
        requested: Amount,
    },

    #[error("Balance overflow")]
    Overflow,
}

/// Failures of the liquidity vault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("Not authorized")]
    NotAuthorized,

    #[error("Coordinator already configured")]
    AlreadyConfigured,

    #[error("Invalid amount")]
    InvalidAmount,

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Nothing locked")]
    NothingLocked,

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Transfer failed: {0}")]
    Transfer(#[from] BankError),
}

/// Failures of the native escrow coordinator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HtlcError {
    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Invalid receiver")]
    InvalidReceiver,

    #[error("Invalid timelock")]
    InvalidTimeLock,

    #[error("Contract already exists")]
    ContractAlreadyExists,

    #[error("Contract not found")]
    ContractNotFound,

    #[error("Caller is not the receiver")]
    CallerNotReceiver,

    #[error("Caller is not the sender")]
    CallerNotSender,

    #[error("Hashlock mismatch")]
    HashlockMismatch,

    #[error("Already withdrawn")]
    AlreadyWithdrawn,

    #[error("Already refunded")]
    AlreadyRefunded,

    #[error("Timelock not expired")]
    TimeLockNotExpired,

    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Transfer failed: {0}")]
    Transfer(#[from] BankError),
}

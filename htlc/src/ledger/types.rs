//! ICRC1/ICRC2-style transfer types
//!
//! Wire shapes of the external token ledger's `icrc1_transfer` and
//! `icrc2_transfer_from` calls. Results are externally tagged
//! (`{"Ok": 12}` / `{"Err": {"InsufficientFunds": {...}}}`).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Height of the block that recorded a transfer.
pub type BlockIndex = u64;

/// Token amount on an external ledger.
pub type NumTokens = u64;

/// 32-byte subaccount selector.
pub type Subaccount = [u8; 32];

/// Ledger account: owner principal plus optional subaccount.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub owner: String,
    #[serde(default)]
    pub subaccount: Option<Subaccount>,
}

impl Account {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            subaccount: None,
        }
    }
}

/// Arguments of `icrc1_transfer`. The source account is the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferArg {
    #[serde(default)]
    pub from_subaccount: Option<Subaccount>,
    pub to: Account,
    #[serde(default)]
    pub fee: Option<NumTokens>,
    #[serde(default)]
    pub created_at_time: Option<u64>,
    #[serde(default)]
    pub memo: Option<Vec<u8>>,
    pub amount: NumTokens,
}

impl TransferArg {
    /// Plain transfer of `amount` to `owner`'s default account.
    pub fn to_owner(owner: impl Into<String>, amount: NumTokens) -> Self {
        Self {
            from_subaccount: None,
            to: Account::new(owner),
            fee: None,
            created_at_time: None,
            memo: None,
            amount,
        }
    }
}

/// Arguments of `icrc2_transfer_from`. The caller is the spender and must hold
/// an allowance from `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFromArg {
    #[serde(default)]
    pub spender_subaccount: Option<Subaccount>,
    pub from: Account,
    pub to: Account,
    pub amount: NumTokens,
    #[serde(default)]
    pub fee: Option<NumTokens>,
    #[serde(default)]
    pub memo: Option<Vec<u8>>,
    #[serde(default)]
    pub created_at_time: Option<u64>,
}

impl TransferFromArg {
    /// Moves `amount` from `from`'s default account to `to`'s.
    pub fn between(from: impl Into<String>, to: impl Into<String>, amount: NumTokens) -> Self {
        Self {
            spender_subaccount: None,
            from: Account::new(from),
            to: Account::new(to),
            amount,
            fee: None,
            memo: None,
            created_at_time: None,
        }
    }
}

/// Ledger-level rejection of a transfer.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferError {
    #[error("Bad fee, expected {expected_fee}")]
    BadFee { expected_fee: NumTokens },

    #[error("Bad burn, minimum {min_burn_amount}")]
    BadBurn { min_burn_amount: NumTokens },

    #[error("Insufficient funds, balance {balance}")]
    InsufficientFunds { balance: NumTokens },

    /// `icrc2_transfer_from` only
    #[error("Insufficient allowance, allowance {allowance}")]
    InsufficientAllowance { allowance: NumTokens },

    #[error("Transaction too old")]
    TooOld,

    #[error("Transaction created in the future, ledger time {ledger_time}")]
    CreatedInFuture { ledger_time: u64 },

    #[error("Ledger temporarily unavailable")]
    TemporarilyUnavailable,

    #[error("Duplicate of block {duplicate_of}")]
    Duplicate { duplicate_of: BlockIndex },

    #[error("Ledger error {error_code}: {message}")]
    GenericError { error_code: u64, message: String },
}

/// Outcome of a transfer the ledger processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferResult {
    Ok(BlockIndex),
    Err(TransferError),
}

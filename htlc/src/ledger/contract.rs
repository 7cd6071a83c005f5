//! Ledger-backed escrow records, requests and responses
//!
//! A [`TimeLockContract`] carries an explicit [`ContractStatus`] and, once
//! resolved, a [`Payout`] tracking the outbound ledger transfer. On the wire
//! the record also exposes the `withdrawn`/`refunded` flags resolvers expect.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{Account, BlockIndex, NumTokens, TransferResult};
use crate::types::{Hash32, LockId};

// ============================================================================
// ERRORS
// ============================================================================

/// Rejection of a ledger-backed escrow operation.
///
/// The display text is what callers see in [`ContractResponse::message`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("Receiver cannot be empty")]
    EmptyReceiver,

    #[error("Amount must be greater than 0")]
    InvalidAmount,

    #[error("Hashlock cannot be empty")]
    EmptyHashlock,

    #[error("Hashlock must be a valid SHA-256 hash (64 characters)")]
    InvalidHashlock,

    #[error("Ledger id cannot be empty")]
    EmptyLedgerId,

    #[error("Ledger id may only contain letters, digits, '-' and '_'")]
    InvalidLedgerId,

    #[error("Timelock must be in the future")]
    TimelockNotInFuture,

    #[error("Timelock must be at least {min_duration} seconds in the future")]
    InvalidTimeLock { min_duration: u64 },

    #[error("Contract already exists")]
    ContractAlreadyExists,

    /// The sender's tokens could not be pulled into custody
    #[error("Deposit failed: {0}")]
    DepositFailed(String),

    #[error("Contract not found")]
    ContractNotFound,

    #[error("Only receiver can claim")]
    CallerNotReceiver,

    #[error("Only sender can refund")]
    CallerNotSender,

    #[error("Invalid preimage")]
    HashlockMismatch,

    #[error("Already withdrawn")]
    AlreadyWithdrawn,

    #[error("Already refunded")]
    AlreadyRefunded,

    #[error("Timelock has not expired yet")]
    TimeLockNotExpired,

    #[error("No pending payout for this contract")]
    PayoutNotPending,

    #[error("Caller is not a controller")]
    NotController,
}

// ============================================================================
// CONTRACT RECORD
// ============================================================================

/// Resolution status of a ledger-backed escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Active,
    Claimed,
    Refunded,
}

/// Progress of the outbound transfer of a resolved escrow.
///
/// `InFlight` is set before the transfer is awaited, so a concurrent retry can
/// never issue a second transfer for the same escrow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Payout {
    InFlight { attempts: u32 },
    Pending { attempts: u32, last_error: String },
    Paid { block_index: BlockIndex },
}

/// An escrow over an external token ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ContractView", try_from = "ContractView")]
pub struct TimeLockContract {
    pub sender: String,
    pub receiver: String,
    pub amount: NumTokens,
    pub hashlock: Hash32,
    pub timelock: u64,
    pub preimage: Option<String>,
    pub ledger_id: String,
    pub status: ContractStatus,
    /// `None` while active
    pub payout: Option<Payout>,
}

impl TimeLockContract {
    pub fn withdrawn(&self) -> bool {
        self.status == ContractStatus::Claimed
    }

    pub fn refunded(&self) -> bool {
        self.status == ContractStatus::Refunded
    }

    pub fn is_active(&self) -> bool {
        self.status == ContractStatus::Active
    }

    /// Active and at or past its timelock.
    pub fn is_expired(&self, now: u64) -> bool {
        self.is_active() && now >= self.timelock
    }

    /// Resolved, with a payout waiting to be retried.
    pub fn payout_pending(&self) -> bool {
        matches!(self.payout, Some(Payout::Pending { .. }))
    }

    /// Where the locked tokens go once resolved.
    pub fn payout_destination(&self) -> Option<&str> {
        match self.status {
            ContractStatus::Active => None,
            ContractStatus::Claimed => Some(&self.receiver),
            ContractStatus::Refunded => Some(&self.sender),
        }
    }

    /// Guard order of a claim: caller, terminal state, then preimage.
    pub(crate) fn check_claim(&self, caller: &str, preimage: &str) -> Result<(), ContractError> {
        if caller != self.receiver {
            return Err(ContractError::CallerNotReceiver);
        }
        if !self.is_active() {
            return Err(ContractError::AlreadyWithdrawn);
        }
        if !crate::crypto::verify_preimage(preimage.as_bytes(), &self.hashlock) {
            return Err(ContractError::HashlockMismatch);
        }
        Ok(())
    }

    /// Guard order of a refund: caller, claimed, refunded, then expiry.
    pub(crate) fn check_refund(&self, caller: &str, now: u64) -> Result<(), ContractError> {
        if caller != self.sender {
            return Err(ContractError::CallerNotSender);
        }
        match self.status {
            ContractStatus::Claimed => return Err(ContractError::AlreadyWithdrawn),
            ContractStatus::Refunded => return Err(ContractError::AlreadyRefunded),
            ContractStatus::Active => {}
        }
        if now < self.timelock {
            return Err(ContractError::TimeLockNotExpired);
        }
        Ok(())
    }
}

/// Wire form of [`TimeLockContract`].
#[derive(Serialize, Deserialize)]
struct ContractView {
    sender: String,
    receiver: String,
    amount: NumTokens,
    hashlock: String,
    timelock: u64,
    preimage: Option<String>,
    ledger_id: String,
    withdrawn: bool,
    refunded: bool,
    status: ContractStatus,
    #[serde(default)]
    payout: Option<Payout>,
}

impl From<TimeLockContract> for ContractView {
    fn from(c: TimeLockContract) -> Self {
        Self {
            withdrawn: c.withdrawn(),
            refunded: c.refunded(),
            hashlock: c.hashlock.to_hex(),
            sender: c.sender,
            receiver: c.receiver,
            amount: c.amount,
            timelock: c.timelock,
            preimage: c.preimage,
            ledger_id: c.ledger_id,
            status: c.status,
            payout: c.payout,
        }
    }
}

impl TryFrom<ContractView> for TimeLockContract {
    type Error = String;

    fn try_from(v: ContractView) -> Result<Self, Self::Error> {
        if v.withdrawn != (v.status == ContractStatus::Claimed)
            || v.refunded != (v.status == ContractStatus::Refunded)
        {
            return Err(format!("flags withdrawn={} refunded={} disagree with status {:?}", v.withdrawn, v.refunded, v.status));
        }
        let hashlock = v.hashlock.parse::<Hash32>().map_err(|e| e.to_string())?;
        Ok(Self {
            sender: v.sender,
            receiver: v.receiver,
            amount: v.amount,
            hashlock,
            timelock: v.timelock,
            preimage: v.preimage,
            ledger_id: v.ledger_id,
            status: v.status,
            payout: v.payout,
        })
    }
}

// ============================================================================
// REQUESTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContractRequest {
    pub receiver: String,
    pub amount: NumTokens,
    /// 64 hex characters, optionally `0x`-prefixed
    pub hashlock: String,
    pub timelock: u64,
    pub ledger_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub lock_id: String,
    pub preimage: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub lock_id: String,
}

/// Direct transfer out of custody on a named ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub ledger_id: String,
    pub to: Account,
    pub amount: NumTokens,
    #[serde(default)]
    pub memo: Option<Vec<u8>>,
}

// ============================================================================
// RESPONSE ENVELOPE
// ============================================================================

/// Uniform result of every mutating ledger-backed operation.
///
/// `success` is explicit because a resolved escrow can still have a failed
/// payout: such a response carries `success: false` together with the lock id
/// and the already-resolved contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub lock_id: Option<String>,
    #[serde(default)]
    pub contract: Option<TimeLockContract>,
    #[serde(default)]
    pub transfer_result: Option<TransferResult>,
}

impl ContractResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            lock_id: None,
            contract: None,
            transfer_result: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::ok(message)
        }
    }

    pub fn with_contract(mut self, lock_id: &LockId, contract: TimeLockContract) -> Self {
        self.lock_id = Some(lock_id.to_hex());
        self.contract = Some(contract);
        self
    }

    pub fn with_transfer_result(mut self, result: TransferResult) -> Self {
        self.transfer_result = Some(result);
        self
    }
}

impl From<ContractError> for ContractResponse {
    fn from(e: ContractError) -> Self {
        Self::failed(e.to_string())
    }
}

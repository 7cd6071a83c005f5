//! Hashed Time-Locked Escrow Coordinator
//!
//! Escrows over the native asset. Funds received at creation are forwarded
//! into the [`LiquidityVault`] under the escrow's lock id; claim and refund ask
//! the vault to release them. The coordinator is the vault's only authorized
//! caller, so the checks in this module guard every locked fund.
//!
//! Per escrow: `Created -> Claimed | Refunded`, both terminal.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::bank::NativeLedger;
use super::error::HtlcError;
use super::vault::LiquidityVault;
use crate::clock::Clock;
use crate::crypto;
use crate::events::{EventBus, HtlcEvent};
use crate::types::{Address, Amount, Hash32, LockId};

// ============================================================================
// ESCROW RECORD
// ============================================================================

/// Resolution status of an escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EscrowStatus {
    /// Funds locked, awaiting claim or refund
    Created,
    /// Receiver revealed the preimage and was paid
    Claimed,
    /// Sender reclaimed the funds after expiry
    Refunded,
}

impl EscrowStatus {
    /// Guarded transition out of `Created`.
    ///
    /// A claimed escrow reports `AlreadyWithdrawn` and a refunded one
    /// `AlreadyRefunded`, except that claiming never distinguishes the two
    /// terminal states (see [`HashedTimeLock::claim`]).
    fn transition(self, to: EscrowStatus) -> Result<EscrowStatus, HtlcError> {
        match (self, to) {
            (EscrowStatus::Created, EscrowStatus::Claimed | EscrowStatus::Refunded) => Ok(to),
            (EscrowStatus::Claimed, _) => Err(HtlcError::AlreadyWithdrawn),
            (EscrowStatus::Refunded, EscrowStatus::Claimed) => Err(HtlcError::AlreadyWithdrawn),
            (EscrowStatus::Refunded, _) => Err(HtlcError::AlreadyRefunded),
            (EscrowStatus::Created, EscrowStatus::Created) => Ok(self),
        }
    }
}

/// A native escrow.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Escrow {
    /// Funder; sole authority to refund
    pub sender: Address,
    /// Sole authority to claim
    pub receiver: Address,
    /// Value committed at creation
    pub amount: Amount,
    /// SHA-256 commitment to the secret preimage
    pub hashlock: Hash32,
    /// Absolute expiry (unix seconds); refund allowed at or after it
    pub timelock: u64,
    /// Revealed on successful claim
    pub preimage: Option<Vec<u8>>,
    pub status: EscrowStatus,
}

impl Escrow {
    /// True iff claimed.
    pub fn withdrawn(&self) -> bool {
        self.status == EscrowStatus::Claimed
    }

    /// True iff refunded.
    pub fn refunded(&self) -> bool {
        self.status == EscrowStatus::Refunded
    }
}

// ============================================================================
// COORDINATOR
// ============================================================================

/// HTLC coordinator over the native asset.
pub struct HashedTimeLock {
    /// Custody account; must be the vault's authorized caller
    address: Address,
    /// Minimum distance between now and a new escrow's timelock
    min_time_lock_duration: u64,
    vault: Arc<LiquidityVault>,
    ledger: Arc<dyn NativeLedger>,
    clock: Arc<dyn Clock>,
    escrows: Mutex<HashMap<LockId, Escrow>>,
    events: EventBus<HtlcEvent>,
}

impl HashedTimeLock {
    pub fn new(
        address: Address,
        min_time_lock_duration: u64,
        vault: Arc<LiquidityVault>,
        ledger: Arc<dyn NativeLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            address,
            min_time_lock_duration,
            vault,
            ledger,
            clock,
            escrows: Mutex::new(HashMap::new()),
            events: EventBus::new(),
        }
    }

    /// Creates an escrow funded with `amount` from `caller`.
    ///
    /// The value is taken from the caller and locked in the vault under the
    /// derived lock id. If the vault rejects the lock the value is returned
    /// and nothing is recorded.
    ///
    /// # Returns
    ///
    /// * `Ok(LockId)` - Id of the new escrow
    /// * `Err(HtlcError)` - Validation failure, duplicate escrow, or transfer failure
    pub async fn create_escrow(
        &self,
        caller: &Address,
        receiver: Address,
        hashlock: Hash32,
        timelock: u64,
        amount: Amount,
    ) -> Result<LockId, HtlcError> {
        if amount == 0 {
            return Err(HtlcError::InsufficientFunds);
        }
        if receiver.is_zero() {
            return Err(HtlcError::InvalidReceiver);
        }
        let earliest = self.clock.now().saturating_add(self.min_time_lock_duration);
        if timelock < earliest {
            return Err(HtlcError::InvalidTimeLock);
        }

        let lock_id = crypto::native_lock_id(caller, &receiver, amount, &hashlock, timelock);

        let mut escrows = self.escrows.lock().await;
        if escrows.contains_key(&lock_id) {
            return Err(HtlcError::ContractAlreadyExists);
        }

        self.ledger.transfer(caller, &self.address, amount).await?;
        if let Err(e) = self.vault.lock_for_escrow(&self.address, lock_id, amount).await {
            warn!("Vault rejected lock for {}: {}; returning funds", lock_id, e);
            self.ledger.transfer(&self.address, caller, amount).await?;
            return Err(e.into());
        }

        escrows.insert(
            lock_id,
            Escrow {
                sender: *caller,
                receiver,
                amount,
                hashlock,
                timelock,
                preimage: None,
                status: EscrowStatus::Created,
            },
        );
        drop(escrows);

        info!("Escrow {} created: {} from {} to {}, timelock {}", lock_id, amount, caller, receiver, timelock);
        self.events
            .emit(HtlcEvent::TimeLockContractCreated { lock_id, amount, timelock })
            .await;
        Ok(lock_id)
    }

    /// Claims an escrow by revealing its preimage. Pays the receiver.
    ///
    /// Claims are accepted at any time before resolution, even after the
    /// timelock. An escrow that is already resolved, whether claimed or
    /// refunded, fails with `AlreadyWithdrawn`.
    pub async fn claim(&self, caller: &Address, lock_id: LockId, preimage: Vec<u8>) -> Result<(), HtlcError> {
        let mut escrows = self.escrows.lock().await;
        let escrow = escrows.get_mut(&lock_id).ok_or(HtlcError::ContractNotFound)?;

        if *caller != escrow.receiver {
            return Err(HtlcError::CallerNotReceiver);
        }
        let next = escrow.status.transition(EscrowStatus::Claimed)?;
        if !crypto::verify_preimage(&preimage, &escrow.hashlock) {
            return Err(HtlcError::HashlockMismatch);
        }

        let receiver = escrow.receiver;
        self.vault.release_escrow(&self.address, lock_id, receiver).await?;
        escrow.status = next;
        escrow.preimage = Some(preimage.clone());
        drop(escrows);

        info!("Escrow {} claimed by {}", lock_id, receiver);
        self.events
            .emit(HtlcEvent::TimeLockContractClaimed { lock_id, preimage })
            .await;
        Ok(())
    }

    /// Refunds an expired escrow to its sender.
    pub async fn refund(&self, caller: &Address, lock_id: LockId) -> Result<(), HtlcError> {
        let mut escrows = self.escrows.lock().await;
        let escrow = escrows.get_mut(&lock_id).ok_or(HtlcError::ContractNotFound)?;

        if *caller != escrow.sender {
            return Err(HtlcError::CallerNotSender);
        }
        let next = escrow.status.transition(EscrowStatus::Refunded)?;
        if self.clock.now() < escrow.timelock {
            return Err(HtlcError::TimeLockNotExpired);
        }

        let sender = escrow.sender;
        self.vault.release_escrow(&self.address, lock_id, sender).await?;
        escrow.status = next;
        drop(escrows);

        info!("Escrow {} refunded to {}", lock_id, sender);
        self.events
            .emit(HtlcEvent::TimeLockContractRefunded { lock_id })
            .await;
        Ok(())
    }

    // ========================================================================
    // VIEWS
    // ========================================================================

    pub async fn get_escrow(&self, lock_id: &LockId) -> Option<Escrow> {
        self.escrows.lock().await.get(lock_id).cloned()
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn min_time_lock_duration(&self) -> u64 {
        self.min_time_lock_duration
    }

    pub fn vault(&self) -> &Arc<LiquidityVault> {
        &self.vault
    }

    pub fn events(&self) -> &EventBus<HtlcEvent> {
        &self.events
    }
}

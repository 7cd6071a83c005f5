//! Liquidity Vault
//!
//! Custodies pooled LP funds and escrow funds on the native ledger.
//!
//! LP ownership is tracked in shares, priced at the constant ratio
//! `total_shares / total_eth`. `balances` is a per-LP display cache that is kept
//! consistent with `shares` on every mutation. Escrow funds live in a separate
//! `locked` ledger keyed by lock id and never touch pool accounting.
//!
//! ## Security Model
//!
//! `lock_for_escrow` and `release_escrow` are restricted to a single authorized
//! caller (the escrow coordinator), set once by the deploying owner. Whoever is
//! authorized can send any locked amount to any destination.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::bank::NativeLedger;
use super::error::VaultError;
use crate::events::{EventBus, VaultEvent};
use crate::types::{Address, Amount, LockId};

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Default)]
struct VaultState {
    /// Escrow coordinator allowed to lock/release; set exactly once
    authorized_caller: Option<Address>,
    /// LP address -> withdrawable amount (display cache)
    balances: HashMap<Address, Amount>,
    /// LP address -> ownership units
    shares: HashMap<Address, Amount>,
    total_shares: Amount,
    /// LP-owned pool value; excludes locked escrow funds
    total_eth: Amount,
    /// Lock id -> earmarked escrow funds; zeroed, not removed, on release
    locked: HashMap<LockId, Amount>,
}

impl VaultState {
    fn ensure_authorized(&self, caller: &Address) -> Result<(), VaultError> {
        match self.authorized_caller {
            Some(authorized) if authorized == *caller => Ok(()),
            _ => Err(VaultError::NotAuthorized),
        }
    }

    /// Shares minted for a deposit of `amount` at the current pool ratio.
    fn shares_for_deposit(&self, amount: Amount) -> Result<Amount, VaultError> {
        if self.total_shares == 0 || self.total_eth == 0 {
            return Ok(amount);
        }
        amount
            .checked_mul(self.total_shares)
            .map(|v| v / self.total_eth)
            .ok_or(VaultError::Overflow)
    }

    /// Shares burned for a withdrawal of `amount` at the current pool ratio.
    fn shares_for_withdrawal(&self, amount: Amount) -> Result<Amount, VaultError> {
        if self.total_eth == 0 {
            return Ok(0);
        }
        amount
            .checked_mul(self.total_shares)
            .map(|v| v / self.total_eth)
            .ok_or(VaultError::Overflow)
    }
}

// ============================================================================
// VAULT
// ============================================================================

/// Pooled liquidity vault with an escrow lock ledger.
pub struct LiquidityVault {
    /// Custody account of the vault on the native ledger
    address: Address,
    /// Deployer, allowed to authorize the coordinator once
    owner: Address,
    ledger: Arc<dyn NativeLedger>,
    state: Mutex<VaultState>,
    events: EventBus<VaultEvent>,
}

impl LiquidityVault {
    /// Creates an empty vault custodied at `address` and owned by `owner`.
    pub fn new(address: Address, owner: Address, ledger: Arc<dyn NativeLedger>) -> Self {
        Self {
            address,
            owner,
            ledger,
            state: Mutex::new(VaultState::default()),
            events: EventBus::new(),
        }
    }

    /// Sets the escrow coordinator allowed to lock and release funds.
    ///
    /// Only the owner may call this, and only once.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Coordinator authorized
    /// * `Err(VaultError::NotAuthorized)` - Caller is not the owner
    /// * `Err(VaultError::AlreadyConfigured)` - A coordinator is already set
    pub async fn authorize_coordinator(
        &self,
        caller: &Address,
        coordinator: Address,
    ) -> Result<(), VaultError> {
        if *caller != self.owner {
            return Err(VaultError::NotAuthorized);
        }
        let mut state = self.state.lock().await;
        if state.authorized_caller.is_some() {
            return Err(VaultError::AlreadyConfigured);
        }
        state.authorized_caller = Some(coordinator);
        info!("Vault {} authorized coordinator {}", self.address, coordinator);
        Ok(())
    }

    /// Deposits `amount` from `caller` into the pool and mints shares.
    ///
    /// # Returns
    ///
    /// * `Ok(shares)` - Shares minted to the caller
    /// * `Err(VaultError)` - Zero amount, overflow, or the caller cannot pay
    pub async fn deposit_liquidity(&self, caller: &Address, amount: Amount) -> Result<Amount, VaultError> {
        if amount == 0 {
            return Err(VaultError::InvalidAmount);
        }

        let mut state = self.state.lock().await;
        let shares = state.shares_for_deposit(amount)?;
        let total_shares = state.total_shares.checked_add(shares).ok_or(VaultError::Overflow)?;
        let total_eth = state.total_eth.checked_add(amount).ok_or(VaultError::Overflow)?;

        self.ledger.transfer(caller, &self.address, amount).await?;

        *state.balances.entry(*caller).or_insert(0) += amount;
        *state.shares.entry(*caller).or_insert(0) += shares;
        state.total_shares = total_shares;
        state.total_eth = total_eth;
        drop(state);

        info!("LP {} deposited {} for {} shares", caller, amount, shares);
        self.events
            .emit(VaultEvent::Deposited { lp: *caller, amount, shares })
            .await;
        Ok(shares)
    }

    /// Withdraws `amount` of the caller's liquidity and burns the matching shares.
    ///
    /// A zero amount is a valid no-op that still emits `Withdrawn`.
    ///
    /// # Returns
    ///
    /// * `Ok(shares)` - Shares burned
    /// * `Err(VaultError::InsufficientBalance)` - Caller's balance or shares cannot cover it
    pub async fn withdraw_liquidity(&self, caller: &Address, amount: Amount) -> Result<Amount, VaultError> {
        let mut state = self.state.lock().await;

        let balance = state.balances.get(caller).copied().unwrap_or(0);
        if balance < amount {
            return Err(VaultError::InsufficientBalance);
        }
        let burn = state.shares_for_withdrawal(amount)?;
        let lp_shares = state.shares.get(caller).copied().unwrap_or(0);
        if lp_shares < burn {
            warn!("LP {} holds {} shares, withdrawal needs {}", caller, lp_shares, burn);
            return Err(VaultError::InsufficientBalance);
        }

        // Zero withdrawals leave the maps untouched
        if amount > 0 {
            self.ledger.transfer(&self.address, caller, amount).await?;
            state.balances.insert(*caller, balance - amount);
            state.shares.insert(*caller, lp_shares - burn);
            state.total_shares -= burn;
            state.total_eth -= amount;
        }
        drop(state);

        info!("LP {} withdrew {} burning {} shares", caller, amount, burn);
        self.events
            .emit(VaultEvent::Withdrawn { lp: *caller, amount, shares: burn })
            .await;
        Ok(burn)
    }

    /// Earmarks `amount` for `lock_id`, pulling the value from the caller.
    ///
    /// Repeated locks on the same id accumulate. Zero is allowed and records intent.
    ///
    /// # Returns
    ///
    /// * `Ok(total)` - Cumulative amount locked for `lock_id`
    /// * `Err(VaultError::NotAuthorized)` - Caller is not the authorized coordinator
    pub async fn lock_for_escrow(
        &self,
        caller: &Address,
        lock_id: LockId,
        amount: Amount,
    ) -> Result<Amount, VaultError> {
        let mut state = self.state.lock().await;
        state.ensure_authorized(caller)?;

        let current = state.locked.get(&lock_id).copied().unwrap_or(0);
        let total = current.checked_add(amount).ok_or(VaultError::Overflow)?;

        if amount > 0 {
            self.ledger.transfer(caller, &self.address, amount).await?;
        }
        state.locked.insert(lock_id, total);
        drop(state);

        info!("Locked {} for {} (total {})", amount, lock_id, total);
        self.events.emit(VaultEvent::Locked { lock_id, total }).await;
        Ok(total)
    }

    /// Sends the whole amount locked for `lock_id` to `destination`.
    ///
    /// # Returns
    ///
    /// * `Ok(amount)` - Amount sent
    /// * `Err(VaultError::NotAuthorized)` - Caller is not the authorized coordinator
    /// * `Err(VaultError::NothingLocked)` - Nothing (left) locked for `lock_id`
    pub async fn release_escrow(
        &self,
        caller: &Address,
        lock_id: LockId,
        destination: Address,
    ) -> Result<Amount, VaultError> {
        let mut state = self.state.lock().await;
        state.ensure_authorized(caller)?;

        let amount = state.locked.get(&lock_id).copied().unwrap_or(0);
        if amount == 0 {
            return Err(VaultError::NothingLocked);
        }

        self.ledger.transfer(&self.address, &destination, amount).await?;
        state.locked.insert(lock_id, 0);
        drop(state);

        info!("Released {} for {} to {}", amount, lock_id, destination);
        self.events
            .emit(VaultEvent::Sent { lock_id, destination, amount })
            .await;
        Ok(amount)
    }

    // ========================================================================
    // VIEWS
    // ========================================================================

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub async fn authorized_caller(&self) -> Option<Address> {
        self.state.lock().await.authorized_caller
    }

    pub async fn balance_of(&self, lp: &Address) -> Amount {
        self.state.lock().await.balances.get(lp).copied().unwrap_or(0)
    }

    pub async fn shares_of(&self, lp: &Address) -> Amount {
        self.state.lock().await.shares.get(lp).copied().unwrap_or(0)
    }

    /// Number of LP accounts the vault tracks.
    pub async fn lp_count(&self) -> usize {
        self.state.lock().await.shares.len()
    }

    pub async fn total_shares(&self) -> Amount {
        self.state.lock().await.total_shares
    }

    /// LP-owned pool value (excludes locked escrow funds).
    pub async fn total_eth(&self) -> Amount {
        self.state.lock().await.total_eth
    }

    /// Amount currently locked for `lock_id` (0 if never locked or released).
    pub async fn locked(&self, lock_id: &LockId) -> Amount {
        self.state.lock().await.locked.get(lock_id).copied().unwrap_or(0)
    }

    pub fn events(&self) -> &EventBus<VaultEvent> {
        &self.events
    }
}

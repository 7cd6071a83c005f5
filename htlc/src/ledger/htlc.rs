//! Ledger-backed HTLC
//!
//! Escrows whose tokens sit in the service's custody account on an external
//! ledger. Creation pulls the sender's tokens into custody with an ICRC2
//! `transfer_from` (the sender approves the custody principal beforehand) and
//! records the escrow only once the ledger confirms the pull. Claim and refund
//! pay out by issuing a transfer against that ledger.
//!
//! ## Split-phase payout
//!
//! The escrow is marked resolved, with its payout `InFlight`, before the
//! transfer is awaited. The transfer outcome then moves the payout to `Paid`
//! or `Pending`. A `Pending` payout is retried with [`LedgerHtlc::retry_payout`],
//! which only ever re-issues the transfer from `Pending`, so a resolved escrow
//! is paid at most once and never silently dropped.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::client::TokenLedger;
use super::contract::{
    ClaimRequest, ContractError, ContractResponse, ContractStatus, NewContractRequest, Payout,
    RefundRequest, TimeLockContract, TransferRequest,
};
use super::types::{BlockIndex, TransferArg, TransferFromArg, TransferResult};
use crate::clock::Clock;
use crate::crypto;
use crate::events::{EventBus, HtlcEvent};
use crate::types::{Hash32, LockId};

/// Settings of a [`LedgerHtlc`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerHtlcConfig {
    /// Principal owning the custody accounts on the external ledgers
    pub custody_principal: String,
    /// Minimum distance between now and a new escrow's timelock
    pub min_time_lock_duration: u64,
    /// Principals allowed to use the generic transfer primitive
    pub controllers: Vec<String>,
}

/// HTLC coordinator over external token ledgers.
pub struct LedgerHtlc {
    config: LedgerHtlcConfig,
    ledger: Arc<dyn TokenLedger>,
    clock: Arc<dyn Clock>,
    contracts: RwLock<BTreeMap<LockId, TimeLockContract>>,
    /// Lock ids whose deposit is in flight; locked after `contracts`
    funding: Mutex<HashSet<LockId>>,
    events: EventBus<HtlcEvent>,
}

fn parse_hashlock(hashlock: &str) -> Result<Hash32, ContractError> {
    let digits = hashlock.strip_prefix("0x").unwrap_or(hashlock);
    if digits.is_empty() {
        return Err(ContractError::EmptyHashlock);
    }
    if digits.len() != 64 {
        return Err(ContractError::InvalidHashlock);
    }
    digits.parse::<Hash32>().map_err(|_| ContractError::InvalidHashlock)
}

fn check_ledger_id(ledger_id: &str) -> Result<(), ContractError> {
    if ledger_id.trim().is_empty() {
        return Err(ContractError::EmptyLedgerId);
    }
    if !ledger_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ContractError::InvalidLedgerId);
    }
    Ok(())
}

fn parse_lock_id(lock_id: &str) -> Result<LockId, ContractError> {
    lock_id.parse::<LockId>().map_err(|_| ContractError::ContractNotFound)
}

impl LedgerHtlc {
    pub fn new(config: LedgerHtlcConfig, ledger: Arc<dyn TokenLedger>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            ledger,
            clock,
            contracts: RwLock::new(BTreeMap::new()),
            funding: Mutex::new(HashSet::new()),
            events: EventBus::new(),
        }
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Creates an escrow funded by the caller.
    ///
    /// After validation the lock id is reserved and `amount` is pulled from the
    /// caller's account into custody on `request.ledger_id`. The escrow is
    /// stored only if the ledger confirms the pull; otherwise the reservation
    /// is dropped and the response carries `success: false`.
    pub async fn new_contract(&self, caller: &str, request: NewContractRequest) -> ContractResponse {
        let (lock_id, contract) = match self.prepare_contract(caller, request) {
            Ok(prepared) => prepared,
            Err(e) => {
                debug!("new_contract from {} rejected: {}", caller, e);
                return e.into();
            }
        };
        if let Err(e) = self.reserve(lock_id).await {
            return e.into();
        }

        let block_index = match self.pull_deposit(&lock_id, &contract).await {
            Ok(block_index) => block_index,
            Err(response) => {
                self.funding.lock().await.remove(&lock_id);
                return response;
            }
        };

        {
            let mut contracts = self.contracts.write().await;
            contracts.insert(lock_id, contract.clone());
            self.funding.lock().await.remove(&lock_id);
        }

        info!(
            "Contract {} created on {}: {} from {} to {}, timelock {}, deposit block {}",
            lock_id.to_hex(),
            contract.ledger_id,
            contract.amount,
            contract.sender,
            contract.receiver,
            contract.timelock,
            block_index
        );
        self.events
            .emit(HtlcEvent::TimeLockContractCreated {
                lock_id,
                amount: u128::from(contract.amount),
                timelock: contract.timelock,
            })
            .await;
        ContractResponse::ok("Contract created successfully")
            .with_contract(&lock_id, contract)
            .with_transfer_result(TransferResult::Ok(block_index))
    }

    /// Validates a creation request and derives its lock id.
    fn prepare_contract(
        &self,
        caller: &str,
        request: NewContractRequest,
    ) -> Result<(LockId, TimeLockContract), ContractError> {
        if request.receiver.trim().is_empty() {
            return Err(ContractError::EmptyReceiver);
        }
        if request.amount == 0 {
            return Err(ContractError::InvalidAmount);
        }
        let hashlock = parse_hashlock(&request.hashlock)?;
        check_ledger_id(&request.ledger_id)?;
        let now = self.clock.now();
        if request.timelock <= now {
            return Err(ContractError::TimelockNotInFuture);
        }
        if request.timelock < now.saturating_add(self.config.min_time_lock_duration) {
            return Err(ContractError::InvalidTimeLock {
                min_duration: self.config.min_time_lock_duration,
            });
        }

        let lock_id = crypto::ledger_lock_id(
            caller,
            &request.receiver,
            request.amount,
            &hashlock,
            request.timelock,
            &request.ledger_id,
        );
        let contract = TimeLockContract {
            sender: caller.to_string(),
            receiver: request.receiver,
            amount: request.amount,
            hashlock,
            timelock: request.timelock,
            preimage: None,
            ledger_id: request.ledger_id,
            status: ContractStatus::Active,
            payout: None,
        };
        Ok((lock_id, contract))
    }

    /// Claims `lock_id` for a deposit in flight, rejecting stored and funding duplicates.
    async fn reserve(&self, lock_id: LockId) -> Result<(), ContractError> {
        let contracts = self.contracts.read().await;
        let mut funding = self.funding.lock().await;
        if contracts.contains_key(&lock_id) || !funding.insert(lock_id) {
            return Err(ContractError::ContractAlreadyExists);
        }
        Ok(())
    }

    /// Pulls the escrow amount from the sender into custody.
    async fn pull_deposit(&self, lock_id: &LockId, contract: &TimeLockContract) -> Result<BlockIndex, ContractResponse> {
        let arg = TransferFromArg {
            memo: Some(lock_id.as_bytes().to_vec()),
            ..TransferFromArg::between(
                contract.sender.clone(),
                self.config.custody_principal.clone(),
                contract.amount,
            )
        };

        match self.ledger.transfer_from(&contract.ledger_id, arg).await {
            Ok(TransferResult::Ok(block_index)) => Ok(block_index),
            Ok(TransferResult::Err(e)) => {
                warn!("Deposit of {} from {} on {} rejected: {}", contract.amount, contract.sender, contract.ledger_id, e);
                let response: ContractResponse = ContractError::DepositFailed(e.to_string()).into();
                Err(response.with_transfer_result(TransferResult::Err(e)))
            }
            Err(e) => {
                // The ledger may still have executed the pull; the memo names the lock id
                warn!(
                    "Deposit of {} from {} on {} for {} failed: {}",
                    contract.amount,
                    contract.sender,
                    contract.ledger_id,
                    lock_id.to_hex(),
                    e
                );
                Err(ContractError::DepositFailed(e.to_string()).into())
            }
        }
    }

    /// Claims an escrow with its preimage and pays the receiver.
    pub async fn claim(&self, caller: &str, request: ClaimRequest) -> ContractResponse {
        let lock_id = match parse_lock_id(&request.lock_id) {
            Ok(id) => id,
            Err(e) => return e.into(),
        };

        let contract = {
            let mut contracts = self.contracts.write().await;
            let Some(contract) = contracts.get_mut(&lock_id) else {
                return ContractError::ContractNotFound.into();
            };
            if let Err(e) = contract.check_claim(caller, &request.preimage) {
                debug!("Claim of {} by {} rejected: {}", lock_id.to_hex(), caller, e);
                return e.into();
            }
            contract.status = ContractStatus::Claimed;
            contract.preimage = Some(request.preimage.clone());
            contract.payout = Some(Payout::InFlight { attempts: 1 });
            contract.clone()
        };

        info!("Contract {} claimed by {}", lock_id.to_hex(), caller);
        self.events
            .emit(HtlcEvent::TimeLockContractClaimed {
                lock_id,
                preimage: request.preimage.into_bytes(),
            })
            .await;

        self.settle_payout(lock_id, contract, 1, "Claim successful").await
    }

    /// Refunds an expired escrow to its sender.
    pub async fn refund(&self, caller: &str, request: RefundRequest) -> ContractResponse {
        let lock_id = match parse_lock_id(&request.lock_id) {
            Ok(id) => id,
            Err(e) => return e.into(),
        };
        let now = self.clock.now();

        let contract = {
            let mut contracts = self.contracts.write().await;
            let Some(contract) = contracts.get_mut(&lock_id) else {
                return ContractError::ContractNotFound.into();
            };
            if let Err(e) = contract.check_refund(caller, now) {
                debug!("Refund of {} by {} rejected: {}", lock_id.to_hex(), caller, e);
                return e.into();
            }
            contract.status = ContractStatus::Refunded;
            contract.payout = Some(Payout::InFlight { attempts: 1 });
            contract.clone()
        };

        info!("Contract {} refunded to {}", lock_id.to_hex(), caller);
        self.events
            .emit(HtlcEvent::TimeLockContractRefunded { lock_id })
            .await;

        self.settle_payout(lock_id, contract, 1, "Refund successful").await
    }

    /// Re-issues the transfer of a resolved escrow whose payout failed.
    ///
    /// Anyone may call this: the destination and amount are fixed by the escrow.
    pub async fn retry_payout(&self, lock_id: &str) -> ContractResponse {
        let lock_id = match parse_lock_id(lock_id) {
            Ok(id) => id,
            Err(e) => return e.into(),
        };

        let (contract, attempt) = {
            let mut contracts = self.contracts.write().await;
            let Some(contract) = contracts.get_mut(&lock_id) else {
                return ContractError::ContractNotFound.into();
            };
            let attempt = match &contract.payout {
                Some(Payout::Pending { attempts, .. }) => attempts + 1,
                _ => return ContractError::PayoutNotPending.into(),
            };
            contract.payout = Some(Payout::InFlight { attempts: attempt });
            (contract.clone(), attempt)
        };

        info!("Retrying payout of {} (attempt {})", lock_id.to_hex(), attempt);
        self.settle_payout(lock_id, contract, attempt, "Payout successful").await
    }

    /// Issues the transfer of a resolved escrow and records its outcome.
    async fn settle_payout(
        &self,
        lock_id: LockId,
        contract: TimeLockContract,
        attempt: u32,
        success_message: &str,
    ) -> ContractResponse {
        let Some(destination) = contract.payout_destination() else {
            return ContractError::PayoutNotPending.into();
        };
        let arg = TransferArg::to_owner(destination, contract.amount);
        let outcome = self.ledger.transfer(&contract.ledger_id, arg).await;

        let (payout, transfer_result, failure) = match outcome {
            Ok(TransferResult::Ok(block_index)) => (
                Payout::Paid { block_index },
                Some(TransferResult::Ok(block_index)),
                None,
            ),
            Ok(TransferResult::Err(e)) => {
                let reason = e.to_string();
                (
                    Payout::Pending { attempts: attempt, last_error: reason.clone() },
                    Some(TransferResult::Err(e)),
                    Some(reason),
                )
            }
            Err(e) => {
                let reason = e.to_string();
                (
                    Payout::Pending { attempts: attempt, last_error: reason.clone() },
                    None,
                    Some(reason),
                )
            }
        };

        let contract = {
            let mut contracts = self.contracts.write().await;
            match contracts.get_mut(&lock_id) {
                Some(stored) => {
                    stored.payout = Some(payout.clone());
                    stored.clone()
                }
                None => TimeLockContract { payout: Some(payout.clone()), ..contract },
            }
        };

        let response = match (&payout, failure) {
            (Payout::Paid { block_index }, _) => {
                info!("Payout of {} settled in block {}", lock_id.to_hex(), block_index);
                self.events
                    .emit(HtlcEvent::PayoutSettled { lock_id, block_index: *block_index })
                    .await;
                ContractResponse::ok(success_message)
            }
            (_, reason) => {
                let reason = reason.unwrap_or_default();
                warn!("Payout of {} failed (attempt {}): {}", lock_id.to_hex(), attempt, reason);
                self.events
                    .emit(HtlcEvent::PayoutFailed { lock_id, reason: reason.clone() })
                    .await;
                ContractResponse::failed(format!("Transfer failed: {}", reason))
            }
        };

        let response = response.with_contract(&lock_id, contract);
        match transfer_result {
            Some(result) => response.with_transfer_result(result),
            None => response,
        }
    }

    /// Transfers tokens out of custody on a named ledger. Controllers only.
    pub async fn transfer(&self, caller: &str, request: TransferRequest) -> ContractResponse {
        if !self.config.controllers.iter().any(|c| c == caller) {
            warn!("Transfer by non-controller {} rejected", caller);
            return ContractError::NotController.into();
        }
        if request.amount == 0 {
            return ContractError::InvalidAmount.into();
        }
        if let Err(e) = check_ledger_id(&request.ledger_id) {
            return e.into();
        }

        let arg = TransferArg {
            memo: request.memo,
            to: request.to,
            ..TransferArg::to_owner(String::new(), request.amount)
        };
        let to = arg.to.owner.clone();
        match self.ledger.transfer(&request.ledger_id, arg).await {
            Ok(TransferResult::Ok(block_index)) => {
                info!("Transferred {} on {} to {} in block {}", request.amount, request.ledger_id, to, block_index);
                ContractResponse::ok("Transfer successful").with_transfer_result(TransferResult::Ok(block_index))
            }
            Ok(TransferResult::Err(e)) => {
                warn!("Transfer on {} to {} rejected: {}", request.ledger_id, to, e);
                ContractResponse::failed(format!("Transfer failed: {}", e))
                    .with_transfer_result(TransferResult::Err(e))
            }
            Err(e) => {
                warn!("Transfer on {} to {} failed: {}", request.ledger_id, to, e);
                ContractResponse::failed(format!("Transfer failed: {}", e))
            }
        }
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub async fn get_contract(&self, lock_id: &str) -> Option<TimeLockContract> {
        let lock_id = parse_lock_id(lock_id).ok()?;
        self.contracts.read().await.get(&lock_id).cloned()
    }

    /// Every escrow with its hex lock id, ordered by lock id.
    pub async fn get_all_contracts(&self) -> Vec<(String, TimeLockContract)> {
        self.select(|_| true).await
    }

    /// Escrows neither claimed nor refunded.
    pub async fn get_active_contracts(&self) -> Vec<(String, TimeLockContract)> {
        self.select(TimeLockContract::is_active).await
    }

    /// Active escrows at or past their timelock (refundable now).
    pub async fn get_expired_contracts(&self) -> Vec<(String, TimeLockContract)> {
        let now = self.clock.now();
        self.select(|c| c.is_expired(now)).await
    }

    /// Resolved escrows whose payout awaits a retry.
    pub async fn get_pending_payouts(&self) -> Vec<(String, TimeLockContract)> {
        self.select(TimeLockContract::payout_pending).await
    }

    pub async fn get_contracts_by_sender(&self, sender: &str) -> Vec<(String, TimeLockContract)> {
        self.select(|c| c.sender == sender).await
    }

    pub async fn get_contracts_by_receiver(&self, receiver: &str) -> Vec<(String, TimeLockContract)> {
        self.select(|c| c.receiver == receiver).await
    }

    pub async fn get_contract_count(&self) -> usize {
        self.contracts.read().await.len()
    }

    pub fn get_current_time(&self) -> u64 {
        self.clock.now()
    }

    pub fn get_version(&self) -> &'static str {
        crate::VERSION
    }

    pub fn hash_preimage(&self, preimage: &str) -> String {
        crypto::hash_preimage(preimage)
    }

    pub fn verify_preimage_hash(&self, preimage: &str, hashlock: &str) -> bool {
        crypto::verify_preimage_hash(preimage, hashlock)
    }

    pub fn config(&self) -> &LedgerHtlcConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus<HtlcEvent> {
        &self.events
    }

    async fn select<F>(&self, keep: F) -> Vec<(String, TimeLockContract)>
    where
        F: Fn(&TimeLockContract) -> bool,
    {
        self.contracts
            .read()
            .await
            .iter()
            .filter(|(_, c)| keep(c))
            .map(|(id, c)| (id.to_hex(), c.clone()))
            .collect()
    }
}

//! In-memory token ledger
//!
//! Holds balances for any number of named ledgers and acts as a single custody
//! owner: transfers debit it, `transfer_from` spends allowances granted to it.
//! Failures can be scripted to exercise failed deposits and split-phase payouts.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

use super::client::{LedgerCallError, TokenLedger};
use super::types::{BlockIndex, NumTokens, TransferArg, TransferError, TransferFromArg, TransferResult};

/// A failure to inject into the next transfer or transfer_from call.
#[derive(Debug, Clone)]
pub enum ScriptedFailure {
    /// The call does not reach the ledger
    Call(LedgerCallError),
    /// The ledger processes and rejects the transfer
    Ledger(TransferError),
}

/// A transfer the ledger recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTransfer {
    pub ledger_id: String,
    pub block_index: BlockIndex,
    pub arg: TransferArg,
}

/// A `transfer_from` the ledger recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTransferFrom {
    pub ledger_id: String,
    pub block_index: BlockIndex,
    pub arg: TransferFromArg,
}

type AccountKey = (String, String);

#[derive(Debug, Default)]
struct MemoryState {
    /// (ledger_id, owner) -> balance
    balances: HashMap<AccountKey, NumTokens>,
    /// (ledger_id, owner) -> allowance granted to the custody owner
    allowances: HashMap<AccountKey, NumTokens>,
    next_block: BlockIndex,
    failures: VecDeque<ScriptedFailure>,
    transfers: Vec<RecordedTransfer>,
    transfers_from: Vec<RecordedTransferFrom>,
}

impl MemoryState {
    fn balance(&self, key: &AccountKey) -> NumTokens {
        self.balances.get(key).copied().unwrap_or(0)
    }

    /// Moves `amount` between two accounts; the caller has checked the balance.
    fn move_tokens(&mut self, from: AccountKey, to: AccountKey, amount: NumTokens) -> BlockIndex {
        let from_balance = self.balance(&from);
        self.balances.insert(from, from_balance - amount);
        let to_balance = self.balances.entry(to).or_insert(0);
        *to_balance = to_balance.saturating_add(amount);

        let block_index = self.next_block;
        self.next_block += 1;
        block_index
    }

    fn take_failure(&mut self) -> Option<Result<TransferResult, LedgerCallError>> {
        match self.failures.pop_front()? {
            ScriptedFailure::Call(e) => Some(Err(e)),
            ScriptedFailure::Ledger(e) => Some(Ok(TransferResult::Err(e))),
        }
    }
}

/// In-memory ledger whose transfers are made by `owner`.
#[derive(Debug)]
pub struct InMemoryTokenLedger {
    owner: String,
    state: Mutex<MemoryState>,
}

impl InMemoryTokenLedger {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Credits `amount` to `owner` on `ledger_id`.
    pub async fn mint(&self, ledger_id: &str, owner: &str, amount: NumTokens) {
        let mut state = self.state.lock().await;
        let balance = state
            .balances
            .entry((ledger_id.to_string(), owner.to_string()))
            .or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    pub async fn balance_of(&self, ledger_id: &str, owner: &str) -> NumTokens {
        let state = self.state.lock().await;
        state
            .balances
            .get(&(ledger_id.to_string(), owner.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Sets the allowance `owner` grants the custody owner on `ledger_id`
    /// (ICRC2 `approve`).
    pub async fn approve(&self, ledger_id: &str, owner: &str, allowance: NumTokens) {
        self.state
            .lock()
            .await
            .allowances
            .insert((ledger_id.to_string(), owner.to_string()), allowance);
    }

    pub async fn allowance_of(&self, ledger_id: &str, owner: &str) -> NumTokens {
        let state = self.state.lock().await;
        state
            .allowances
            .get(&(ledger_id.to_string(), owner.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Makes the next ledger call fail with `failure`. Calls queue up.
    pub async fn fail_next(&self, failure: ScriptedFailure) {
        self.state.lock().await.failures.push_back(failure);
    }

    /// Transfers out of custody recorded so far, oldest first.
    pub async fn transfers(&self) -> Vec<RecordedTransfer> {
        self.state.lock().await.transfers.clone()
    }

    /// Allowance spends recorded so far, oldest first.
    pub async fn transfers_from(&self) -> Vec<RecordedTransferFrom> {
        self.state.lock().await.transfers_from.clone()
    }
}

#[async_trait]
impl TokenLedger for InMemoryTokenLedger {
    async fn transfer(&self, ledger_id: &str, arg: TransferArg) -> Result<TransferResult, LedgerCallError> {
        let mut state = self.state.lock().await;
        if let Some(failure) = state.take_failure() {
            return failure;
        }

        let from = (ledger_id.to_string(), self.owner.clone());
        let balance = state.balance(&from);
        if balance < arg.amount {
            return Ok(TransferResult::Err(TransferError::InsufficientFunds { balance }));
        }
        let to = (ledger_id.to_string(), arg.to.owner.clone());
        let block_index = state.move_tokens(from, to, arg.amount);

        state.transfers.push(RecordedTransfer {
            ledger_id: ledger_id.to_string(),
            block_index,
            arg,
        });
        Ok(TransferResult::Ok(block_index))
    }

    async fn transfer_from(
        &self,
        ledger_id: &str,
        arg: TransferFromArg,
    ) -> Result<TransferResult, LedgerCallError> {
        let mut state = self.state.lock().await;
        if let Some(failure) = state.take_failure() {
            return failure;
        }

        let from = (ledger_id.to_string(), arg.from.owner.clone());
        let allowance = state.allowances.get(&from).copied().unwrap_or(0);
        if allowance < arg.amount {
            return Ok(TransferResult::Err(TransferError::InsufficientAllowance { allowance }));
        }
        let balance = state.balance(&from);
        if balance < arg.amount {
            return Ok(TransferResult::Err(TransferError::InsufficientFunds { balance }));
        }
        state.allowances.insert(from.clone(), allowance - arg.amount);
        let to = (ledger_id.to_string(), arg.to.owner.clone());
        let block_index = state.move_tokens(from, to, arg.amount);

        state.transfers_from.push(RecordedTransferFrom {
            ledger_id: ledger_id.to_string(),
            block_index,
            arg,
        });
        Ok(TransferResult::Ok(block_index))
    }
}

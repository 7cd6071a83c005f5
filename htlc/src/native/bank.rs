//! Native-asset ledger
//!
//! The host capability "move N units of value from A to B". On a chain this is
//! value attached to a call or sent with an outbound message; here it is an
//! explicit transfer against a [`NativeLedger`].

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::error::BankError;
use crate::types::{Address, Amount};

/// Balance store of the chain's base currency.
#[async_trait]
pub trait NativeLedger: Send + Sync {
    async fn balance_of(&self, account: &Address) -> Amount;

    /// Moves `amount` from `from` to `to`. Either both sides change or neither does.
    async fn transfer(&self, from: &Address, to: &Address, amount: Amount) -> Result<(), BankError>;
}

/// In-memory native ledger.
#[derive(Debug, Default)]
pub struct InMemoryBank {
    balances: RwLock<HashMap<Address, Amount>>,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits genesis funds to `account`.
    pub async fn fund(&self, account: Address, amount: Amount) -> Result<(), BankError> {
        let mut balances = self.balances.write().await;
        let balance = balances.entry(account).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(BankError::Overflow)?;
        Ok(())
    }

    /// Sum of all balances.
    pub async fn total_supply(&self) -> Amount {
        self.balances.read().await.values().sum()
    }
}

#[async_trait]
impl NativeLedger for InMemoryBank {
    async fn balance_of(&self, account: &Address) -> Amount {
        self.balances.read().await.get(account).copied().unwrap_or(0)
    }

    async fn transfer(&self, from: &Address, to: &Address, amount: Amount) -> Result<(), BankError> {
        let mut balances = self.balances.write().await;

        let from_balance = balances.get(from).copied().unwrap_or(0);
        if from_balance < amount {
            return Err(BankError::InsufficientFunds {
                account: *from,
                balance: from_balance,
                requested: amount,
            });
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        let to_balance = balances.get(to).copied().unwrap_or(0);
        let new_to_balance = to_balance.checked_add(amount).ok_or(BankError::Overflow)?;

        balances.insert(*from, from_balance - amount);
        balances.insert(*to, new_to_balance);

        debug!("Transferred {} from {} to {}", amount, from, to);
        Ok(())
    }
}

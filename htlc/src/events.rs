//! Event Module
//!
//! Events emitted by the vault and by the escrow coordinators. Consumers
//! (resolvers) either subscribe to a live stream or read the in-memory history.
//! Creation events carry the lock id, which is the on-chain way of learning a
//! derived id; the Rust API also returns it directly.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::{broadcast, RwLock};

use crate::types::{Address, Amount, LockId};

/// Default number of events kept in an [`EventBus`] history.
pub const DEFAULT_EVENT_HISTORY: usize = 1024;

// ============================================================================
// EVENT DATA STRUCTURES
// ============================================================================

/// Events emitted by the liquidity vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum VaultEvent {
    /// LP deposited `amount` and received `shares`
    Deposited { lp: Address, amount: Amount, shares: Amount },
    /// LP withdrew `amount`, burning `shares`
    Withdrawn { lp: Address, amount: Amount, shares: Amount },
    /// Funds earmarked for an escrow; `total` is the cumulative locked amount
    Locked { lock_id: LockId, total: Amount },
    /// Whole locked amount of an escrow sent to `destination`
    Sent { lock_id: LockId, destination: Address, amount: Amount },
}

/// Events emitted by the escrow coordinators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum HtlcEvent {
    TimeLockContractCreated { lock_id: LockId, amount: u128, timelock: u64 },
    /// Preimage revealed by the receiver (hex encoded on the wire)
    TimeLockContractClaimed {
        lock_id: LockId,
        #[serde(with = "hex_bytes")]
        preimage: Vec<u8>,
    },
    TimeLockContractRefunded { lock_id: LockId },
    /// Ledger-backed variant: payout transfer confirmed in `block_index`
    PayoutSettled { lock_id: LockId, block_index: u64 },
    /// Ledger-backed variant: payout transfer failed and can be retried
    PayoutFailed { lock_id: LockId, reason: String },
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// EVENT BUS
// ============================================================================

/// Fan-out of events to live subscribers plus a bounded history.
///
/// Emitting never fails: with no subscribers the event only lands in history.
pub struct EventBus<E: Clone> {
    sender: broadcast::Sender<E>,
    history: RwLock<VecDeque<E>>,
    capacity: usize,
}

impl<E: Clone> EventBus<E> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_HISTORY)
    }

    /// Creates a bus keeping at most `capacity` events in history.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            history: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub async fn emit(&self, event: E) {
        {
            let mut history = self.history.write().await;
            if self.capacity > 0 {
                if history.len() == self.capacity {
                    history.pop_front();
                }
                history.push_back(event.clone());
            }
        }
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    /// Live stream of events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    /// Snapshot of retained events, oldest first.
    pub async fn history(&self) -> Vec<E> {
        self.history.read().await.iter().cloned().collect()
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

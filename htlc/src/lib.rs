//! HTLC Escrow Library
//!
//! This crate implements a hashed time-locked escrow (HTLC) coupled to a pooled
//! liquidity vault. The protocol is realized twice:
//!
//! - [`native`]: escrows over the chain's base currency. Funds are forwarded into a
//!   [`native::LiquidityVault`] that custodies LP liquidity and earmarks escrow funds.
//! - [`ledger`]: escrows over an external token ledger, paid out through transfer
//!   requests against that ledger, with read-only indices for resolvers.
//!
//! Both variants share the lock-id derivation and preimage hashing in [`crypto`],
//! the time source in [`clock`] and the event types in [`events`].
//!
//! ## Security Model
//!
//! The vault trusts exactly one caller (the escrow coordinator) to lock and release
//! escrow funds. The coordinator's hashlock and timelock checks are therefore the
//! whole security perimeter for locked funds.

pub mod clock;
pub mod crypto;
pub mod events;
pub mod ledger;
pub mod native;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{EventBus, HtlcEvent, VaultEvent};
pub use types::{Address, Amount, Hash32, LockId, TypesError};

/// Default floor on how far in the future a native escrow's timelock must be (1 hour).
pub const DEFAULT_MIN_TIME_LOCK_DURATION: u64 = 3600;

/// Version string reported by the ledger-backed variant.
pub const VERSION: &str = "1.0.0";

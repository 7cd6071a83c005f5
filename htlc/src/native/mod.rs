//! Native-asset variant
//!
//! [`LiquidityVault`] (leaf) and [`HashedTimeLock`] (its sole authorized caller),
//! both settling against a [`NativeLedger`].

pub mod bank;
pub mod error;
pub mod htlc;
pub mod vault;

pub use bank::{InMemoryBank, NativeLedger};
pub use error::{BankError, HtlcError, VaultError};
pub use htlc::{Escrow, EscrowStatus, HashedTimeLock};
pub use vault::LiquidityVault;

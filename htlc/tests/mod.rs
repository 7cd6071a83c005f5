//! Test module organization
//!
//! This module re-exports test helpers for use in test files.

mod helpers;

#[allow(unused_imports)]
pub use helpers::{
    dummy_hashlock, new_contract_request, setup_ledger, setup_native, LedgerFixture, NativeFixture,
    DUMMY_CONTROLLER, DUMMY_COORDINATOR_ADDR, DUMMY_CUSTODY, DUMMY_CUSTODY_FUNDS, DUMMY_GENESIS_BALANCE,
    DUMMY_SENDER_FUNDS,
    DUMMY_LEDGER_ID, DUMMY_LP, DUMMY_LP_2, DUMMY_NOW, DUMMY_OWNER, DUMMY_RECEIVER,
    DUMMY_RECEIVER_PRINCIPAL, DUMMY_SECRET, DUMMY_SENDER, DUMMY_SENDER_PRINCIPAL, DUMMY_STRANGER,
    DUMMY_TIMELOCK, DUMMY_VAULT_ADDR,
};

//! Test module organization
//!
//! This module re-exports test helpers for use in test files.

mod helpers;

#[allow(unused_imports)]
pub use helpers::{
    build_test_config, build_test_config_with_ledger_url, create_test_api, new_contract_body,
    setup_mock_ledger, setup_mock_ledger_with_block, transfer_from_path, transfer_path, TestApi,
    DUMMY_CONTROLLER, DUMMY_CUSTODY, DUMMY_CUSTODY_FUNDS, DUMMY_LEDGER_ID, DUMMY_NOW, DUMMY_RECEIVER,
    DUMMY_SECRET, DUMMY_SENDER, DUMMY_SENDER_FUNDS, DUMMY_TIMELOCK,
};

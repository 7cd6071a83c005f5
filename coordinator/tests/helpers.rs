//! Shared test helpers for unit tests
//!
//! The module is organized into several categories:
//! - **Constants**: Dummy principals, ledgers and times
//! - **Configuration Builders**: Test configurations, with or without a mock ledger
//! - **API Builders**: An API server over an in-memory ledger and a manual clock
//! - **Mock Ledger Servers**: wiremock gateways answering transfer calls

#![allow(dead_code)]

use std::sync::Arc;

use htlc::ledger::{InMemoryTokenLedger, LedgerHtlc};
use htlc::{crypto, ManualClock, DEFAULT_MIN_TIME_LOCK_DURATION};
use htlc_coordinator::api::ApiServer;
use htlc_coordinator::config::{ApiConfig, Config, HtlcConfig, LedgerConfig};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Fixed starting time of the test clock
pub const DUMMY_NOW: u64 = 1_700_000_000;

/// Timelock accepted by the default configuration
pub const DUMMY_TIMELOCK: u64 = DUMMY_NOW + DEFAULT_MIN_TIME_LOCK_DURATION + 10;

/// Custody principal of the service
pub const DUMMY_CUSTODY: &str = "custody-principal";

/// Controller allowed to call POST /transfer
pub const DUMMY_CONTROLLER: &str = "controller-principal";

/// Escrow sender
pub const DUMMY_SENDER: &str = "sender-principal";

/// Escrow receiver
pub const DUMMY_RECEIVER: &str = "receiver-principal";

/// External ledger id
pub const DUMMY_LEDGER_ID: &str = "ckbtc-ledger";

/// Tokens already held in custody
pub const DUMMY_CUSTODY_FUNDS: u64 = 1_000;

/// Sender's ledger balance, all of it approved for the custody principal
pub const DUMMY_SENDER_FUNDS: u64 = 500;

/// Secret preimage of the default hashlock
pub const DUMMY_SECRET: &str = "secret";

// ============================================================================
// CONFIGURATION BUILDERS
// ============================================================================

/// Valid configuration pointing at a local ledger gateway.
pub fn build_test_config() -> Config {
    build_test_config_with_ledger_url("http://127.0.0.1:4943")
}

/// Valid configuration pointing at `url` (e.g. a wiremock server).
pub fn build_test_config_with_ledger_url(url: &str) -> Config {
    Config {
        htlc: HtlcConfig {
            custody_principal: DUMMY_CUSTODY.to_string(),
            min_time_lock_duration_secs: DEFAULT_MIN_TIME_LOCK_DURATION,
            controllers: vec![DUMMY_CONTROLLER.to_string()],
        },
        ledger: LedgerConfig {
            url: url.to_string(),
            timeout_ms: 2000,
        },
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 3340,
            cors_origins: vec!["*".to_string()],
        },
    }
}

// ============================================================================
// API BUILDERS
// ============================================================================

/// API server over an in-memory ledger with a funded, approving sender.
pub struct TestApi {
    pub server: ApiServer,
    pub htlc: Arc<LedgerHtlc>,
    pub ledger: Arc<InMemoryTokenLedger>,
    pub clock: Arc<ManualClock>,
}

pub async fn create_test_api() -> TestApi {
    let config = build_test_config();
    let ledger = Arc::new(InMemoryTokenLedger::new(DUMMY_CUSTODY));
    ledger.mint(DUMMY_LEDGER_ID, DUMMY_CUSTODY, DUMMY_CUSTODY_FUNDS).await;
    ledger.mint(DUMMY_LEDGER_ID, DUMMY_SENDER, DUMMY_SENDER_FUNDS).await;
    ledger.approve(DUMMY_LEDGER_ID, DUMMY_SENDER, DUMMY_SENDER_FUNDS).await;
    let clock = Arc::new(ManualClock::new(DUMMY_NOW));
    let htlc = Arc::new(LedgerHtlc::new(config.ledger_htlc_config(), ledger.clone(), clock.clone()));
    let server = ApiServer::new(config, htlc.clone());

    TestApi { server, htlc, ledger, clock }
}

/// JSON body of a valid `POST /contracts` request.
pub fn new_contract_body(amount: u64) -> serde_json::Value {
    json!({
        "receiver": DUMMY_RECEIVER,
        "amount": amount,
        "hashlock": crypto::hash_preimage(DUMMY_SECRET),
        "timelock": DUMMY_TIMELOCK,
        "ledger_id": DUMMY_LEDGER_ID,
    })
}

// ============================================================================
// MOCK LEDGER SERVERS
// ============================================================================

/// Path the client posts transfers on `ledger_id` to.
pub fn transfer_path(ledger_id: &str) -> String {
    format!("/ledgers/{}/icrc1_transfer", ledger_id)
}

/// Path the client posts allowance spends on `ledger_id` to.
pub fn transfer_from_path(ledger_id: &str) -> String {
    format!("/ledgers/{}/icrc2_transfer_from", ledger_id)
}

/// Gateway answering every transfer and transfer_from on `DUMMY_LEDGER_ID`
/// with `body` and `status`.
pub async fn setup_mock_ledger(status: u16, body: serde_json::Value) -> MockServer {
    let mock_server = MockServer::start().await;
    for endpoint in [transfer_path(DUMMY_LEDGER_ID), transfer_from_path(DUMMY_LEDGER_ID)] {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(status).set_body_json(body.clone()))
            .mount(&mock_server)
            .await;
    }
    mock_server
}

/// Gateway confirming every call in block `block_index`.
pub async fn setup_mock_ledger_with_block(block_index: u64) -> MockServer {
    setup_mock_ledger(200, json!({ "Ok": block_index })).await
}

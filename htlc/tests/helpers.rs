//! Shared test helpers for integration tests
//!
//! The module is organized into several categories:
//! - **Constants**: Dummy addresses, principals, ledgers and times
//! - **Native Fixtures**: A funded bank with a vault and an authorized coordinator
//! - **Ledger Fixtures**: A ledger-backed HTLC over an in-memory ledger with a funded, approving sender

#![allow(dead_code)]

use std::sync::Arc;

use htlc::ledger::{InMemoryTokenLedger, LedgerHtlc, LedgerHtlcConfig, NewContractRequest};
use htlc::native::{HashedTimeLock, InMemoryBank, LiquidityVault};
use htlc::{crypto, Address, Amount, Hash32, ManualClock, DEFAULT_MIN_TIME_LOCK_DURATION};

// ============================================================================
// CONSTANTS
// ============================================================================

// ------------------------------ TIME -------------------------------

/// Fixed starting time of every fixture clock
pub const DUMMY_NOW: u64 = 1_700_000_000;

/// Timelock used by the default escrows (min duration plus a margin)
pub const DUMMY_TIMELOCK: u64 = DUMMY_NOW + DEFAULT_MIN_TIME_LOCK_DURATION + 10;

// ----------------------------- NATIVE ------------------------------

/// Deployer of the vault
pub const DUMMY_OWNER: Address = Address::from_low_u8(0x01);

/// Vault custody address
pub const DUMMY_VAULT_ADDR: Address = Address::from_low_u8(0xa1);

/// Coordinator custody address
pub const DUMMY_COORDINATOR_ADDR: Address = Address::from_low_u8(0xa2);

/// Liquidity provider
pub const DUMMY_LP: Address = Address::from_low_u8(0x10);

/// Second liquidity provider
pub const DUMMY_LP_2: Address = Address::from_low_u8(0x13);

/// Escrow sender
pub const DUMMY_SENDER: Address = Address::from_low_u8(0x11);

/// Escrow receiver
pub const DUMMY_RECEIVER: Address = Address::from_low_u8(0x12);

/// Address with no role anywhere
pub const DUMMY_STRANGER: Address = Address::from_low_u8(0x66);

/// Genesis balance of every funded native account
pub const DUMMY_GENESIS_BALANCE: Amount = 100;

// ----------------------------- LEDGER ------------------------------

/// Custody principal of the ledger-backed HTLC
pub const DUMMY_CUSTODY: &str = "custody-principal";

/// Controller allowed to use the transfer primitive
pub const DUMMY_CONTROLLER: &str = "controller-principal";

/// Ledger-backed escrow sender
pub const DUMMY_SENDER_PRINCIPAL: &str = "sender-principal";

/// Ledger-backed escrow receiver
pub const DUMMY_RECEIVER_PRINCIPAL: &str = "receiver-principal";

/// External ledger id
pub const DUMMY_LEDGER_ID: &str = "ckbtc-ledger";

/// Tokens already held in custody for other escrows
pub const DUMMY_CUSTODY_FUNDS: u64 = 1_000;

/// Sender's ledger balance, all of it approved for the custody principal
pub const DUMMY_SENDER_FUNDS: u64 = 500;

/// Secret preimage of the default hashlock
pub const DUMMY_SECRET: &str = "secret";

// ============================================================================
// NATIVE FIXTURES
// ============================================================================

/// Vault and coordinator wired together over an in-memory bank.
pub struct NativeFixture {
    pub bank: Arc<InMemoryBank>,
    pub clock: Arc<ManualClock>,
    pub vault: Arc<LiquidityVault>,
    pub htlc: HashedTimeLock,
}

/// Builds a vault owned by `DUMMY_OWNER`, authorizes the coordinator and funds
/// the LPs and the sender with `DUMMY_GENESIS_BALANCE`.
pub async fn setup_native() -> NativeFixture {
    let bank = Arc::new(InMemoryBank::new());
    for account in [DUMMY_LP, DUMMY_LP_2, DUMMY_SENDER] {
        bank.fund(account, DUMMY_GENESIS_BALANCE).await.unwrap();
    }

    let clock = Arc::new(ManualClock::new(DUMMY_NOW));
    let vault = Arc::new(LiquidityVault::new(DUMMY_VAULT_ADDR, DUMMY_OWNER, bank.clone()));
    vault
        .authorize_coordinator(&DUMMY_OWNER, DUMMY_COORDINATOR_ADDR)
        .await
        .unwrap();

    let htlc = HashedTimeLock::new(
        DUMMY_COORDINATOR_ADDR,
        DEFAULT_MIN_TIME_LOCK_DURATION,
        vault.clone(),
        bank.clone(),
        clock.clone(),
    );

    NativeFixture { bank, clock, vault, htlc }
}

/// Hashlock of `DUMMY_SECRET`.
pub fn dummy_hashlock() -> Hash32 {
    crypto::sha256(DUMMY_SECRET.as_bytes())
}

// ============================================================================
// LEDGER FIXTURES
// ============================================================================

/// Ledger-backed HTLC over an in-memory ledger where custody already holds
/// funds and the sender has approved custody for its whole balance.
pub struct LedgerFixture {
    pub ledger: Arc<InMemoryTokenLedger>,
    pub clock: Arc<ManualClock>,
    pub htlc: LedgerHtlc,
}

pub async fn setup_ledger() -> LedgerFixture {
    let ledger = Arc::new(InMemoryTokenLedger::new(DUMMY_CUSTODY));
    ledger.mint(DUMMY_LEDGER_ID, DUMMY_CUSTODY, DUMMY_CUSTODY_FUNDS).await;
    ledger.mint(DUMMY_LEDGER_ID, DUMMY_SENDER_PRINCIPAL, DUMMY_SENDER_FUNDS).await;
    ledger.approve(DUMMY_LEDGER_ID, DUMMY_SENDER_PRINCIPAL, DUMMY_SENDER_FUNDS).await;

    let clock = Arc::new(ManualClock::new(DUMMY_NOW));
    let config = LedgerHtlcConfig {
        custody_principal: DUMMY_CUSTODY.to_string(),
        min_time_lock_duration: DEFAULT_MIN_TIME_LOCK_DURATION,
        controllers: vec![DUMMY_CONTROLLER.to_string()],
    };
    let htlc = LedgerHtlc::new(config, ledger.clone(), clock.clone());

    LedgerFixture { ledger, clock, htlc }
}

/// Valid request for an escrow of `amount` to `DUMMY_RECEIVER_PRINCIPAL`.
pub fn new_contract_request(amount: u64) -> NewContractRequest {
    NewContractRequest {
        receiver: DUMMY_RECEIVER_PRINCIPAL.to_string(),
        amount,
        hashlock: crypto::hash_preimage(DUMMY_SECRET),
        timelock: DUMMY_TIMELOCK,
        ledger_id: DUMMY_LEDGER_ID.to_string(),
    }
}

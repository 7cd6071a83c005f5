//! Integration tests for the ledger-backed HTLC
//!
//! These tests verify request validation, the deposit pulled into custody at
//! creation, claim/refund payouts through the token ledger, split-phase payout
//! recovery and the resolver query indices.

use htlc::ledger::{
    Account, ClaimRequest, ContractStatus, LedgerCallError, NewContractRequest, Payout, RefundRequest,
    ScriptedFailure, TransferError, TransferRequest, TransferResult,
};
use htlc::{crypto, HtlcEvent, VERSION};

#[path = "mod.rs"]
mod test_helpers;
use test_helpers::{
    new_contract_request, setup_ledger, LedgerFixture, DUMMY_CONTROLLER, DUMMY_CUSTODY, DUMMY_CUSTODY_FUNDS,
    DUMMY_LEDGER_ID, DUMMY_NOW, DUMMY_RECEIVER_PRINCIPAL, DUMMY_SECRET, DUMMY_SENDER_FUNDS,
    DUMMY_SENDER_PRINCIPAL, DUMMY_TIMELOCK,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Creates the default escrow of `amount` and returns its hex lock id.
async fn create_default_contract(fx: &LedgerFixture, amount: u64) -> String {
    let response = fx
        .htlc
        .new_contract(DUMMY_SENDER_PRINCIPAL, new_contract_request(amount))
        .await;
    assert!(response.success, "creation failed: {}", response.message);
    response.lock_id.unwrap()
}

fn claim_request(lock_id: &str, preimage: &str) -> ClaimRequest {
    ClaimRequest {
        lock_id: lock_id.to_string(),
        preimage: preimage.to_string(),
    }
}

fn refund_request(lock_id: &str) -> RefundRequest {
    RefundRequest { lock_id: lock_id.to_string() }
}

// ============================================================================
// CREATION TESTS
// ============================================================================

/// 1. Test: New contract pulls the deposit and is recorded under its derived lock id
/// Verifies the response envelope, the deposit into custody, the stored record
/// and the creation event.
/// Why: Resolvers learn the lock id from the response or the event.
#[tokio::test]
async fn test_new_contract_success() {
    let fx = setup_ledger().await;

    let response = fx
        .htlc
        .new_contract(DUMMY_SENDER_PRINCIPAL, new_contract_request(25))
        .await;

    assert!(response.success);
    assert_eq!(response.message, "Contract created successfully");
    let expected = crypto::ledger_lock_id(
        DUMMY_SENDER_PRINCIPAL,
        DUMMY_RECEIVER_PRINCIPAL,
        25,
        &crypto::sha256(DUMMY_SECRET.as_bytes()),
        DUMMY_TIMELOCK,
        DUMMY_LEDGER_ID,
    );
    assert_eq!(response.lock_id.as_deref(), Some(expected.to_hex().as_str()));

    let contract = response.contract.unwrap();
    assert_eq!(contract.status, ContractStatus::Active);
    assert_eq!(contract.sender, DUMMY_SENDER_PRINCIPAL);
    assert_eq!(contract.payout, None);
    assert_eq!(fx.htlc.get_contract_count().await, 1);
    assert_eq!(
        fx.htlc.events().history().await,
        vec![HtlcEvent::TimeLockContractCreated { lock_id: expected, amount: 25, timelock: DUMMY_TIMELOCK }]
    );

    assert_eq!(response.transfer_result, Some(TransferResult::Ok(0)));
    assert_eq!(fx.ledger.balance_of(DUMMY_LEDGER_ID, DUMMY_SENDER_PRINCIPAL).await, DUMMY_SENDER_FUNDS - 25);
    assert_eq!(fx.ledger.balance_of(DUMMY_LEDGER_ID, DUMMY_CUSTODY).await, DUMMY_CUSTODY_FUNDS + 25);
    let deposits = fx.ledger.transfers_from().await;
    assert_eq!(deposits.len(), 1);
    assert_eq!(deposits[0].arg.from.owner, DUMMY_SENDER_PRINCIPAL);
    assert_eq!(deposits[0].arg.to.owner, DUMMY_CUSTODY);
    assert_eq!(deposits[0].arg.memo.as_deref(), Some(&expected.as_bytes()[..]));
    assert!(fx.ledger.transfers().await.is_empty());
}

/// 2. Test: Invalid requests are rejected with descriptive messages
/// Why: The message is the only error channel of the response envelope.
#[tokio::test]
async fn test_new_contract_validation_messages() {
    let fx = setup_ledger().await;
    let cases = [
        ({ let mut r = new_contract_request(1); r.receiver = "  ".into(); r }, "Receiver cannot be empty"),
        (new_contract_request(0), "Amount must be greater than 0"),
        ({ let mut r = new_contract_request(1); r.hashlock = String::new(); r }, "Hashlock cannot be empty"),
        (
            { let mut r = new_contract_request(1); r.hashlock = "abc".into(); r },
            "Hashlock must be a valid SHA-256 hash (64 characters)",
        ),
        ({ let mut r = new_contract_request(1); r.ledger_id = String::new(); r }, "Ledger id cannot be empty"),
        (
            { let mut r = new_contract_request(1); r.ledger_id = "../admin/drain?".into(); r },
            "Ledger id may only contain letters, digits, '-' and '_'",
        ),
        ({ let mut r = new_contract_request(1); r.timelock = DUMMY_NOW; r }, "Timelock must be in the future"),
        (
            { let mut r = new_contract_request(1); r.timelock = DUMMY_NOW + 60; r },
            "Timelock must be at least 3600 seconds in the future",
        ),
    ];

    for (request, message) in cases {
        let response = fx.htlc.new_contract(DUMMY_SENDER_PRINCIPAL, request).await;
        assert!(!response.success);
        assert_eq!(response.message, message);
        assert_eq!(response.lock_id, None);
    }
    assert_eq!(fx.htlc.get_contract_count().await, 0);
    assert!(fx.ledger.transfers_from().await.is_empty());
}

/// 3. Test: Identical requests from the same sender are rejected
/// Why: Duplicate tuples would double a commitment.
#[tokio::test]
async fn test_new_contract_duplicate() {
    let fx = setup_ledger().await;
    create_default_contract(&fx, 5).await;

    let response = fx
        .htlc
        .new_contract(DUMMY_SENDER_PRINCIPAL, new_contract_request(5))
        .await;

    assert!(!response.success);
    assert_eq!(response.message, "Contract already exists");
    assert_eq!(fx.htlc.get_contract_count().await, 1);
    assert_eq!(fx.ledger.transfers_from().await.len(), 1);
    assert_eq!(fx.ledger.balance_of(DUMMY_LEDGER_ID, DUMMY_SENDER_PRINCIPAL).await, DUMMY_SENDER_FUNDS - 5);
}

/// 4. Test: Creation without an allowance is rejected and custody is untouched
/// Verifies that a caller who never funded an escrow to themselves gets no
/// contract, and that claiming it with their own secret finds nothing to pay.
/// Why: Custody holds other escrows' deposits; an unfunded escrow must never draw on them.
#[tokio::test]
async fn test_new_contract_without_deposit_rejected() {
    let fx = setup_ledger().await;
    let request = NewContractRequest {
        receiver: "mallory".to_string(),
        amount: DUMMY_CUSTODY_FUNDS,
        hashlock: crypto::hash_preimage("mine"),
        timelock: DUMMY_TIMELOCK,
        ledger_id: DUMMY_LEDGER_ID.to_string(),
    };
    let lock_id = crypto::ledger_lock_id(
        "mallory",
        "mallory",
        DUMMY_CUSTODY_FUNDS,
        &crypto::sha256(b"mine"),
        DUMMY_TIMELOCK,
        DUMMY_LEDGER_ID,
    )
    .to_hex();

    let response = fx.htlc.new_contract("mallory", request).await;

    assert!(!response.success);
    assert_eq!(response.message, "Deposit failed: Insufficient allowance, allowance 0");
    assert_eq!(
        response.transfer_result,
        Some(TransferResult::Err(TransferError::InsufficientAllowance { allowance: 0 }))
    );
    assert_eq!(response.lock_id, None);
    assert_eq!(fx.htlc.get_contract_count().await, 0);
    assert!(fx.htlc.events().history().await.is_empty());

    let claim = fx.htlc.claim("mallory", claim_request(&lock_id, "mine")).await;
    assert!(!claim.success);
    assert_eq!(claim.message, "Contract not found");
    assert_eq!(fx.ledger.balance_of(DUMMY_LEDGER_ID, DUMMY_CUSTODY).await, DUMMY_CUSTODY_FUNDS);
    assert_eq!(fx.ledger.balance_of(DUMMY_LEDGER_ID, "mallory").await, 0);
    assert!(fx.ledger.transfers().await.is_empty());
}

/// 5. Test: Creation above the sender's balance is rejected
/// Why: An allowance alone does not fund an escrow.
#[tokio::test]
async fn test_new_contract_insufficient_balance() {
    let fx = setup_ledger().await;
    fx.ledger
        .approve(DUMMY_LEDGER_ID, DUMMY_SENDER_PRINCIPAL, DUMMY_SENDER_FUNDS * 2)
        .await;

    let response = fx
        .htlc
        .new_contract(DUMMY_SENDER_PRINCIPAL, new_contract_request(DUMMY_SENDER_FUNDS + 1))
        .await;

    assert!(!response.success);
    assert_eq!(
        response.transfer_result,
        Some(TransferResult::Err(TransferError::InsufficientFunds { balance: DUMMY_SENDER_FUNDS }))
    );
    assert_eq!(fx.htlc.get_contract_count().await, 0);
    assert_eq!(fx.ledger.balance_of(DUMMY_LEDGER_ID, DUMMY_CUSTODY).await, DUMMY_CUSTODY_FUNDS);
}

/// 6. Test: Unreachable ledger during the deposit stores nothing
/// Verifies the failure message and that the same request succeeds once the
/// ledger is back.
/// Why: A failed deposit must release the lock id for a later attempt.
#[tokio::test]
async fn test_new_contract_deposit_unreachable() {
    let fx = setup_ledger().await;
    fx.ledger
        .fail_next(ScriptedFailure::Call(LedgerCallError::Unreachable("connection refused".into())))
        .await;

    let failed = fx
        .htlc
        .new_contract(DUMMY_SENDER_PRINCIPAL, new_contract_request(25))
        .await;

    assert!(!failed.success);
    assert_eq!(failed.message, "Deposit failed: Ledger unreachable: connection refused");
    assert_eq!(failed.transfer_result, None);
    assert_eq!(fx.htlc.get_contract_count().await, 0);

    create_default_contract(&fx, 25).await;
    assert_eq!(fx.htlc.get_contract_count().await, 1);
}

// ============================================================================
// CLAIM / REFUND TESTS
// ============================================================================

/// 7. Test: Claim pays the receiver through the ledger
/// Verifies the transfer, block index, payout state and events.
/// Why: Claim resolves the escrow and settles it in one call when the ledger is healthy.
#[tokio::test]
async fn test_claim_pays_receiver() {
    let fx = setup_ledger().await;
    let lock_id = create_default_contract(&fx, 25).await;

    let response = fx
        .htlc
        .claim(DUMMY_RECEIVER_PRINCIPAL, claim_request(&lock_id, DUMMY_SECRET))
        .await;

    assert!(response.success, "{}", response.message);
    assert_eq!(response.message, "Claim successful");
    // Block 0 is the deposit
    assert_eq!(response.transfer_result, Some(TransferResult::Ok(1)));
    let contract = response.contract.unwrap();
    assert!(contract.withdrawn());
    assert_eq!(contract.preimage.as_deref(), Some(DUMMY_SECRET));
    assert_eq!(contract.payout, Some(Payout::Paid { block_index: 1 }));

    assert_eq!(fx.ledger.balance_of(DUMMY_LEDGER_ID, DUMMY_RECEIVER_PRINCIPAL).await, 25);
    assert_eq!(fx.ledger.balance_of(DUMMY_LEDGER_ID, DUMMY_CUSTODY).await, DUMMY_CUSTODY_FUNDS);

    let history = fx.htlc.events().history().await;
    assert!(matches!(history[1], HtlcEvent::TimeLockContractClaimed { .. }));
    assert!(matches!(history[2], HtlcEvent::PayoutSettled { block_index: 1, .. }));
}

/// 8. Test: Claim guards report descriptive messages
/// Verifies not found (including malformed ids), wrong caller and wrong preimage.
/// Why: Failed claims leave the escrow active.
#[tokio::test]
async fn test_claim_guards() {
    let fx = setup_ledger().await;
    let lock_id = create_default_contract(&fx, 25).await;
    let missing = crypto::hash_preimage("missing");

    let cases = [
        (DUMMY_RECEIVER_PRINCIPAL, claim_request(&missing, DUMMY_SECRET), "Contract not found"),
        (DUMMY_RECEIVER_PRINCIPAL, claim_request("not-a-lock-id", DUMMY_SECRET), "Contract not found"),
        (DUMMY_SENDER_PRINCIPAL, claim_request(&lock_id, DUMMY_SECRET), "Only receiver can claim"),
        (DUMMY_RECEIVER_PRINCIPAL, claim_request(&lock_id, "guess"), "Invalid preimage"),
    ];
    for (caller, request, message) in cases {
        let response = fx.htlc.claim(caller, request).await;
        assert!(!response.success);
        assert_eq!(response.message, message);
    }

    assert!(fx.htlc.get_contract(&lock_id).await.unwrap().is_active());
    assert!(fx.ledger.transfers().await.is_empty());
}

/// 9. Test: Refund pays the sender only after the timelock
/// Verifies the early refund message, the payout and the terminal state.
/// Why: Refund is the sender's recovery path after expiry.
#[tokio::test]
async fn test_refund_after_timelock() {
    let fx = setup_ledger().await;
    let lock_id = create_default_contract(&fx, 25).await;

    let early = fx.htlc.refund(DUMMY_SENDER_PRINCIPAL, refund_request(&lock_id)).await;
    assert!(!early.success);
    assert_eq!(early.message, "Timelock has not expired yet");

    let wrong_caller = fx.htlc.refund(DUMMY_RECEIVER_PRINCIPAL, refund_request(&lock_id)).await;
    assert_eq!(wrong_caller.message, "Only sender can refund");

    fx.clock.set(DUMMY_TIMELOCK);
    let response = fx.htlc.refund(DUMMY_SENDER_PRINCIPAL, refund_request(&lock_id)).await;

    assert!(response.success, "{}", response.message);
    assert_eq!(response.message, "Refund successful");
    assert!(response.contract.unwrap().refunded());
    assert_eq!(fx.ledger.balance_of(DUMMY_LEDGER_ID, DUMMY_SENDER_PRINCIPAL).await, DUMMY_SENDER_FUNDS);

    let again = fx.htlc.refund(DUMMY_SENDER_PRINCIPAL, refund_request(&lock_id)).await;
    assert_eq!(again.message, "Already refunded");
    let claim = fx
        .htlc
        .claim(DUMMY_RECEIVER_PRINCIPAL, claim_request(&lock_id, DUMMY_SECRET))
        .await;
    assert_eq!(claim.message, "Already withdrawn");
}

/// 10. Test: Refund after a claim reports AlreadyWithdrawn
/// Why: Claim takes precedence once it has happened.
#[tokio::test]
async fn test_refund_after_claim() {
    let fx = setup_ledger().await;
    let lock_id = create_default_contract(&fx, 25).await;
    fx.htlc
        .claim(DUMMY_RECEIVER_PRINCIPAL, claim_request(&lock_id, DUMMY_SECRET))
        .await;
    fx.clock.set(DUMMY_TIMELOCK);

    let response = fx.htlc.refund(DUMMY_SENDER_PRINCIPAL, refund_request(&lock_id)).await;

    assert!(!response.success);
    assert_eq!(response.message, "Already withdrawn");
    assert_eq!(fx.ledger.transfers().await.len(), 1);
}

// ============================================================================
// SPLIT-PHASE PAYOUT TESTS
// ============================================================================

/// 11. Test: Unreachable ledger leaves a resolved escrow with a pending payout
/// Verifies success:false with the resolved contract, the pending index, a
/// successful retry, and that nothing is paid twice.
/// Why: Local resolution and the external transfer are not atomic.
#[tokio::test]
async fn test_claim_with_unreachable_ledger_then_retry() {
    let fx = setup_ledger().await;
    let lock_id = create_default_contract(&fx, 25).await;
    fx.ledger
        .fail_next(ScriptedFailure::Call(LedgerCallError::Unreachable("connection refused".into())))
        .await;

    let response = fx
        .htlc
        .claim(DUMMY_RECEIVER_PRINCIPAL, claim_request(&lock_id, DUMMY_SECRET))
        .await;

    assert!(!response.success);
    assert!(response.message.starts_with("Transfer failed"));
    assert_eq!(response.lock_id.as_deref(), Some(lock_id.as_str()));
    assert_eq!(response.transfer_result, None);
    let contract = response.contract.unwrap();
    assert!(contract.withdrawn());
    assert!(matches!(contract.payout, Some(Payout::Pending { attempts: 1, .. })));
    assert_eq!(fx.htlc.get_pending_payouts().await.len(), 1);

    // The escrow is resolved: a second claim cannot trigger another payout
    let again = fx
        .htlc
        .claim(DUMMY_RECEIVER_PRINCIPAL, claim_request(&lock_id, DUMMY_SECRET))
        .await;
    assert_eq!(again.message, "Already withdrawn");

    let retried = fx.htlc.retry_payout(&lock_id).await;
    assert!(retried.success, "{}", retried.message);
    assert_eq!(retried.transfer_result, Some(TransferResult::Ok(1)));
    assert_eq!(retried.contract.unwrap().payout, Some(Payout::Paid { block_index: 1 }));
    assert!(fx.htlc.get_pending_payouts().await.is_empty());

    let twice = fx.htlc.retry_payout(&lock_id).await;
    assert!(!twice.success);
    assert_eq!(twice.message, "No pending payout for this contract");
    assert_eq!(fx.ledger.transfers().await.len(), 1);
    assert_eq!(fx.ledger.balance_of(DUMMY_LEDGER_ID, DUMMY_RECEIVER_PRINCIPAL).await, 25);
}

/// 12. Test: Ledger rejection is reported with its transfer result
/// Verifies the TransferResult::Err in the envelope, the PayoutFailed event and
/// the attempt counter across retries.
/// Why: Ledger-level rejections are retryable once the ledger recovers.
#[tokio::test]
async fn test_refund_with_ledger_rejection() {
    let fx = setup_ledger().await;
    let lock_id = create_default_contract(&fx, 25).await;
    fx.clock.set(DUMMY_TIMELOCK);
    fx.ledger
        .fail_next(ScriptedFailure::Ledger(TransferError::TemporarilyUnavailable))
        .await;
    fx.ledger
        .fail_next(ScriptedFailure::Ledger(TransferError::TemporarilyUnavailable))
        .await;

    let response = fx.htlc.refund(DUMMY_SENDER_PRINCIPAL, refund_request(&lock_id)).await;

    assert!(!response.success);
    assert_eq!(
        response.transfer_result,
        Some(TransferResult::Err(TransferError::TemporarilyUnavailable))
    );
    assert!(matches!(
        fx.htlc.events().history().await.last(),
        Some(HtlcEvent::PayoutFailed { .. })
    ));

    let second = fx.htlc.retry_payout(&lock_id).await;
    assert!(!second.success);
    assert!(matches!(second.contract.unwrap().payout, Some(Payout::Pending { attempts: 2, .. })));

    let third = fx.htlc.retry_payout(&lock_id).await;
    assert!(third.success);
    assert_eq!(fx.ledger.balance_of(DUMMY_LEDGER_ID, DUMMY_SENDER_PRINCIPAL).await, DUMMY_SENDER_FUNDS);
}

/// 13. Test: Retry on an active or unknown escrow is rejected
/// Why: Only resolved escrows with a failed payout can be retried.
#[tokio::test]
async fn test_retry_payout_requires_pending() {
    let fx = setup_ledger().await;
    let lock_id = create_default_contract(&fx, 25).await;

    assert_eq!(fx.htlc.retry_payout(&lock_id).await.message, "No pending payout for this contract");
    assert_eq!(
        fx.htlc.retry_payout(&crypto::hash_preimage("missing")).await.message,
        "Contract not found"
    );
}

// ============================================================================
// TRANSFER PRIMITIVE TESTS
// ============================================================================

/// 14. Test: Only controllers can transfer out of custody
/// Verifies the rejection for a non-controller and a successful controller transfer.
/// Why: The primitive moves arbitrary custody funds.
#[tokio::test]
async fn test_transfer_restricted_to_controllers() {
    let fx = setup_ledger().await;
    let request = TransferRequest {
        ledger_id: DUMMY_LEDGER_ID.to_string(),
        to: Account::new("treasury"),
        amount: 40,
        memo: Some(b"rebalance".to_vec()),
    };

    let denied = fx.htlc.transfer(DUMMY_SENDER_PRINCIPAL, request.clone()).await;
    assert!(!denied.success);
    assert_eq!(denied.message, "Caller is not a controller");

    let bad_ledger = TransferRequest {
        ledger_id: "ckbtc/../admin".to_string(),
        ..request.clone()
    };
    let rejected = fx.htlc.transfer(DUMMY_CONTROLLER, bad_ledger).await;
    assert_eq!(rejected.message, "Ledger id may only contain letters, digits, '-' and '_'");

    let allowed = fx.htlc.transfer(DUMMY_CONTROLLER, request).await;
    assert!(allowed.success);
    assert_eq!(allowed.transfer_result, Some(TransferResult::Ok(0)));
    assert_eq!(fx.ledger.balance_of(DUMMY_LEDGER_ID, "treasury").await, 40);
    assert_eq!(fx.ledger.transfers().await[0].arg.memo.as_deref(), Some(&b"rebalance"[..]));
}

// ============================================================================
// QUERY TESTS
// ============================================================================

/// 15. Test: Resolver indices track status and expiry
/// Verifies active, expired, by-sender and by-receiver listings as escrows
/// age and resolve.
/// Why: Resolvers discover actionable escrows through these indices.
#[tokio::test]
async fn test_query_indices() {
    let fx = setup_ledger().await;
    let first = create_default_contract(&fx, 10).await;
    let second = create_default_contract(&fx, 20).await;

    assert_eq!(fx.htlc.get_active_contracts().await.len(), 2);
    assert!(fx.htlc.get_expired_contracts().await.is_empty());
    assert_eq!(fx.htlc.get_contracts_by_sender(DUMMY_SENDER_PRINCIPAL).await.len(), 2);
    assert_eq!(fx.htlc.get_contracts_by_receiver(DUMMY_RECEIVER_PRINCIPAL).await.len(), 2);
    assert!(fx.htlc.get_contracts_by_receiver(DUMMY_SENDER_PRINCIPAL).await.is_empty());

    fx.htlc
        .claim(DUMMY_RECEIVER_PRINCIPAL, claim_request(&first, DUMMY_SECRET))
        .await;
    fx.clock.set(DUMMY_TIMELOCK);

    let active = fx.htlc.get_active_contracts().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].0, second);
    let expired = fx.htlc.get_expired_contracts().await;
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].0, second);
    assert_eq!(fx.htlc.get_all_contracts().await.len(), 2);
    assert_eq!(fx.htlc.get_contract_count().await, 2);
}

/// 16. Test: Utility queries
/// Verifies version, time and the preimage hashing helpers.
/// Why: Resolvers use these to prepare and check secrets off-chain.
#[tokio::test]
async fn test_utility_queries() {
    let fx = setup_ledger().await;

    assert_eq!(fx.htlc.get_version(), VERSION);
    assert_eq!(fx.htlc.get_current_time(), DUMMY_NOW);
    let digest = fx.htlc.hash_preimage(DUMMY_SECRET);
    assert_eq!(digest, crypto::sha256(DUMMY_SECRET.as_bytes()).to_hex());
    assert!(fx.htlc.verify_preimage_hash(DUMMY_SECRET, &digest));
    assert!(!fx.htlc.verify_preimage_hash("other", &digest));
}

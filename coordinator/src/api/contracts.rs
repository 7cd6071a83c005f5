//! Escrow contract endpoints
//!
//! Mutations (`POST /contracts`, `/claim`, `/refund`, `/transfer`,
//! `/payouts/{lock_id}/retry`) answer with the escrow core's
//! [`ContractResponse`] envelope, always with HTTP 200; `success` tells the
//! outcome. Queries answer with [`ApiResponse`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use warp::{http::StatusCode, Filter, Rejection, Reply};

use htlc::ledger::{
    ClaimRequest, LedgerHtlc, NewContractRequest, RefundRequest, TimeLockContract, TransferRequest,
};

use super::generic::{json_body, with_caller, with_htlc, ApiResponse};

/// A contract together with its hex lock id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractEntry {
    pub lock_id: String,
    pub contract: TimeLockContract,
}

fn entries(list: Vec<(String, TimeLockContract)>) -> Vec<ContractEntry> {
    list.into_iter()
        .map(|(lock_id, contract)| ContractEntry { lock_id, contract })
        .collect()
}

// ============================================================================
// MUTATION HANDLERS
// ============================================================================

pub async fn new_contract_handler(
    caller: String,
    request: NewContractRequest,
    htlc: Arc<LedgerHtlc>,
) -> Result<impl Reply, Rejection> {
    info!("POST /contracts from {}", caller);
    Ok(warp::reply::json(&htlc.new_contract(&caller, request).await))
}

pub async fn claim_handler(
    caller: String,
    request: ClaimRequest,
    htlc: Arc<LedgerHtlc>,
) -> Result<impl Reply, Rejection> {
    info!("POST /claim {} from {}", request.lock_id, caller);
    Ok(warp::reply::json(&htlc.claim(&caller, request).await))
}

pub async fn refund_handler(
    caller: String,
    request: RefundRequest,
    htlc: Arc<LedgerHtlc>,
) -> Result<impl Reply, Rejection> {
    info!("POST /refund {} from {}", request.lock_id, caller);
    Ok(warp::reply::json(&htlc.refund(&caller, request).await))
}

pub async fn transfer_handler(
    caller: String,
    request: TransferRequest,
    htlc: Arc<LedgerHtlc>,
) -> Result<impl Reply, Rejection> {
    info!("POST /transfer on {} from {}", request.ledger_id, caller);
    Ok(warp::reply::json(&htlc.transfer(&caller, request).await))
}

/// Retries a pending payout. Open to any caller.
pub async fn retry_payout_handler(lock_id: String, htlc: Arc<LedgerHtlc>) -> Result<impl Reply, Rejection> {
    info!("POST /payouts/{}/retry", lock_id);
    Ok(warp::reply::json(&htlc.retry_payout(&lock_id).await))
}

// ============================================================================
// QUERY HANDLERS
// ============================================================================

pub async fn get_contract_handler(lock_id: String, htlc: Arc<LedgerHtlc>) -> Result<impl Reply, Rejection> {
    let reply = match htlc.get_contract(&lock_id).await {
        Some(contract) => warp::reply::with_status(warp::reply::json(&ApiResponse::ok(contract)), StatusCode::OK),
        None => warp::reply::with_status(
            warp::reply::json(&ApiResponse::<()>::error("Contract not found")),
            StatusCode::NOT_FOUND,
        ),
    };
    Ok(reply)
}

pub async fn get_all_contracts_handler(htlc: Arc<LedgerHtlc>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(entries(htlc.get_all_contracts().await))))
}

pub async fn get_active_contracts_handler(htlc: Arc<LedgerHtlc>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(entries(htlc.get_active_contracts().await))))
}

pub async fn get_expired_contracts_handler(htlc: Arc<LedgerHtlc>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(entries(htlc.get_expired_contracts().await))))
}

pub async fn get_pending_payouts_handler(htlc: Arc<LedgerHtlc>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(entries(htlc.get_pending_payouts().await))))
}

pub async fn get_contract_count_handler(htlc: Arc<LedgerHtlc>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(htlc.get_contract_count().await)))
}

pub async fn get_contracts_by_sender_handler(
    sender: String,
    htlc: Arc<LedgerHtlc>,
) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(entries(
        htlc.get_contracts_by_sender(&sender).await,
    ))))
}

pub async fn get_contracts_by_receiver_handler(
    receiver: String,
    htlc: Arc<LedgerHtlc>,
) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(entries(
        htlc.get_contracts_by_receiver(&receiver).await,
    ))))
}

// ============================================================================
// ROUTES
// ============================================================================

/// Contract routes. Fixed segments are matched before `/contracts/{lock_id}`.
pub fn routes(htlc: Arc<LedgerHtlc>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let create = warp::path("contracts")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_caller())
        .and(json_body::<NewContractRequest>())
        .and(with_htlc(htlc.clone()))
        .and_then(new_contract_handler);

    let claim = warp::path("claim")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_caller())
        .and(json_body::<ClaimRequest>())
        .and(with_htlc(htlc.clone()))
        .and_then(claim_handler);

    let refund = warp::path("refund")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_caller())
        .and(json_body::<RefundRequest>())
        .and(with_htlc(htlc.clone()))
        .and_then(refund_handler);

    let transfer = warp::path("transfer")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_caller())
        .and(json_body::<TransferRequest>())
        .and(with_htlc(htlc.clone()))
        .and_then(transfer_handler);

    let retry = warp::path("payouts")
        .and(warp::path::param::<String>())
        .and(warp::path("retry"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_htlc(htlc.clone()))
        .and_then(retry_payout_handler);

    let all = warp::path("contracts")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_htlc(htlc.clone()))
        .and_then(get_all_contracts_handler);

    let active = warp::path!("contracts" / "active")
        .and(warp::get())
        .and(with_htlc(htlc.clone()))
        .and_then(get_active_contracts_handler);

    let expired = warp::path!("contracts" / "expired")
        .and(warp::get())
        .and(with_htlc(htlc.clone()))
        .and_then(get_expired_contracts_handler);

    let pending = warp::path!("contracts" / "pending")
        .and(warp::get())
        .and(with_htlc(htlc.clone()))
        .and_then(get_pending_payouts_handler);

    let count = warp::path!("contracts" / "count")
        .and(warp::get())
        .and(with_htlc(htlc.clone()))
        .and_then(get_contract_count_handler);

    let by_sender = warp::path!("contracts" / "sender" / String)
        .and(warp::get())
        .and(with_htlc(htlc.clone()))
        .and_then(get_contracts_by_sender_handler);

    let by_receiver = warp::path!("contracts" / "receiver" / String)
        .and(warp::get())
        .and(with_htlc(htlc.clone()))
        .and_then(get_contracts_by_receiver_handler);

    let single = warp::path!("contracts" / String)
        .and(warp::get())
        .and(with_htlc(htlc))
        .and_then(get_contract_handler);

    create
        .or(claim)
        .or(refund)
        .or(transfer)
        .or(retry)
        .or(all)
        .or(active)
        .or(expired)
        .or(pending)
        .or(count)
        .or(by_sender)
        .or(by_receiver)
        .or(single)
}

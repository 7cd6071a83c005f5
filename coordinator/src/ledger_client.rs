//! Token Ledger HTTP Client Module
//!
//! This module provides a [`TokenLedger`] over an HTTP gateway in front of the
//! external ICRC1/ICRC2-style ledgers. Each call is a single POST made as the
//! custody principal:
//!
//! ```text
//! POST {url}/ledgers/{ledger_id}/icrc1_transfer        {TransferArg as JSON}
//! POST {url}/ledgers/{ledger_id}/icrc2_transfer_from   {TransferFromArg as JSON}
//! x-caller: {custody_principal}
//! ```
//!
//! answered with `{"Ok": <block index>}` or `{"Err": <TransferError>}`.
//! The ledger id is always a single percent-encoded path segment.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use htlc::ledger::{LedgerCallError, TokenLedger, TransferArg, TransferFromArg, TransferResult};

/// Header carrying the identity the gateway acts for.
pub const CALLER_HEADER: &str = "x-caller";

const TRANSFER_METHOD: &str = "icrc1_transfer";
const TRANSFER_FROM_METHOD: &str = "icrc2_transfer_from";

// ============================================================================
// CLIENT
// ============================================================================

pub struct HttpTokenLedger {
    client: Client,
    base_url: Url,
    custody_principal: String,
}

impl HttpTokenLedger {
    /// Creates a client for the gateway at `base_url`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Gateway base URL (http or https; trailing slash is ignored)
    /// * `custody_principal` - Principal whose custody account the calls act for
    /// * `timeout_ms` - Per-request timeout
    pub fn new(base_url: &str, custody_principal: &str, timeout_ms: u64) -> Result<Self> {
        let base_url = Url::parse(base_url).with_context(|| format!("Invalid ledger gateway URL '{}'", base_url))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            anyhow::bail!("Ledger gateway URL must be http(s), got '{}'", base_url);
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            custody_principal: custody_principal.to_string(),
        })
    }

    /// `{base}/ledgers/{ledger_id}/{method}` with `ledger_id` encoded as one segment.
    pub fn endpoint_url(&self, ledger_id: &str, method: &str) -> Result<Url, LedgerCallError> {
        // Dot segments are dropped by the URL builder rather than encoded
        if ledger_id.is_empty() || ledger_id == "." || ledger_id == ".." {
            return Err(LedgerCallError::InvalidLedgerId(ledger_id.to_string()));
        }

        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|_| LedgerCallError::InvalidLedgerId(ledger_id.to_string()))?
            .pop_if_empty()
            .extend(["ledgers", ledger_id, method]);
        Ok(url)
    }

    async fn post<T: Serialize + Sync>(
        &self,
        ledger_id: &str,
        method: &str,
        arg: &T,
    ) -> Result<TransferResult, LedgerCallError> {
        let url = self.endpoint_url(ledger_id, method)?;

        let response = self
            .client
            .post(url)
            .header(CALLER_HEADER, &self.custody_principal)
            .json(arg)
            .send()
            .await
            .map_err(|e| LedgerCallError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerCallError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LedgerCallError::Unreachable(e.to_string()))?;
        serde_json::from_slice::<TransferResult>(&body)
            .map_err(|e| LedgerCallError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl TokenLedger for HttpTokenLedger {
    async fn transfer(&self, ledger_id: &str, arg: TransferArg) -> Result<TransferResult, LedgerCallError> {
        debug!("{} on {} amount={} to={}", TRANSFER_METHOD, ledger_id, arg.amount, arg.to.owner);
        self.post(ledger_id, TRANSFER_METHOD, &arg).await
    }

    async fn transfer_from(
        &self,
        ledger_id: &str,
        arg: TransferFromArg,
    ) -> Result<TransferResult, LedgerCallError> {
        debug!(
            "{} on {} amount={} from={} to={}",
            TRANSFER_FROM_METHOD, ledger_id, arg.amount, arg.from.owner, arg.to.owner
        );
        self.post(ledger_id, TRANSFER_FROM_METHOD, &arg).await
    }
}

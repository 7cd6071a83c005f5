//! Generic API structures and handlers
//!
//! This module contains shared structures, helper functions, the service-level
//! handlers (health, version, time, caller, events, preimage hashing) and the
//! route table of the HTLC coordinator API.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};
use warp::hyper::body::Bytes;
use warp::{http::{Method, StatusCode}, Filter, Rejection, Reply};

use htlc::ledger::LedgerHtlc;
use htlc::HtlcEvent;

use super::contracts;
use crate::config::Config;
use crate::ledger_client::CALLER_HEADER;

/// Largest accepted request body.
const MAX_BODY_BYTES: u64 = 64 * 1024;

// ============================================================================
// SHARED REQUEST/RESPONSE STRUCTURES
// ============================================================================

/// Standardized response structure for all query endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful
    pub success: bool,
    /// Response data (if successful)
    pub data: Option<T>,
    /// Error message (if failed)
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Query of `GET /hash`
#[derive(Debug, Deserialize)]
pub struct HashQuery {
    pub preimage: String,
}

/// Body of `POST /verify`
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub preimage: String,
    pub hashlock: String,
}

// ============================================================================
// GENERIC API HANDLERS
// ============================================================================

/// Handler for the events endpoint.
///
/// Returns the escrow events retained in memory, oldest first.
pub async fn get_events_handler(htlc: Arc<LedgerHtlc>) -> Result<impl Reply, Rejection> {
    let events: Vec<HtlcEvent> = htlc.events().history().await;
    Ok(warp::reply::json(&ApiResponse::ok(events)))
}

/// Handler for `GET /hash?preimage=...`: lower-case hex SHA-256 of the preimage text.
pub async fn hash_preimage_handler(query: HashQuery, htlc: Arc<LedgerHtlc>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(htlc.hash_preimage(&query.preimage))))
}

/// Handler for `POST /verify`: whether the preimage hashes to the given digest.
pub async fn verify_preimage_handler(
    request: VerifyRequest,
    htlc: Arc<LedgerHtlc>,
) -> Result<impl Reply, Rejection> {
    let valid = htlc.verify_preimage_hash(&request.preimage, &request.hashlock);
    Ok(warp::reply::json(&ApiResponse::ok(valid)))
}

// ============================================================================
// WARP FILTER HELPERS
// ============================================================================

/// Creates a warp filter that provides access to the escrow core.
pub fn with_htlc(
    htlc: Arc<LedgerHtlc>,
) -> impl Filter<Extract = (Arc<LedgerHtlc>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || htlc.clone())
}

/// Extracts the caller identity from the `x-caller` header.
///
/// The header is trusted as-is; authenticating it is the deployment's concern.
pub fn with_caller() -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::header::<String>(CALLER_HEADER)
}

/// Parses a JSON body into `T`, rejecting with [`JsonDeserializeError`].
pub fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send + 'static,
{
    warp::body::content_length_limit(MAX_BODY_BYTES)
        .and(warp::body::bytes())
        .and_then(|body: Bytes| async move {
            serde_json::from_slice::<T>(&body).map_err(|e| {
                debug!("Request body rejected: {}. Body: {}", e, String::from_utf8_lossy(&body));
                warp::reject::custom(JsonDeserializeError(format!("Invalid JSON: {}", e)))
            })
        })
}

// ============================================================================
// CUSTOM REJECTION TYPES
// ============================================================================

/// Custom rejection for JSON deserialization errors
#[derive(Debug)]
pub struct JsonDeserializeError(pub String);

impl warp::reject::Reject for JsonDeserializeError {}

// ============================================================================
// CORS CONFIGURATION
// ============================================================================

/// Creates a CORS filter based on the configured allowed origins.
fn create_cors_filter(allowed_origins: &[String]) -> warp::cors::Builder {
    let methods = vec![Method::GET, Method::POST, Method::OPTIONS];
    let headers = vec!["content-type", CALLER_HEADER];

    if allowed_origins.iter().any(|origin| origin == "*") {
        warp::cors()
            .allow_any_origin()
            .allow_methods(methods)
            .allow_headers(headers)
    } else {
        let origins: Vec<&str> = allowed_origins.iter().map(|s| s.as_str()).collect();
        warp::cors()
            .allow_origins(origins)
            .allow_methods(methods)
            .allow_headers(headers)
    }
}

// ============================================================================
// REJECTION HANDLER
// ============================================================================

/// Global rejection handler for all API routes.
///
/// Converts warp rejections into [`ApiResponse`] errors with matching HTTP
/// status codes.
pub async fn handle_rejection(rej: Rejection) -> Result<impl Reply, std::convert::Infallible> {
    let (status, message) = if let Some(err) = rej.find::<JsonDeserializeError>() {
        (StatusCode::BAD_REQUEST, err.0.clone())
    } else if let Some(err) = rej.find::<warp::reject::MissingHeader>() {
        (StatusCode::BAD_REQUEST, format!("Missing header: {}", err.name()))
    } else if let Some(err) = rej.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, format!("Invalid query: {}", err))
    } else if rej.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large".to_string())
    } else if rej.is_not_found() {
        (StatusCode::NOT_FOUND, "Endpoint not found".to_string())
    } else if rej.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        error!("Unhandled rejection: {:?}", rej);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ApiResponse::<()>::error(message)),
        status,
    ))
}

// ============================================================================
// API SERVER IMPLEMENTATION
// ============================================================================

/// REST API server for the HTLC coordinator service.
///
/// ## Security Model
///
/// Caller identity comes from the `x-caller` header and is not authenticated
/// here. Sender/receiver/controller checks are enforced by the escrow core
/// against that identity.
pub struct ApiServer {
    /// Service configuration
    config: Arc<Config>,
    /// Ledger-backed escrow core
    htlc: Arc<LedgerHtlc>,
}

impl ApiServer {
    /// Creates a new API server over the given escrow core.
    pub fn new(config: Config, htlc: Arc<LedgerHtlc>) -> Self {
        Self {
            config: Arc::new(config),
            htlc,
        }
    }

    /// Starts the API server and begins handling HTTP requests.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Server ran until shutdown
    /// * `Err(anyhow::Error)` - Invalid bind address
    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting API server on {}:{}",
            self.config.api.host, self.config.api.port
        );

        let routes = self.create_routes();

        let addr: std::net::SocketAddr = format!("{}:{}", self.config.api.host, self.config.api.port)
            .parse()
            .context("Failed to parse API server address")?;

        warp::serve(routes).run(addr).await;

        Ok(())
    }

    /// Creates all API routes for the server.
    pub(crate) fn create_routes(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
        let htlc = self.htlc.clone();

        // Health check endpoint - returns service status
        let health = warp::path("health").and(warp::path::end()).and(warp::get()).map(|| {
            warp::reply::json(&ApiResponse::ok("HTLC Coordinator Service is running".to_string()))
        });

        let version_htlc = htlc.clone();
        let version = warp::path("version")
            .and(warp::path::end())
            .and(warp::get())
            .map(move || warp::reply::json(&ApiResponse::ok(version_htlc.get_version().to_string())));

        let time_htlc = htlc.clone();
        let time = warp::path("time")
            .and(warp::path::end())
            .and(warp::get())
            .map(move || warp::reply::json(&ApiResponse::ok(time_htlc.get_current_time())));

        // Echoes the identity the service will act for
        let caller = warp::path("caller")
            .and(warp::path::end())
            .and(warp::get())
            .and(with_caller())
            .map(|caller: String| warp::reply::json(&ApiResponse::ok(caller)));

        let events = warp::path("events")
            .and(warp::path::end())
            .and(warp::get())
            .and(with_htlc(htlc.clone()))
            .and_then(get_events_handler);

        let hash = warp::path("hash")
            .and(warp::path::end())
            .and(warp::get())
            .and(warp::query::<HashQuery>())
            .and(with_htlc(htlc.clone()))
            .and_then(hash_preimage_handler);

        let verify = warp::path("verify")
            .and(warp::path::end())
            .and(warp::post())
            .and(json_body::<VerifyRequest>())
            .and(with_htlc(htlc.clone()))
            .and_then(verify_preimage_handler);

        health
            .or(version)
            .or(time)
            .or(caller)
            .or(events)
            .or(hash)
            .or(verify)
            .or(contracts::routes(htlc))
            .with(create_cors_filter(&self.config.api.cors_origins))
            .recover(handle_rejection)
    }

    /// Public method for testing - exposes routes for integration tests
    pub fn test_routes(&self) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
        self.create_routes()
    }
}

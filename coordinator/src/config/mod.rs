//! Configuration Management Module
//!
//! This module handles loading and managing configuration for the HTLC coordinator service.
//! Configuration includes escrow settings, the external token ledger endpoint, and API settings.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

use htlc::ledger::LedgerHtlcConfig;
use htlc::DEFAULT_MIN_TIME_LOCK_DURATION;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "HTLC_COORDINATOR_CONFIG_PATH";

/// Config file used when no override is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/coordinator.toml";

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure containing all service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Escrow settings (custody, timelock floor, controllers)
    pub htlc: HtlcConfig,
    /// External token ledger gateway
    pub ledger: LedgerConfig,
    /// API server configuration (host, port, CORS settings)
    pub api: ApiConfig,
}

/// Escrow settings of the ledger-backed HTLC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtlcConfig {
    /// Principal owning the custody accounts on the external ledgers
    pub custody_principal: String,
    /// Minimum distance between now and a new escrow's timelock, in seconds
    #[serde(default = "default_min_time_lock_duration")]
    pub min_time_lock_duration_secs: u64,
    /// Principals allowed to call the generic transfer endpoint
    pub controllers: Vec<String>,
}

/// Connection to the external token ledger gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Base URL; transfers go to `{url}/ledgers/{ledger_id}/icrc1_transfer`
    pub url: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

/// API server configuration for external communication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host address to bind the API server to
    pub host: String,
    /// Port number to bind the API server to
    pub port: u16,
    /// Allowed CORS origins for cross-origin requests
    pub cors_origins: Vec<String>,
}

fn default_min_time_lock_duration() -> u64 {
    DEFAULT_MIN_TIME_LOCK_DURATION
}

// ============================================================================
// CONFIGURATION LOADING AND MANAGEMENT
// ============================================================================

impl Config {
    /// Validates the configuration.
    ///
    /// # Returns
    ///
    /// - `Ok(())` - Configuration is valid
    /// - `Err(anyhow::Error)` - Empty custody principal, empty or duplicate
    ///   controllers, non-http(s) ledger URL, zero timeout, or port 0
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.htlc.custody_principal.trim().is_empty() {
            anyhow::bail!("Configuration error: htlc.custody_principal cannot be empty");
        }

        let mut seen = HashSet::new();
        for controller in &self.htlc.controllers {
            if controller.trim().is_empty() {
                anyhow::bail!("Configuration error: htlc.controllers contains an empty principal");
            }
            if !seen.insert(controller.as_str()) {
                anyhow::bail!(
                    "Configuration error: controller {} is listed more than once",
                    controller
                );
            }
        }

        let is_http = Url::parse(&self.ledger.url)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
            .unwrap_or(false);
        if !is_http {
            anyhow::bail!(
                "Configuration error: ledger.url must be an http(s) URL, got '{}'",
                self.ledger.url
            );
        }
        if self.ledger.timeout_ms == 0 {
            anyhow::bail!("Configuration error: ledger.timeout_ms must be greater than 0");
        }
        if self.api.port == 0 {
            anyhow::bail!("Configuration error: api.port must be greater than 0");
        }

        Ok(())
    }

    /// Loads configuration from the TOML file.
    ///
    /// The path is taken from `HTLC_COORDINATOR_CONFIG_PATH` if set, otherwise
    /// `config/coordinator.toml`.
    ///
    /// # Returns
    ///
    /// - `Ok(Config)` - Successfully loaded and validated configuration
    /// - `Err(anyhow::Error)` - File missing, unparsable, or invalid
    pub fn load() -> anyhow::Result<Self> {
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&config_path)
    }

    /// Loads and validates configuration from `config_path`.
    pub fn load_from(config_path: &str) -> anyhow::Result<Self> {
        if !std::path::Path::new(config_path).exists() {
            return Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/coordinator.template.toml config/coordinator.toml\n\
                Then edit config/coordinator.toml with your actual values.",
                config_path
            ));
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read configuration file '{}'", config_path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file '{}'", config_path))?;
        config.validate()?;
        Ok(config)
    }

    /// Settings handed to the escrow core.
    pub fn ledger_htlc_config(&self) -> LedgerHtlcConfig {
        LedgerHtlcConfig {
            custody_principal: self.htlc.custody_principal.clone(),
            min_time_lock_duration: self.htlc.min_time_lock_duration_secs,
            controllers: self.htlc.controllers.clone(),
        }
    }

    /// Creates a default configuration for local development and testing.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self {
            htlc: HtlcConfig {
                custody_principal: "htlc-custody".to_string(),
                min_time_lock_duration_secs: DEFAULT_MIN_TIME_LOCK_DURATION,
                controllers: vec!["htlc-controller".to_string()],
            },
            ledger: LedgerConfig {
                url: "http://127.0.0.1:4943".to_string(),
                timeout_ms: 30000,
            },
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 3340,
                cors_origins: vec!["http://localhost:3340".to_string()],
            },
        }
    }
}

//! Flat, environment-driven configuration.
//!
//! Loaded once at startup via [`Config::from_env`], mirroring the
//! teacher's `load_config` in `src/main.rs` — a plain struct populated
//! from named env vars, no profile registry.

use alloy::primitives::Address;
use tracing::warn;

/// Relayer signing keys before pool assignment/dedup.
#[derive(Debug, Clone)]
pub struct RawRelayerKeys {
    pub small: Vec<String>,
    pub big: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub hub_rpc_url: String,
    pub core_vault_address: Address,
    pub hmac_secret: String,
    pub relayer_keys: RawRelayerKeys,

    pub small_block_gas_limit: u64,
    pub big_block_gas_limit: u64,
    pub gas_estimate_buffer_bps: u32,

    pub nonce_allocator_mode: String,
    pub nonce_allocator_url: Option<String>,

    pub log_level: String,
    pub max_retry_attempts: u32,

    pub failure_queue_url: Option<String>,
    pub store_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

const DEFAULT_SMALL_BLOCK_GAS: u64 = 2_000_000;
const DEFAULT_BIG_BLOCK_GAS: u64 = 30_000_000;
const DEFAULT_GAS_BUFFER_BPS: u32 = 13_000;
const MIN_GAS_BUFFER_BPS: u32 = 10_000;
const MAX_GAS_BUFFER_BPS: u32 = 30_000;
const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 5;

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let hub_rpc_url = required_env("HUB_RPC_URL")?;
        let core_vault_address = required_env("CORE_VAULT_ADDRESS")?
            .parse()
            .map_err(|e| ConfigError::Invalid {
                name: "CORE_VAULT_ADDRESS",
                source: anyhow::anyhow!("{e}"),
            })?;
        let hmac_secret = required_env("LIQUIDATION_DIRECT_SIGN_IN_KEY")?;

        let relayer_keys = RawRelayerKeys {
            small: load_key_list("LIQUIDATOR_PRIVATE_KEYS_JSON", "LIQUIDATOR_PRIVATE_KEY"),
            big: load_key_list("LIQUIDATOR_PRIVATE_KEYS_BIG_JSON", ""),
        };

        let small_block_gas_limit = optional_env("HYPEREVM_SMALL_BLOCK_GAS_LIMIT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SMALL_BLOCK_GAS);
        let big_block_gas_limit = optional_env("HYPEREVM_BIG_BLOCK_GAS_LIMIT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_BIG_BLOCK_GAS);

        let gas_estimate_buffer_bps = optional_env("LIQUIDATION_GAS_ESTIMATE_BUFFER_BPS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_GAS_BUFFER_BPS)
            .clamp(MIN_GAS_BUFFER_BPS, MAX_GAS_BUFFER_BPS);

        let nonce_allocator_mode =
            optional_env("LIQUIDATION_NONCE_ALLOCATOR").unwrap_or_else(|| "enabled".to_string());
        let nonce_allocator_url = optional_env("NONCE_ALLOCATOR_URL");

        let log_level = optional_env("LIQUIDATION_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let max_retry_attempts = optional_env("LIQUIDATION_MAX_RETRY_ATTEMPTS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_RETRY_ATTEMPTS);

        Ok(Config {
            hub_rpc_url,
            core_vault_address,
            hmac_secret,
            relayer_keys,
            small_block_gas_limit,
            big_block_gas_limit,
            gas_estimate_buffer_bps,
            nonce_allocator_mode,
            nonce_allocator_url,
            log_level,
            max_retry_attempts,
            failure_queue_url: optional_env("FAILURE_QUEUE_URL"),
            store_url: optional_env("DATABASE_URL"),
        })
    }

    pub fn nonce_allocator_disabled(&self) -> bool {
        matches!(self.nonce_allocator_mode.as_str(), "disabled" | "off")
    }

    pub fn log_config(&self) {
        tracing::info!(
            hub_rpc_url = %self.hub_rpc_url,
            core_vault = %self.core_vault_address,
            small_block_gas_limit = self.small_block_gas_limit,
            big_block_gas_limit = self.big_block_gas_limit,
            gas_estimate_buffer_bps = self.gas_estimate_buffer_bps,
            nonce_allocator = %self.nonce_allocator_mode,
            "configuration loaded"
        );
    }
}

fn required_env(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Loads a JSON array of hex keys from `json_var`, falling back to a
/// single legacy key in `legacy_var`. Malformed keys are dropped, not
/// fatal — per the configuration surface's documented behavior.
fn load_key_list(json_var: &str, legacy_var: &str) -> Vec<String> {
    if let Some(raw) = optional_env(json_var) {
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(keys) => return keys.into_iter().filter(|k| is_valid_hex_key(k)).collect(),
            Err(e) => warn!(var = json_var, error = %e, "could not parse key list, ignoring"),
        }
    }
    if !legacy_var.is_empty() {
        if let Some(key) = optional_env(legacy_var).or_else(|| optional_env("PRIVATE_KEY")) {
            if is_valid_hex_key(&key) {
                return vec![key];
            }
            warn!(var = legacy_var, "malformed private key, dropping");
        }
    }
    Vec::new()
}

fn is_valid_hex_key(key: &str) -> bool {
    let trimmed = key.trim_start_matches("0x");
    trimmed.len() == 64 && trimmed.chars().all(|c| c.is_ascii_hexdigit())
}

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! orchestration core. All types derive Serde traits for deserialization
//! from config files, and every field has a default so minimal files work.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Chain connection and signer settings.
    pub chain: ChainConfig,

    /// Deployed contract addresses.
    pub contracts: ContractsConfig,

    /// Gas pricing and broadcast retry policy.
    pub submitter: SubmitterConfig,

    /// Receipt polling settings.
    pub confirmation: ConfirmationConfig,

    /// Tolerances used when diffing on-chain and off-chain records.
    pub reconciliation: ReconciliationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Off-chain store settings.
    pub store: StoreConfig,
}

/// Chain connection configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Hex-encoded signer key. Only needed for state-changing calls.
    /// `HACKATHON_CHAIN_PRIVATE_KEY` overrides this value.
    pub private_key: Option<String>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 31337,
            rpc_timeout_secs: 10,
            private_key: None,
        }
    }
}

// Keep the key out of logs and `{:?}` dumps.
impl std::fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainConfig")
            .field("rpc_url", &self.rpc_url)
            .field("failover_urls", &self.failover_urls)
            .field("chain_id", &self.chain_id)
            .field("rpc_timeout_secs", &self.rpc_timeout_secs)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Contract addresses, hex encoded.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContractsConfig {
    /// Event registry (event lifecycle and votes).
    pub event_registry: String,

    /// Check-in registry.
    pub checkin_registry: String,

    /// Participation NFT registry.
    pub nft_registry: String,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            event_registry: "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string(),
            checkin_registry: "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512".to_string(),
            nft_registry: "0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0".to_string(),
        }
    }
}

/// Gas pricing and retry policy for the transaction submitter.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubmitterConfig {
    /// Gas price multiplier (1.0 = suggested, 1.2 = 20% buffer).
    pub gas_price_multiplier: f64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,

    /// Price used when the node cannot suggest one.
    pub fallback_gas_price_gwei: u64,

    /// Percentage added to the price after an "underpriced" rejection.
    pub gas_bump_percent: u64,

    /// Total broadcast attempts, including the first.
    pub max_attempts: u32,

    /// Base backoff between retries; attempt N sleeps N times this.
    pub retry_backoff_ms: u64,

    /// Gas limit used when estimation fails for a single-item call.
    pub default_gas_limit: u64,

    /// Base gas limit used when estimation fails for a batch call.
    pub batch_base_gas: u64,

    /// Extra gas reserved per batch item.
    pub batch_per_item_gas: u64,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            gas_price_multiplier: 1.2,
            max_gas_price_gwei: 500,
            fallback_gas_price_gwei: 20,
            gas_bump_percent: 20,
            max_attempts: 3,
            retry_backoff_ms: 1000,
            default_gas_limit: 300_000,
            batch_base_gas: 500_000,
            batch_per_item_gas: 50_000,
        }
    }
}

/// Receipt polling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Interval between receipt lookups for blocking waits.
    pub poll_interval_ms: u64,

    /// Blocks required for finality; 1 means the mining block is enough.
    pub confirmation_blocks: u32,

    /// Deadline for event lifecycle and vote transactions.
    pub blocking_timeout_secs: u64,

    /// Deadline for registration and batch transactions.
    pub batch_timeout_secs: u64,

    /// Delay before the first background lookup, to let the tx propagate.
    pub background_initial_delay_ms: u64,

    /// Interval between background lookups.
    pub background_poll_interval_ms: u64,

    /// Total time a background poller may spend before giving up.
    pub background_budget_secs: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            confirmation_blocks: 1,
            blocking_timeout_secs: 60,
            batch_timeout_secs: 300,
            background_initial_delay_ms: 10_000,
            background_poll_interval_ms: 5_000,
            background_budget_secs: 300,
        }
    }
}

/// Tolerances for reconciliation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Allowed drift between stored and on-chain event start/end times.
    pub event_time_skew_secs: u64,

    /// Allowed drift between stored and on-chain check-in timestamps.
    pub checkin_time_skew_secs: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            event_time_skew_secs: 60,
            checkin_time_skew_secs: 300,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Off-chain store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot file for the in-memory store. `None` keeps it volatile.
    pub path: Option<String>,
}

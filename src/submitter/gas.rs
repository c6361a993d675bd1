//! Gas pricing policy.

use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256};
use serde::Serialize;

use crate::config::SubmitterConfig;

pub const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Suggested price plus the configured safety margin, capped at the maximum.
pub fn with_margin(suggested: u128, config: &SubmitterConfig) -> u128 {
    let adjusted = (suggested as f64 * config.gas_price_multiplier) as u128;
    adjusted.max(suggested).min(max_price(config))
}

/// Price for the next attempt after an "underpriced" rejection.
///
/// Always strictly greater than `price`.
pub fn bumped(price: u128, config: &SubmitterConfig) -> u128 {
    let raised = price.saturating_mul(100 + config.gas_bump_percent as u128) / 100;
    raised.max(price + 1)
}

pub fn max_price(config: &SubmitterConfig) -> u128 {
    config.max_gas_price_gwei as u128 * WEI_PER_GWEI
}

pub fn fallback_price(config: &SubmitterConfig) -> u128 {
    config.fallback_gas_price_gwei as u128 * WEI_PER_GWEI
}

/// Limit used when the dry-run estimate fails for a non-revert reason.
pub fn fallback_limit(config: &SubmitterConfig, batch_size: usize) -> u64 {
    if batch_size == 0 {
        config.default_gas_limit
    } else {
        config.batch_base_gas + batch_size as u64 * config.batch_per_item_gas
    }
}

/// Estimate plus per-item headroom for batches.
pub fn padded_limit(estimate: u64, config: &SubmitterConfig, batch_size: usize) -> u64 {
    estimate + batch_size as u64 * config.batch_per_item_gas
}

/// Cost preview for an operation, against the payer's balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GasQuote {
    pub gas_limit: u64,
    pub gas_price_wei: u128,
    pub gas_price_gwei: String,
    pub total_cost_wei: U256,
    pub total_cost_eth: String,
    pub payer: Address,
    pub balance_wei: U256,
    pub is_sufficient: bool,
    pub shortfall_wei: U256,
}

impl GasQuote {
    pub fn new(gas_limit: u64, gas_price_wei: u128, payer: Address, balance_wei: U256) -> Self {
        let total = U256::from(gas_limit) * U256::from(gas_price_wei);
        Self {
            gas_limit,
            gas_price_wei,
            gas_price_gwei: format!(
                "{}.{:09}",
                gas_price_wei / WEI_PER_GWEI,
                gas_price_wei % WEI_PER_GWEI
            ),
            total_cost_wei: total,
            total_cost_eth: format_ether(total),
            payer,
            balance_wei,
            is_sufficient: balance_wei >= total,
            shortfall_wei: total.saturating_sub(balance_wei),
        }
    }
}

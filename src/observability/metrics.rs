//! Metrics collection and exposition.
//!
//! # Metrics
//! - `chain_tx_submitted_total` (counter): accepted broadcasts by operation kind
//! - `chain_tx_retries_total` (counter): re-priced broadcasts by operation kind
//! - `chain_tx_failures_total` (counter): submissions that never reached the pool
//! - `chain_tx_gas_price_gwei` (histogram): price of accepted broadcasts
//! - `chain_confirmations_total` (counter): receipt outcomes by kind and outcome
//! - `chain_confirmation_wait_seconds` (histogram): time from broadcast to outcome
//! - `chain_rpc_health` (gauge): 1=healthy, 0=unhealthy
//! - `chain_verifications_total` (counter): reconciliation reports by entity and validity
//! - `store_records` (gauge): rows held by the in-memory store
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library use and
//!   tests need no setup
//! - Labels are low-cardinality (kinds and outcomes, never hashes or ids)

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_tx_submitted(kind: &'static str, gas_price_wei: u128) {
    metrics::counter!("chain_tx_submitted_total", "kind" => kind).increment(1);
    metrics::histogram!("chain_tx_gas_price_gwei", "kind" => kind)
        .record(gas_price_wei as f64 / 1e9);
}

pub fn record_tx_retry(kind: &'static str) {
    metrics::counter!("chain_tx_retries_total", "kind" => kind).increment(1);
}

pub fn record_tx_failure(kind: &'static str, reason: &'static str) {
    metrics::counter!("chain_tx_failures_total", "kind" => kind, "reason" => reason).increment(1);
}

pub fn record_confirmation(kind: &'static str, outcome: &'static str, waited_secs: f64) {
    metrics::counter!("chain_confirmations_total", "kind" => kind, "outcome" => outcome)
        .increment(1);
    metrics::histogram!("chain_confirmation_wait_seconds", "kind" => kind).record(waited_secs);
}

pub fn record_rpc_health(endpoint: &'static str, healthy: bool) {
    metrics::gauge!("chain_rpc_health", "endpoint" => endpoint).set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_verification(entity: &'static str, is_valid: bool) {
    let valid = if is_valid { "true" } else { "false" };
    metrics::counter!("chain_verifications_total", "entity" => entity, "valid" => valid)
        .increment(1);
}

pub fn record_store_size(table: &'static str, len: usize) {
    metrics::gauge!("store_records", "table" => table).set(len as f64);
}

//! Typed bindings to the three platform contracts.
//!
//! # Data Flow
//! ```text
//! façade
//!     → <registry>.method(args)          (pure: encode into an OperationRequest)
//!     → submitter                        (price, sign, broadcast)
//!
//! façade / verifier
//!     → <registry>.query(args)           (eth_call through ContractBinding)
//!     → decoded return struct
//! ```
//!
//! # Design Decisions
//! - Argument encoding is typed by `sol!` bindings, never hand-built
//! - Addresses are validated before any network call
//! - Revert reasons are classified once, in revert.rs

pub mod checkin_registry;
pub mod event_registry;
pub mod nft_registry;
pub mod revert;

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolCall;
use std::sync::Arc;

use crate::chain::{ChainError, ChainResult, ChainRpc};

pub use checkin_registry::CheckInRegistry;
pub use event_registry::{EventDraft, EventRegistry};
pub use nft_registry::NftRegistry;
pub use revert::RevertKind;

/// True for exactly 40 hex digits, optionally prefixed with `0x`.
pub fn is_valid_address(value: &str) -> bool {
    let hex = strip_hex_prefix(value);
    hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// Parse a wallet or contract address, rejecting anything malformed.
pub fn parse_address(value: &str) -> ChainResult<Address> {
    let trimmed = value.trim();
    if !is_valid_address(trimmed) {
        return Err(ChainError::InvalidAddress(value.to_string()));
    }
    format!("0x{}", strip_hex_prefix(trimmed))
        .parse()
        .map_err(|_| ChainError::InvalidAddress(value.to_string()))
}

fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Read-only call boundary to one deployed contract.
#[derive(Clone)]
pub struct ContractBinding {
    name: &'static str,
    address: Address,
    rpc: Arc<dyn ChainRpc>,
}

impl ContractBinding {
    pub fn new(name: &'static str, address: Address, rpc: Arc<dyn ChainRpc>) -> Self {
        Self { name, address, rpc }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Execute a view call and decode its return value.
    pub async fn call<C: SolCall>(&self, call: C) -> ChainResult<C::Return> {
        let output = self.rpc.call(self.address, build_call_data(&call)).await?;
        C::abi_decode_returns(&output).map_err(|e| {
            ChainError::Abi(format!("{}.{}: {}", self.name, C::SIGNATURE, e))
        })
    }
}

impl std::fmt::Debug for ContractBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractBinding")
            .field("name", &self.name)
            .field("address", &self.address)
            .finish()
    }
}

/// ABI-encode a call, selector included.
pub fn build_call_data<C: SolCall>(call: &C) -> Bytes {
    Bytes::from(call.abi_encode())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"));
        assert!(is_valid_address("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
        assert!(!is_valid_address("0xf39fd6e51aad88f6f4ce6ab8827279cfffb9226"));
        assert!(!is_valid_address("0xg39fd6e51aad88f6f4ce6ab8827279cfffb92266"));
        assert!(!is_valid_address(""));
    }

    #[test]
    fn test_parse_address_accepts_both_forms() {
        let with = parse_address("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266").unwrap();
        let without = parse_address("f39fd6e51aad88f6f4ce6ab8827279cfffb92266").unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn test_parse_address_rejects_malformed() {
        let err = parse_address("0x1234").unwrap_err();
        assert!(matches!(err, ChainError::InvalidAddress(_)));
    }
}

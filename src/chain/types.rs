//! Chain-specific types and error definitions.

use alloy::primitives::{Address, Bytes, Log, TxHash};
use alloy::sol_types::SolEvent;
use serde::Serialize;
use thiserror::Error;

use crate::contracts::RevertKind;

/// Errors that can occur during chain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC connection or request failed on every provider.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// No receipt appeared before the deadline.
    #[error("Transaction {tx_hash} not confirmed after {waited_secs} seconds")]
    ConfirmationTimeout { tx_hash: TxHash, waited_secs: u64 },

    /// The contract refused the call (dry run, estimate, or broadcast).
    #[error("Contract rejected operation: {kind} ({reason})")]
    Reverted { kind: RevertKind, reason: String },

    /// The transaction was mined with a failure status.
    #[error("Transaction {tx_hash} reverted in block {block_number}")]
    TxReverted { tx_hash: TxHash, block_number: u64 },

    /// The node refused the signed transaction.
    #[error("Node rejected transaction: {0}")]
    Rejected(String),

    /// Every re-priced broadcast was rejected as underpriced.
    #[error("Broadcast failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Invalid private key format or signing failure.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// A state-changing call was attempted without a configured key.
    #[error("No signer configured; state-changing calls are unavailable")]
    SignerMissing,

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Malformed address supplied by the caller.
    #[error("Invalid address '{0}': expected 40 hex digits with optional 0x prefix")]
    InvalidAddress(String),

    /// Return data or log could not be decoded.
    #[error("ABI decode error: {0}")]
    Abi(String),
}

impl ChainError {
    /// Build an error from a node's JSON-RPC error message.
    ///
    /// Messages mentioning a revert are contract rejections; everything else
    /// is a node-side refusal.
    pub fn from_node_message(message: &str) -> Self {
        if message.to_lowercase().contains("revert") {
            let reason = message
                .split_once("reverted:")
                .map(|(_, r)| r.trim().to_string())
                .unwrap_or_else(|| message.to_string());
            ChainError::Reverted {
                kind: RevertKind::classify(&reason),
                reason,
            }
        } else {
            ChainError::Rejected(message.to_string())
        }
    }

    /// True when a broadcast failure can be fixed by paying more for gas.
    pub fn is_underpriced(&self) -> bool {
        match self {
            ChainError::Rejected(msg) => {
                let lower = msg.to_lowercase();
                lower.contains("underpriced") || lower.contains("gas")
            }
            _ => false,
        }
    }

    /// The revert kind, if this is a contract rejection.
    pub fn revert_kind(&self) -> Option<RevertKind> {
        match self {
            ChainError::Reverted { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// A signed transaction ready for broadcast.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub hash: TxHash,
    /// EIP-2718 encoded envelope.
    pub raw: Bytes,
    pub from: Address,
    pub to: Address,
    pub input: Bytes,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
}

/// A mined transaction's receipt, reduced to what orchestration needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub success: bool,
    pub gas_used: u64,
    #[serde(skip)]
    pub logs: Vec<Log>,
}

impl TxReceipt {
    /// Decode every log matching event `E`, skipping the rest.
    pub fn decode_logs<E: SolEvent>(&self) -> Vec<E> {
        self.logs
            .iter()
            .filter(|log| log.data.topics().first() == Some(&E::SIGNATURE_HASH))
            .filter_map(|log| E::decode_log_data(&log.data).ok())
            .collect()
    }

    /// Depth of this receipt's block at `current_block`; the mining block counts as one.
    pub fn confirmations(&self, current_block: u64) -> u64 {
        current_block.saturating_sub(self.block_number) + 1
    }
}

/// Three-way answer to "what happened to this hash?".
#[derive(Debug, Clone, PartialEq)]
pub enum TxStatus {
    /// Mined; check `success` for the outcome.
    Mined(TxReceipt),
    /// Known to the node but not yet in a block.
    Pending,
    /// Neither mined nor in the pool: dropped, replaced, or never seen.
    Unknown,
}

impl TxStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TxStatus::Mined(r) if r.success => "confirmed",
            TxStatus::Mined(_) => "reverted",
            TxStatus::Pending => "pending",
            TxStatus::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{B256, LogData, U256};

    alloy::sol! {
        event Ping(uint256 indexed id, string note);
        event Pong(uint256 indexed id);
    }

    #[test]
    fn test_error_display() {
        let err = ChainError::Timeout(10);
        assert_eq!(err.to_string(), "RPC timeout after 10 seconds");

        let err = ChainError::GasPriceTooHigh {
            current_gwei: 600,
            max_gwei: 500,
        };
        assert!(err.to_string().contains("600"));
    }

    #[test]
    fn test_node_message_classification() {
        let err = ChainError::from_node_message("execution reverted: Participant already checked in");
        assert_eq!(err.revert_kind(), Some(RevertKind::AlreadyCheckedIn));
        match err {
            ChainError::Reverted { reason, .. } => {
                assert_eq!(reason, "Participant already checked in")
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = ChainError::from_node_message("replacement transaction underpriced");
        assert!(matches!(err, ChainError::Rejected(_)));
        assert!(err.is_underpriced());
    }

    #[test]
    fn test_underpriced_matching() {
        assert!(ChainError::Rejected("transaction underpriced".into()).is_underpriced());
        assert!(ChainError::Rejected("max fee per gas less than block base fee".into()).is_underpriced());
        assert!(!ChainError::Rejected("nonce too low".into()).is_underpriced());
        assert!(!ChainError::Rpc("gas".into()).is_underpriced());
    }

    #[test]
    fn test_decode_logs_filters_by_signature() {
        let ping = Ping {
            id: U256::from(7),
            note: "hello".to_string(),
        };
        let pong = Pong { id: U256::from(8) };
        let receipt = TxReceipt {
            tx_hash: B256::ZERO,
            block_number: 10,
            success: true,
            gas_used: 21_000,
            logs: vec![
                Log { address: Address::ZERO, data: pong.encode_log_data() },
                Log { address: Address::ZERO, data: ping.encode_log_data() },
                Log { address: Address::ZERO, data: LogData::new_unchecked(vec![], Bytes::new()) },
            ],
        };

        let pings: Vec<Ping> = receipt.decode_logs();
        assert_eq!(pings.len(), 1);
        assert_eq!(pings[0].id, U256::from(7));
        assert_eq!(pings[0].note, "hello");
    }

    #[test]
    fn test_confirmations() {
        let receipt = TxReceipt {
            tx_hash: B256::ZERO,
            block_number: 100,
            success: true,
            gas_used: 0,
            logs: vec![],
        };
        assert_eq!(receipt.confirmations(100), 1);
        assert_eq!(receipt.confirmations(102), 3);
        assert_eq!(receipt.confirmations(90), 1);
    }
}

//! Chain access subsystem.
//!
//! # Data Flow
//! ```text
//! AppConfig.chain (RPC URLs, key)
//!     → wallet.rs (key loading, EIP-155 signing)
//!     → client.rs (RPC with timeouts and failover)  ─┐
//!     → mock.rs   (scripted in-memory chain, tests)  ─┴→ rpc.rs (ChainRpc seam)
//! ```
//!
//! # Security Constraints
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts
//! - Read-only operation works without a key

pub mod client;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod rpc;
pub mod types;
pub mod wallet;

pub use client::BlockchainClient;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockChain, ReceiptPlan};
pub use rpc::ChainRpc;
pub use types::{ChainError, ChainResult, SignedTransaction, TxReceipt, TxStatus};
pub use wallet::Wallet;

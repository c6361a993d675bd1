//! The network seam between orchestration and a node.
//!
//! Everything above this trait (bindings, submitter, tracker, façades) talks
//! to the chain only through [`ChainRpc`], so the real failover client and
//! the in-memory [`MockChain`](crate::chain::MockChain) are interchangeable.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;

use crate::chain::types::{ChainResult, SignedTransaction, TxReceipt};

#[async_trait]
pub trait ChainRpc: Send + Sync + 'static {
    async fn chain_id(&self) -> ChainResult<u64>;

    async fn block_number(&self) -> ChainResult<u64>;

    /// Nonce including transactions still in the pool.
    async fn pending_nonce(&self, address: Address) -> ChainResult<u64>;

    /// Suggested gas price in wei.
    async fn gas_price(&self) -> ChainResult<u128>;

    /// Dry-run gas estimate. A contract revert comes back as
    /// [`ChainError::Reverted`](crate::chain::ChainError::Reverted).
    async fn estimate_gas(&self, from: Address, to: Address, input: Bytes) -> ChainResult<u64>;

    /// Read-only call; returns raw return data.
    async fn call(&self, to: Address, input: Bytes) -> ChainResult<Bytes>;

    async fn send_raw_transaction(&self, tx: &SignedTransaction) -> ChainResult<TxHash>;

    /// `None` while the transaction is not (yet) mined.
    async fn transaction_receipt(&self, hash: TxHash) -> ChainResult<Option<TxReceipt>>;

    /// Whether the node still knows the transaction (pending in the pool).
    async fn transaction_in_pool(&self, hash: TxHash) -> ChainResult<bool>;

    async fn balance(&self, address: Address) -> ChainResult<U256>;
}

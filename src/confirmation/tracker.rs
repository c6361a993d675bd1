//! Receipt polling.

use alloy::primitives::TxHash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use uuid::Uuid;

use crate::chain::{ChainError, ChainResult, ChainRpc, TxReceipt, TxStatus};
use crate::config::ConfirmationConfig;
use crate::observability::metrics;
use crate::submitter::OperationKind;

/// A broadcast handed to a background confirmation task.
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    pub tx_hash: TxHash,
    pub kind: OperationKind,
    /// Ledger key of the entity the transaction belongs to.
    pub entity_id: String,
    pub intent_id: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationResult {
    Confirmed(TxReceipt),
    Reverted(TxReceipt),
    /// Budget spent without a receipt.
    Unresolved,
}

impl ConfirmationResult {
    pub fn label(&self) -> &'static str {
        match self {
            ConfirmationResult::Confirmed(_) => "confirmed",
            ConfirmationResult::Reverted(_) => "reverted",
            ConfirmationResult::Unresolved => "unresolved",
        }
    }
}

/// Message sent from a background task to the outcome sink.
#[derive(Debug, Clone)]
pub struct ConfirmationOutcome {
    pub pending: PendingConfirmation,
    pub result: ConfirmationResult,
    pub waited: Duration,
}

#[derive(Clone)]
pub struct ConfirmationTracker {
    rpc: Arc<dyn ChainRpc>,
    config: ConfirmationConfig,
}

impl ConfirmationTracker {
    pub fn new(rpc: Arc<dyn ChainRpc>, config: ConfirmationConfig) -> Self {
        Self { rpc, config }
    }

    /// Default deadline for single-item blocking operations.
    pub fn blocking_timeout(&self) -> Duration {
        Duration::from_secs(self.config.blocking_timeout_secs)
    }

    /// Deadline for batch operations.
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.config.batch_timeout_secs)
    }

    /// Block until `tx_hash` is mined and deep enough, or `timeout` elapses.
    ///
    /// A mined failure returns [`ChainError::TxReverted`]; running out of time
    /// returns [`ChainError::ConfirmationTimeout`].
    pub async fn wait_for_receipt(&self, tx_hash: TxHash, timeout: Duration) -> ChainResult<TxReceipt> {
        let started = Instant::now();
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        match self.poll_until(tx_hash, started + timeout, poll_interval).await {
            Some(receipt) if receipt.success => {
                tracing::debug!(
                    tx_hash = %tx_hash,
                    block_number = receipt.block_number,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "Transaction confirmed"
                );
                Ok(receipt)
            }
            Some(receipt) => Err(ChainError::TxReverted {
                tx_hash,
                block_number: receipt.block_number,
            }),
            None => Err(ChainError::ConfirmationTimeout {
                tx_hash,
                waited_secs: started.elapsed().as_secs(),
            }),
        }
    }

    /// Poll until a terminal receipt or `deadline`, with one final lookup at the deadline.
    async fn poll_until(&self, tx_hash: TxHash, deadline: Instant, interval: Duration) -> Option<TxReceipt> {
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            match self.probe(tx_hash).await {
                Ok(Some(receipt)) => return Some(receipt),
                Ok(None) => tracing::trace!(tx_hash = %tx_hash, "Transaction pending"),
                Err(e) => tracing::debug!(tx_hash = %tx_hash, error = %e, "Receipt lookup failed, will retry"),
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            sleep(interval.min(remaining)).await;
        }

        match self.probe(tx_hash).await {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!(tx_hash = %tx_hash, error = %e, "Final receipt lookup failed");
                None
            }
        }
    }

    /// A receipt that is terminal: failed, or successful with enough depth.
    async fn probe(&self, tx_hash: TxHash) -> ChainResult<Option<TxReceipt>> {
        let Some(receipt) = self.rpc.transaction_receipt(tx_hash).await? else {
            return Ok(None);
        };
        if !receipt.success || self.config.confirmation_blocks <= 1 {
            return Ok(Some(receipt));
        }

        let current = self.rpc.block_number().await?;
        let depth = receipt.confirmations(current);
        if depth < self.config.confirmation_blocks as u64 {
            tracing::debug!(
                tx_hash = %tx_hash,
                confirmations = depth,
                required = self.config.confirmation_blocks,
                "Waiting for confirmations"
            );
            return Ok(None);
        }
        Ok(Some(receipt))
    }

    /// Three-way status of `tx_hash`.
    pub async fn status(&self, tx_hash: TxHash) -> ChainResult<TxStatus> {
        if let Some(receipt) = self.rpc.transaction_receipt(tx_hash).await? {
            return Ok(TxStatus::Mined(receipt));
        }
        if self.rpc.transaction_in_pool(tx_hash).await? {
            Ok(TxStatus::Pending)
        } else {
            Ok(TxStatus::Unknown)
        }
    }

    /// Confirm `pending` on a detached task and send the outcome to `outcomes`.
    ///
    /// The task waits the propagation delay, then polls within its own budget.
    /// A closed channel is logged and otherwise ignored.
    pub fn spawn_detached(
        &self,
        pending: PendingConfirmation,
        outcomes: UnboundedSender<ConfirmationOutcome>,
    ) -> JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            sleep(Duration::from_millis(tracker.config.background_initial_delay_ms)).await;

            let deadline = started + Duration::from_secs(tracker.config.background_budget_secs);
            let interval = Duration::from_millis(tracker.config.background_poll_interval_ms);
            let result = match tracker.poll_until(pending.tx_hash, deadline, interval).await {
                Some(receipt) if receipt.success => ConfirmationResult::Confirmed(receipt),
                Some(receipt) => ConfirmationResult::Reverted(receipt),
                None => ConfirmationResult::Unresolved,
            };

            let waited = started.elapsed();
            metrics::record_confirmation(pending.kind.as_str(), result.label(), waited.as_secs_f64());
            match &result {
                ConfirmationResult::Confirmed(receipt) => tracing::info!(
                    intent_id = %pending.intent_id,
                    kind = %pending.kind,
                    tx_hash = %pending.tx_hash,
                    block_number = receipt.block_number,
                    "Background confirmation succeeded"
                ),
                ConfirmationResult::Reverted(receipt) => tracing::error!(
                    intent_id = %pending.intent_id,
                    kind = %pending.kind,
                    tx_hash = %pending.tx_hash,
                    block_number = receipt.block_number,
                    "Transaction reverted on chain"
                ),
                ConfirmationResult::Unresolved => tracing::warn!(
                    intent_id = %pending.intent_id,
                    kind = %pending.kind,
                    tx_hash = %pending.tx_hash,
                    waited_secs = waited.as_secs(),
                    "Confirmation budget exhausted, transaction still unresolved"
                ),
            }

            let tx_hash = pending.tx_hash;
            if outcomes
                .send(ConfirmationOutcome {
                    pending,
                    result,
                    waited,
                })
                .is_err()
            {
                tracing::debug!(tx_hash = %tx_hash, "Outcome sink closed, dropping confirmation result");
            }
        })
    }
}

impl std::fmt::Debug for ConfirmationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationTracker")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{MockChain, ReceiptPlan, Wallet};
    use alloy::primitives::{Address, Bytes};
    use tokio::sync::mpsc;

    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn fast_config() -> ConfirmationConfig {
        ConfirmationConfig {
            poll_interval_ms: 5,
            background_initial_delay_ms: 1,
            background_poll_interval_ms: 5,
            background_budget_secs: 1,
            ..Default::default()
        }
    }

    async fn broadcast(chain: &MockChain, nonce: u64) -> TxHash {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 31337).unwrap();
        let signed = wallet
            .sign_call(Address::repeat_byte(0xc1), Bytes::new(), nonce, 1_000_000_000, 100_000)
            .await
            .unwrap();
        chain.send_raw_transaction(&signed).await.unwrap()
    }

    #[tokio::test]
    async fn test_receipt_after_pending_polls() {
        let chain = Arc::new(MockChain::new(31337));
        chain.push_receipt_plan(ReceiptPlan::Success { after_lookups: 3 });
        let hash = broadcast(&chain, 0).await;

        let tracker = ConfirmationTracker::new(chain, fast_config());
        let receipt = tracker.wait_for_receipt(hash, Duration::from_secs(5)).await.unwrap();
        assert!(receipt.success);
        assert_eq!(receipt.tx_hash, hash);
    }

    #[tokio::test]
    async fn test_rpc_errors_are_transient() {
        let chain = Arc::new(MockChain::new(31337));
        let hash = broadcast(&chain, 0).await;
        chain.fail_receipt_lookups(2);

        let tracker = ConfirmationTracker::new(chain, fast_config());
        assert!(tracker.wait_for_receipt(hash, Duration::from_secs(5)).await.is_ok());
    }

    #[tokio::test]
    async fn test_revert_is_not_a_timeout() {
        let chain = Arc::new(MockChain::new(31337));
        chain.push_receipt_plan(ReceiptPlan::Revert { after_lookups: 1 });
        let hash = broadcast(&chain, 0).await;

        let tracker = ConfirmationTracker::new(chain, fast_config());
        let err = tracker.wait_for_receipt(hash, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, ChainError::TxReverted { tx_hash, .. } if tx_hash == hash));
    }

    #[tokio::test]
    async fn test_timeout_is_distinguishable() {
        let chain = Arc::new(MockChain::new(31337));
        chain.push_receipt_plan(ReceiptPlan::StuckInPool);
        let hash = broadcast(&chain, 0).await;

        let tracker = ConfirmationTracker::new(chain, fast_config());
        let err = tracker.wait_for_receipt(hash, Duration::from_millis(30)).await.unwrap_err();
        assert!(matches!(err, ChainError::ConfirmationTimeout { .. }));
    }

    #[tokio::test]
    async fn test_confirmation_depth() {
        let chain = Arc::new(MockChain::new(31337));
        let hash = broadcast(&chain, 0).await;
        let config = ConfirmationConfig {
            confirmation_blocks: 3,
            ..fast_config()
        };
        let tracker = ConfirmationTracker::new(chain.clone(), config);

        let err = tracker.wait_for_receipt(hash, Duration::from_millis(30)).await.unwrap_err();
        assert!(matches!(err, ChainError::ConfirmationTimeout { .. }));

        chain.set_block_number(103);
        assert!(tracker.wait_for_receipt(hash, Duration::from_millis(30)).await.is_ok());
    }

    #[tokio::test]
    async fn test_three_way_status() {
        let chain = Arc::new(MockChain::new(31337));
        chain.push_receipt_plan(ReceiptPlan::StuckInPool);
        chain.push_receipt_plan(ReceiptPlan::Dropped);
        let stuck = broadcast(&chain, 0).await;
        let dropped = broadcast(&chain, 1).await;
        let mined = broadcast(&chain, 2).await;

        let tracker = ConfirmationTracker::new(chain, fast_config());
        assert_eq!(tracker.status(stuck).await.unwrap(), TxStatus::Pending);
        assert_eq!(tracker.status(dropped).await.unwrap(), TxStatus::Unknown);
        assert_eq!(tracker.status(mined).await.unwrap().label(), "confirmed");
    }

    #[tokio::test]
    async fn test_detached_reports_outcome() {
        let chain = Arc::new(MockChain::new(31337));
        chain.push_receipt_plan(ReceiptPlan::Revert { after_lookups: 2 });
        let hash = broadcast(&chain, 0).await;

        let tracker = ConfirmationTracker::new(chain, fast_config());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pending = PendingConfirmation {
            tx_hash: hash,
            kind: OperationKind::CheckIn,
            entity_id: "checkin:42:7".to_string(),
            intent_id: Uuid::new_v4(),
        };
        tracker.spawn_detached(pending, tx).await.unwrap();

        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.pending.tx_hash, hash);
        assert!(matches!(outcome.result, ConfirmationResult::Reverted(_)));
    }

    #[tokio::test]
    async fn test_detached_survives_closed_sink() {
        let chain = Arc::new(MockChain::new(31337));
        chain.push_receipt_plan(ReceiptPlan::Dropped);
        let hash = broadcast(&chain, 0).await;

        let tracker = ConfirmationTracker::new(chain, fast_config());
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let pending = PendingConfirmation {
            tx_hash: hash,
            kind: OperationKind::MintNft,
            entity_id: "nft:1:1".to_string(),
            intent_id: Uuid::new_v4(),
        };
        assert!(tracker.spawn_detached(pending, tx).await.is_ok());
    }
}

//! Transaction submitter: price, sign, broadcast, retry.
//!
//! # Data Flow
//! ```text
//! OperationRequest
//!     → pending nonce (re-read every submission)
//!     → gas price (suggested × multiplier, or fixed fallback)
//!     → gas limit (dry-run estimate + batch margin, or fixed fallback)
//!     → sign → broadcast
//!          ├─ accepted              → SubmittedTx
//!          ├─ underpriced/gas error → sleep attempt × backoff, bump price, retry
//!          └─ anything else         → error, no retry
//! ```
//!
//! # Design Decisions
//! - Retries reuse the nonce, so an accepted retry replaces nothing
//! - Bumped prices are strictly increasing and never exceed the cap
//! - A revert during estimation is terminal: the contract said no

pub mod gas;
pub mod operation;

use alloy::primitives::Address;
use std::sync::Arc;
use std::time::Duration;

use crate::chain::{ChainError, ChainResult, ChainRpc, Wallet};
use crate::config::SubmitterConfig;
use crate::observability::metrics;

pub use gas::GasQuote;
pub use operation::{ChainOperation, OperationKind, OperationRequest, SubmittedTx};

/// Builds, prices, signs and broadcasts one operation at a time.
#[derive(Clone)]
pub struct TxSubmitter {
    rpc: Arc<dyn ChainRpc>,
    wallet: Option<Wallet>,
    config: SubmitterConfig,
}

impl TxSubmitter {
    /// A submitter without a wallet can still quote, but not submit.
    pub fn new(rpc: Arc<dyn ChainRpc>, wallet: Option<Wallet>, config: SubmitterConfig) -> Self {
        Self {
            rpc,
            wallet,
            config,
        }
    }

    pub fn signer_address(&self) -> Option<Address> {
        self.wallet.as_ref().map(Wallet::address)
    }

    fn wallet(&self) -> ChainResult<&Wallet> {
        self.wallet.as_ref().ok_or(ChainError::SignerMissing)
    }

    /// Price for the first attempt.
    pub async fn initial_gas_price(&self) -> ChainResult<u128> {
        match self.rpc.gas_price().await {
            Ok(suggested) => {
                let suggested_gwei = suggested / gas::WEI_PER_GWEI;
                if suggested_gwei > self.config.max_gas_price_gwei as u128 {
                    return Err(ChainError::GasPriceTooHigh {
                        current_gwei: suggested_gwei as u64,
                        max_gwei: self.config.max_gas_price_gwei,
                    });
                }
                Ok(gas::with_margin(suggested, &self.config))
            }
            Err(e) => {
                let fallback = gas::fallback_price(&self.config);
                tracing::warn!(error = %e, fallback_wei = fallback, "Gas price lookup failed, using fallback");
                Ok(fallback)
            }
        }
    }

    /// Gas limit for `request` when sent from `from`.
    pub async fn gas_limit(&self, from: Address, request: &OperationRequest) -> ChainResult<u64> {
        match self
            .rpc
            .estimate_gas(from, request.contract, request.input.clone())
            .await
        {
            Ok(estimate) => Ok(gas::padded_limit(estimate, &self.config, request.batch_size)),
            Err(e @ ChainError::Reverted { .. }) => Err(e),
            Err(e) => {
                let fallback = gas::fallback_limit(&self.config, request.batch_size);
                tracing::warn!(
                    kind = %request.kind,
                    error = %e,
                    fallback_limit = fallback,
                    "Gas estimation failed, using fallback limit"
                );
                Ok(fallback)
            }
        }
    }

    /// Preview the cost of `request` without broadcasting.
    pub async fn quote(&self, request: &OperationRequest, payer: Address) -> ChainResult<GasQuote> {
        let gas_price = self.initial_gas_price().await?;
        let gas_limit = self.gas_limit(payer, request).await?;
        let balance = self.rpc.balance(payer).await?;
        Ok(GasQuote::new(gas_limit, gas_price, payer, balance))
    }

    /// Submit `request`, re-pricing on "underpriced" rejections.
    pub async fn submit(&self, request: OperationRequest) -> ChainResult<SubmittedTx> {
        let wallet = self.wallet()?;
        let from = wallet.address();
        let nonce = self.rpc.pending_nonce(from).await?;
        let mut gas_price = self.initial_gas_price().await?;
        let gas_limit = self.gas_limit(from, &request).await?;
        let max_attempts = self.config.max_attempts.max(1);
        let mut rejected: Vec<ChainOperation> = Vec::new();
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let signed = wallet
                .sign_call(request.contract, request.input.clone(), nonce, gas_price, gas_limit)
                .await?;
            let operation = ChainOperation::from_signed(&request, attempt, &signed);

            match self.rpc.send_raw_transaction(&signed).await {
                Ok(_) => {
                    tracing::info!(
                        intent_id = %request.intent_id,
                        kind = %request.kind,
                        tx_hash = %operation.tx_hash,
                        nonce = nonce,
                        gas_price = gas_price,
                        gas_limit = gas_limit,
                        attempt = attempt,
                        "Transaction broadcast"
                    );
                    metrics::record_tx_submitted(request.kind.as_str(), gas_price);
                    return Ok(SubmittedTx {
                        operation,
                        rejected,
                    });
                }
                Err(e) if e.is_underpriced() => {
                    last_error = e.to_string();
                    rejected.push(operation);
                    if attempt == max_attempts {
                        break;
                    }

                    let next_price = gas::bumped(gas_price, &self.config);
                    if next_price > gas::max_price(&self.config) {
                        metrics::record_tx_failure(request.kind.as_str(), "price_cap");
                        return Err(ChainError::GasPriceTooHigh {
                            current_gwei: (next_price / gas::WEI_PER_GWEI) as u64,
                            max_gwei: self.config.max_gas_price_gwei,
                        });
                    }

                    let backoff = Duration::from_millis(self.config.retry_backoff_ms * attempt as u64);
                    tracing::warn!(
                        intent_id = %request.intent_id,
                        kind = %request.kind,
                        attempt = attempt,
                        error = %e,
                        next_gas_price = next_price,
                        backoff_ms = backoff.as_millis() as u64,
                        "Broadcast underpriced, retrying with higher gas price"
                    );
                    metrics::record_tx_retry(request.kind.as_str());
                    tokio::time::sleep(backoff).await;
                    gas_price = next_price;
                }
                Err(e) => {
                    tracing::error!(
                        intent_id = %request.intent_id,
                        kind = %request.kind,
                        attempt = attempt,
                        error = %e,
                        "Broadcast rejected"
                    );
                    metrics::record_tx_failure(request.kind.as_str(), "rejected");
                    return Err(e);
                }
            }
        }

        tracing::error!(
            intent_id = %request.intent_id,
            kind = %request.kind,
            attempts = max_attempts,
            error = %last_error,
            "Broadcast retries exhausted"
        );
        metrics::record_tx_failure(request.kind.as_str(), "retries_exhausted");
        Err(ChainError::RetriesExhausted {
            attempts: max_attempts,
            last_error,
        })
    }
}

impl std::fmt::Debug for TxSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxSubmitter")
            .field("signer", &self.signer_address())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChain;
    use alloy::primitives::U256;
    use alloy::sol;

    sol! {
        function checkIn(uint256 eventId, address participant) external returns (uint256);
    }

    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn fast_config() -> SubmitterConfig {
        SubmitterConfig {
            retry_backoff_ms: 1,
            ..Default::default()
        }
    }

    fn submitter(chain: Arc<MockChain>, config: SubmitterConfig) -> TxSubmitter {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 31337).unwrap();
        TxSubmitter::new(chain, Some(wallet), config)
    }

    fn request() -> OperationRequest {
        OperationRequest::new(
            OperationKind::CheckIn,
            Address::repeat_byte(0xc1),
            &checkInCall {
                eventId: U256::from(42),
                participant: Address::repeat_byte(0xa1),
            },
        )
    }

    #[tokio::test]
    async fn test_submit_applies_margin_and_estimate() {
        let chain = Arc::new(MockChain::new(31337));
        chain.set_estimate(Ok(80_000));
        let submitted = submitter(chain.clone(), fast_config())
            .submit(request())
            .await
            .unwrap();

        assert_eq!(submitted.attempts(), 1);
        assert!(submitted.rejected.is_empty());
        assert_eq!(submitted.operation.gas_price, 24_000_000_000);
        assert_eq!(submitted.operation.gas_limit, 80_000);
        assert_eq!(chain.broadcasts().len(), 1);
    }

    #[tokio::test]
    async fn test_underpriced_retry_bumps_strictly() {
        let chain = Arc::new(MockChain::new(31337));
        chain.push_send_error("replacement transaction underpriced");
        chain.push_send_error("transaction underpriced");

        let submitted = submitter(chain.clone(), fast_config())
            .submit(request())
            .await
            .unwrap();

        assert_eq!(submitted.attempts(), 3);
        let mut prices: Vec<u128> = submitted.rejected.iter().map(|op| op.gas_price).collect();
        prices.push(submitted.operation.gas_price);
        assert!(prices.windows(2).all(|w| w[1] > w[0]), "prices {:?}", prices);
        assert!(submitted
            .rejected
            .iter()
            .all(|op| op.intent_id == submitted.operation.intent_id && op.nonce == 0));
    }

    #[tokio::test]
    async fn test_retries_exhausted_after_three_attempts() {
        let chain = Arc::new(MockChain::new(31337));
        for _ in 0..5 {
            chain.push_send_error("transaction underpriced");
        }

        let err = submitter(chain.clone(), fast_config())
            .submit(request())
            .await
            .unwrap_err();

        assert!(matches!(err, ChainError::RetriesExhausted { attempts: 3, .. }));
        assert!(chain.broadcasts().is_empty());
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let chain = Arc::new(MockChain::new(31337));
        chain.push_send_error("nonce too low");
        chain.push_send_error("transaction underpriced");

        let err = submitter(chain.clone(), fast_config())
            .submit(request())
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Rejected(ref m) if m == "nonce too low"));
    }

    #[tokio::test]
    async fn test_fallbacks_when_node_cannot_price() {
        let chain = Arc::new(MockChain::new(31337));
        chain.set_gas_price(None);
        chain.set_estimate(Err("header not found".to_string()));

        let submitted = submitter(chain, fast_config()).submit(request()).await.unwrap();
        assert_eq!(submitted.operation.gas_price, 20_000_000_000);
        assert_eq!(submitted.operation.gas_limit, 300_000);
    }

    #[tokio::test]
    async fn test_estimate_revert_is_terminal() {
        let chain = Arc::new(MockChain::new(31337));
        chain.revert_estimate::<checkInCall>("Event has not started");

        let err = submitter(chain.clone(), fast_config())
            .submit(request())
            .await
            .unwrap_err();
        assert_eq!(err.revert_kind(), Some(crate::contracts::RevertKind::NotStarted));
        assert!(chain.broadcasts().is_empty());
    }

    #[tokio::test]
    async fn test_price_above_cap_refused() {
        let chain = Arc::new(MockChain::new(31337));
        chain.set_gas_price(Some(600 * gas::WEI_PER_GWEI));
        let err = submitter(chain, fast_config()).submit(request()).await.unwrap_err();
        assert!(matches!(err, ChainError::GasPriceTooHigh { current_gwei: 600, max_gwei: 500 }));
    }

    #[tokio::test]
    async fn test_submit_without_signer() {
        let chain = Arc::new(MockChain::new(31337));
        let submitter = TxSubmitter::new(chain.clone(), None, fast_config());
        let err = submitter.submit(request()).await.unwrap_err();
        assert!(matches!(err, ChainError::SignerMissing));
        assert_eq!(chain.rpc_call_count(), 0);
    }

    #[tokio::test]
    async fn test_quote_reports_shortfall() {
        let chain = Arc::new(MockChain::new(31337));
        let payer = Address::repeat_byte(0xa1);
        chain.set_balance(payer, U256::from(1u64));
        chain.set_estimate(Ok(50_000));

        let submitter = TxSubmitter::new(chain, None, fast_config());
        let quote = submitter.quote(&request(), payer).await.unwrap();
        assert_eq!(quote.gas_limit, 50_000);
        assert!(!quote.is_sufficient);
    }
}

//! Orchestration façades: one business operation each.
//!
//! # Data Flow
//! ```text
//! façade call (event id, participant id, submission id)
//!     → phase + idempotency gates (store, then chain view)
//!     → registry request builder
//!     → ChainContext::broadcast           (submitter + ledger row)
//!     → provisional rows carrying the tx hash
//!          ├─ blocking:  wait_for_receipt → apply outcome → Completed
//!          │                  └─ no receipt by the deadline → spawn_detached
//!          └─ async:     spawn_detached → Processing
//!                            └─ outcome sink updates the rows
//! ```
//!
//! # Design Decisions
//! - One `ChainContext` per process, built from `AppConfig` and passed down;
//!   no global state
//! - Gates run before anything is signed, so a refused request costs no gas
//! - Once broadcast, a ledger write failure is logged, never returned
//! - A `Failed` row does not count as an existing result; the operation may
//!   be retried

pub mod checkin;
pub mod events;
pub mod nft;
pub mod votes;

#[cfg(test)]
mod testkit;

use alloy::primitives::{Address, TxHash, U256};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

use crate::chain::{BlockchainClient, ChainError, ChainResult, ChainRpc, TxReceipt, TxStatus, Wallet};
use crate::config::AppConfig;
use crate::confirmation::{spawn_recorder, ConfirmationOutcome, ConfirmationTracker, PendingConfirmation};
use crate::contracts::event_registry::created_event_id;
use crate::contracts::nft_registry::minted_tokens;
use crate::contracts::{parse_address, CheckInRegistry, EventRegistry, NftRegistry};
use crate::observability::metrics;
use crate::reconcile::Verifier;
use crate::store::{
    EventRow, EventStatus, OffChainStore, OutcomeUpdate, Participant, RecordStatus, StoreError,
    TransactionRecord,
};
use crate::submitter::{OperationRequest, SubmittedTx, TxSubmitter};

pub use checkin::{BatchCheckInReport, CheckInService, CheckInStatus, CheckInSummary};
pub use events::EventService;
pub use nft::{BatchMintReport, MintedToken, NftService, NftStatus, NftSummary};
pub use votes::{RevokeOutcome, VoteOutcome, VoteService};

/// Errors returned by the façades.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("event {0} not found")]
    EventNotFound(u64),

    #[error("event not on-chain")]
    EventNotOnChain,

    #[error("event already on-chain with id {0}")]
    EventAlreadyOnChain(u64),

    #[error("event is in '{actual}' phase, '{required}' required")]
    WrongPhase {
        required: &'static str,
        actual: &'static str,
    },

    #[error("participant {0} not found")]
    ParticipantNotFound(u64),

    #[error("submission {0} not found")]
    SubmissionNotFound(u64),

    #[error("participant has not checked in")]
    NotCheckedIn,

    #[error("already checked in")]
    AlreadyCheckedIn,

    #[error("participant already holds the event NFT")]
    AlreadyMinted,

    #[error("already voted")]
    AlreadyVoted,

    #[error("vote not found")]
    VoteNotFound,

    #[error("vote has no on-chain index and cannot be revoked on chain")]
    VoteNotOnChain,

    #[error("vote transaction {0} is not confirmed yet")]
    VotePending(TxHash),

    #[error("score {0} out of range 1-10")]
    InvalidScore(u64),

    #[error("event {0} already registered")]
    AlreadyRegistered(u64),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// What a façade call produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationResult {
    /// Confirmed before returning.
    Completed {
        tx_hash: TxHash,
        block_number: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        chain_assigned_id: Option<u64>,
    },
    /// Broadcast; confirmation continues in the background.
    Processing { tx_hash: TxHash },
}

impl OperationResult {
    fn completed(receipt: &TxReceipt) -> Self {
        OperationResult::Completed {
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            chain_assigned_id: None,
        }
    }

    pub fn tx_hash(&self) -> TxHash {
        match self {
            OperationResult::Completed { tx_hash, .. } | OperationResult::Processing { tx_hash } => *tx_hash,
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, OperationResult::Processing { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainStatus {
    pub chain_id: u64,
    pub block_number: u64,
    pub signer: Option<Address>,
    pub signer_balance_wei: Option<U256>,
    pub event_registry: Address,
    pub checkin_registry: Address,
    pub nft_registry: Address,
}

/// Shared chain access for every façade.
pub struct ChainContext {
    config: AppConfig,
    store: Arc<dyn OffChainStore>,
    rpc: Arc<dyn ChainRpc>,
    events: EventRegistry,
    checkins: CheckInRegistry,
    nfts: NftRegistry,
    submitter: TxSubmitter,
    tracker: ConfirmationTracker,
    outcomes: UnboundedSender<ConfirmationOutcome>,
    recorder: JoinHandle<()>,
}

impl ChainContext {
    /// Connect to the configured RPC endpoints.
    pub async fn connect(config: AppConfig, store: Arc<dyn OffChainStore>) -> ChainResult<Self> {
        let client = BlockchainClient::new(&config.chain).await?;
        Self::with_rpc(config, Arc::new(client), store)
    }

    /// Build over an existing RPC implementation. Must run inside a Tokio runtime.
    pub fn with_rpc(config: AppConfig, rpc: Arc<dyn ChainRpc>, store: Arc<dyn OffChainStore>) -> ChainResult<Self> {
        let wallet = match &config.chain.private_key {
            Some(key) => {
                let wallet = Wallet::from_private_key(key, config.chain.chain_id)?;
                tracing::info!(signer = %wallet.address(), "Signer configured");
                Some(wallet)
            }
            None => {
                tracing::warn!("No private key configured, running read-only");
                None
            }
        };

        let events = EventRegistry::new(parse_address(&config.contracts.event_registry)?, rpc.clone());
        let checkins = CheckInRegistry::new(parse_address(&config.contracts.checkin_registry)?, rpc.clone());
        let nfts = NftRegistry::new(parse_address(&config.contracts.nft_registry)?, rpc.clone());
        let submitter = TxSubmitter::new(rpc.clone(), wallet, config.submitter.clone());
        let tracker = ConfirmationTracker::new(rpc.clone(), config.confirmation.clone());

        let (outcomes, receiver) = mpsc::unbounded_channel();
        let recorder = spawn_recorder(store.clone(), receiver);

        Ok(Self {
            config,
            store,
            rpc,
            events,
            checkins,
            nfts,
            submitter,
            tracker,
            outcomes,
            recorder,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn OffChainStore> {
        &self.store
    }

    pub fn tracker(&self) -> &ConfirmationTracker {
        &self.tracker
    }

    pub fn signer_address(&self) -> Option<Address> {
        self.submitter.signer_address()
    }

    pub fn events(&self) -> EventService<'_> {
        EventService::new(self)
    }

    pub fn checkins(&self) -> CheckInService<'_> {
        CheckInService::new(self)
    }

    pub fn votes(&self) -> VoteService<'_> {
        VoteService::new(self)
    }

    pub fn nfts(&self) -> NftService<'_> {
        NftService::new(self)
    }

    pub fn verifier(&self) -> Verifier {
        Verifier::new(
            self.events.clone(),
            self.checkins.clone(),
            self.tracker.clone(),
            self.store.clone(),
            self.config.reconciliation.clone(),
        )
    }

    /// Node view plus the signer's balance, for operator health checks.
    pub async fn chain_status(&self) -> ChainResult<ChainStatus> {
        let chain_id = self.rpc.chain_id().await?;
        let block_number = self.rpc.block_number().await?;
        let signer = self.signer_address();
        let signer_balance_wei = match signer {
            Some(address) => Some(self.rpc.balance(address).await?),
            None => None,
        };
        Ok(ChainStatus {
            chain_id,
            block_number,
            signer,
            signer_balance_wei,
            event_registry: self.events.address(),
            checkin_registry: self.checkins.address(),
            nft_registry: self.nfts.address(),
        })
    }

    pub async fn tx_status(&self, tx_hash: TxHash) -> ChainResult<TxStatus> {
        self.tracker.status(tx_hash).await
    }

    /// Stop accepting outcomes and give in-flight confirmations up to `timeout`
    /// to land in the store.
    pub async fn drain(self, timeout: Duration) {
        let ChainContext { outcomes, recorder, .. } = self;
        drop(outcomes);
        match tokio::time::timeout(timeout, recorder).await {
            Ok(_) => tracing::debug!("Outcome recorder drained"),
            Err(_) => tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "Confirmations still in flight at shutdown, leaving records pending"
            ),
        }
    }

    async fn event_row(&self, event_id: u64) -> ServiceResult<EventRow> {
        self.store
            .event(event_id)
            .await?
            .ok_or(ServiceError::EventNotFound(event_id))
    }

    async fn on_chain_event(&self, event_id: u64) -> ServiceResult<EventRow> {
        let row = self.event_row(event_id).await?;
        if row.is_on_chain() {
            Ok(row)
        } else {
            Err(ServiceError::EventNotOnChain)
        }
    }

    /// The participant and their parsed wallet. A malformed address fails here,
    /// before any network call.
    async fn participant_wallet(&self, participant_id: u64) -> ServiceResult<(Participant, Address)> {
        let participant = self
            .store
            .participant(participant_id)
            .await?
            .ok_or(ServiceError::ParticipantNotFound(participant_id))?;
        let wallet = parse_address(&participant.wallet_address)?;
        Ok((participant, wallet))
    }

    /// Who pays for a quoted operation: the signer, else `fallback`.
    fn payer_or(&self, fallback: Address) -> Address {
        self.submitter.signer_address().unwrap_or(fallback)
    }

    /// Submit and write the pending ledger row.
    async fn broadcast(
        &self,
        entity_id: &str,
        request: OperationRequest,
        description: String,
    ) -> ServiceResult<SubmittedTx> {
        let kind = request.kind;
        let submitted = self.submitter.submit(request).await?;
        let record = TransactionRecord::pending(entity_id, submitted.tx_hash(), kind, description);
        if let Err(e) = self.store.record_transaction(record).await {
            tracing::warn!(
                entity_id = %entity_id,
                tx_hash = %submitted.tx_hash(),
                error = %e,
                "Failed to record transaction"
            );
        }
        Ok(submitted)
    }

    /// Broadcast and block until the receipt, applying the outcome to the ledger.
    async fn submit_and_confirm(
        &self,
        entity_id: &str,
        request: OperationRequest,
        description: String,
        timeout: Duration,
    ) -> ServiceResult<TxReceipt> {
        let submitted = self.broadcast(entity_id, request, description).await?;
        self.await_confirmation(entity_id, &submitted, timeout).await
    }

    /// Block until the receipt of a broadcast transaction and apply the outcome
    /// to the ledger and every row carrying its hash. When the wait ends
    /// without a receipt the transaction moves to a background poller, so
    /// provisional rows still resolve.
    async fn await_confirmation(
        &self,
        entity_id: &str,
        submitted: &SubmittedTx,
        timeout: Duration,
    ) -> ServiceResult<TxReceipt> {
        let kind = submitted.operation.kind;
        let tx_hash = submitted.tx_hash();
        let started = std::time::Instant::now();

        match self.tracker.wait_for_receipt(tx_hash, timeout).await {
            Ok(receipt) => {
                metrics::record_confirmation(kind.as_str(), "confirmed", started.elapsed().as_secs_f64());
                let mut update = OutcomeUpdate::new(tx_hash, RecordStatus::Confirmed, Some(receipt.block_number));
                update.chain_assigned_id = created_event_id(&receipt);
                update.minted = minted_tokens(&receipt);
                self.apply_outcome(update).await;
                Ok(receipt)
            }
            Err(ChainError::TxReverted { block_number, .. }) => {
                metrics::record_confirmation(kind.as_str(), "reverted", started.elapsed().as_secs_f64());
                self.apply_outcome(OutcomeUpdate::new(tx_hash, RecordStatus::Failed, Some(block_number)))
                    .await;
                tracing::error!(entity_id = %entity_id, kind = %kind, tx_hash = %tx_hash, "Transaction reverted");
                Err(ChainError::TxReverted { tx_hash, block_number }.into())
            }
            Err(e) => {
                metrics::record_confirmation(kind.as_str(), "unresolved", started.elapsed().as_secs_f64());
                tracing::warn!(
                    entity_id = %entity_id,
                    kind = %kind,
                    tx_hash = %tx_hash,
                    error = %e,
                    "Confirmation did not complete, continuing in background"
                );
                self.confirm_in_background(entity_id.to_string(), submitted);
                Err(e.into())
            }
        }
    }

    /// Hand a broadcast to a background poller.
    fn confirm_in_background(&self, entity_id: String, submitted: &SubmittedTx) {
        let pending = PendingConfirmation {
            tx_hash: submitted.tx_hash(),
            kind: submitted.operation.kind,
            entity_id,
            intent_id: submitted.operation.intent_id,
        };
        self.tracker.spawn_detached(pending, self.outcomes.clone());
    }

    async fn apply_outcome(&self, update: OutcomeUpdate) {
        let tx_hash = update.tx_hash;
        if let Err(e) = self.store.apply_outcome(update).await {
            tracing::warn!(tx_hash = %tx_hash, error = %e, "Failed to record transaction outcome");
        }
    }
}

impl std::fmt::Debug for ChainContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainContext")
            .field("chain_id", &self.config.chain.chain_id)
            .field("signer", &self.signer_address())
            .field("events", &self.events.address())
            .field("checkins", &self.checkins.address())
            .field("nfts", &self.nfts.address())
            .finish()
    }
}

/// Fail with `WrongPhase` unless `row` is in `required`.
fn require_phase(row: &EventRow, required: EventStatus) -> ServiceResult<()> {
    if row.status == required {
        Ok(())
    } else {
        Err(ServiceError::WrongPhase {
            required: required.as_str(),
            actual: row.status.as_str(),
        })
    }
}

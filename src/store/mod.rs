//! Off-chain store contract consumed by the façades.
//!
//! # Data Flow
//! ```text
//! CRUD layer ──(events, participants, submissions)──▶ OffChainStore
//! façades    ──(check-in / NFT / vote rows, tx ledger)──▶ OffChainStore
//! outcome recorder ──(confirmed | failed, token ids)──▶ OffChainStore
//! verifier   ◀──(read-only snapshots)── OffChainStore
//! ```
//!
//! # Design Decisions
//! - Rows that claim on-chain backing carry a `TxHash`, never a string
//! - Rows are provisional (`Pending`) until a receipt is observed
//! - The relational schema lives elsewhere; `MemoryStore` is the reference
//!   implementation used by the CLI and tests

pub mod memory;

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::submitter::OperationKind;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {key} already exists")]
    Conflict { entity: &'static str, key: String },

    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Event lifecycle phase, owned by the CRUD layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Preparation,
    Published,
    Registration,
    Checkin,
    TeamFormation,
    Submission,
    Voting,
    Results,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Preparation => "preparation",
            EventStatus::Published => "published",
            EventStatus::Registration => "registration",
            EventStatus::Checkin => "checkin",
            EventStatus::TeamFormation => "team_formation",
            EventStatus::Submission => "submission",
            EventStatus::Voting => "voting",
            EventStatus::Results => "results",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRow {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub location: String,
    pub start_time: u64,
    pub end_time: u64,
    pub status: EventStatus,
    /// 0 until the event has been created on chain.
    pub chain_event_id: u64,
    pub deleted: bool,
}

impl EventRow {
    pub fn is_on_chain(&self) -> bool {
        self.chain_event_id != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: u64,
    /// As entered by the user; validated before use.
    pub wallet_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRow {
    pub id: u64,
    pub event_id: u64,
    pub title: String,
    pub draft: bool,
}

/// Lifecycle of a row backed by a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Confirmed,
    Failed,
}

impl RecordStatus {
    /// A failed row no longer claims a result and may be replaced.
    pub fn is_failed(self) -> bool {
        self == RecordStatus::Failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinRecord {
    pub event_id: u64,
    pub participant_id: u64,
    pub wallet_address: Address,
    pub tx_hash: TxHash,
    pub status: RecordStatus,
    pub block_number: Option<u64>,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftRecord {
    pub event_id: u64,
    pub participant_id: u64,
    pub wallet_address: Address,
    /// Filled in from the `NFTMinted` log once the mint is confirmed.
    pub token_id: Option<U256>,
    pub tx_hash: TxHash,
    pub status: RecordStatus,
    pub minted_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Assigned by the store.
    pub id: u64,
    pub event_id: u64,
    pub participant_id: u64,
    pub submission_id: u64,
    pub voter_address: Address,
    pub score: u64,
    /// Position in the voter's on-chain list; `None` for off-chain-only votes.
    pub chain_vote_index: Option<u64>,
    pub tx_hash: Option<TxHash>,
    /// `Pending` until the vote transaction is mined. Off-chain-only votes
    /// are stored `Confirmed`.
    pub status: RecordStatus,
    pub revoked: bool,
    pub revoke_tx_hash: Option<TxHash>,
    pub created_at: u64,
}

/// Ledger entry for every transaction the core broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub entity_id: String,
    pub tx_hash: TxHash,
    pub kind: OperationKind,
    pub description: String,
    pub status: RecordStatus,
    pub chain_assigned_id: Option<u64>,
    pub token_id: Option<U256>,
    pub block_number: Option<u64>,
    pub created_at: u64,
}

impl TransactionRecord {
    pub fn pending(entity_id: impl Into<String>, tx_hash: TxHash, kind: OperationKind, description: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            tx_hash,
            kind,
            description: description.into(),
            status: RecordStatus::Pending,
            chain_assigned_id: None,
            token_id: None,
            block_number: None,
            created_at: unix_now(),
        }
    }
}

/// Final state of a transaction, applied to every row that references it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeUpdate {
    pub tx_hash: TxHash,
    pub status: RecordStatus,
    pub block_number: Option<u64>,
    pub chain_assigned_id: Option<u64>,
    /// `(participant wallet, token id)` pairs decoded from mint logs.
    pub minted: Vec<(Address, U256)>,
}

impl OutcomeUpdate {
    pub fn new(tx_hash: TxHash, status: RecordStatus, block_number: Option<u64>) -> Self {
        Self {
            tx_hash,
            status,
            block_number,
            chain_assigned_id: None,
            minted: Vec::new(),
        }
    }
}

#[async_trait]
pub trait OffChainStore: Send + Sync + 'static {
    async fn event(&self, event_id: u64) -> StoreResult<Option<EventRow>>;
    async fn upsert_event(&self, event: EventRow) -> StoreResult<()>;
    async fn set_chain_event_id(&self, event_id: u64, chain_event_id: u64) -> StoreResult<()>;
    async fn mark_event_deleted(&self, event_id: u64) -> StoreResult<()>;

    async fn participant(&self, participant_id: u64) -> StoreResult<Option<Participant>>;
    async fn upsert_participant(&self, participant: Participant) -> StoreResult<()>;

    async fn submission(&self, submission_id: u64) -> StoreResult<Option<SubmissionRow>>;
    async fn upsert_submission(&self, submission: SubmissionRow) -> StoreResult<()>;

    async fn checkin(&self, event_id: u64, participant_id: u64) -> StoreResult<Option<CheckinRecord>>;
    /// Fails with `Conflict` if the pair already has a row that is not `Failed`.
    async fn insert_checkin(&self, record: CheckinRecord) -> StoreResult<()>;
    async fn checkins_for_event(&self, event_id: u64) -> StoreResult<Vec<CheckinRecord>>;

    async fn nft_record(&self, event_id: u64, participant_id: u64) -> StoreResult<Option<NftRecord>>;
    /// Same replacement rule as `insert_checkin`.
    async fn insert_nft_record(&self, record: NftRecord) -> StoreResult<()>;
    async fn nft_records_for_event(&self, event_id: u64) -> StoreResult<Vec<NftRecord>>;

    /// The vote for (participant, submission) that is neither revoked nor failed.
    async fn active_vote(&self, participant_id: u64, submission_id: u64) -> StoreResult<Option<VoteRecord>>;
    /// Stores the vote and returns it with its assigned id.
    async fn insert_vote(&self, vote: VoteRecord) -> StoreResult<VoteRecord>;
    async fn mark_vote_revoked(&self, vote_id: u64, revoke_tx_hash: Option<TxHash>) -> StoreResult<()>;
    /// All votes for the event, revoked ones included.
    async fn votes_for_event(&self, event_id: u64) -> StoreResult<Vec<VoteRecord>>;

    async fn record_transaction(&self, record: TransactionRecord) -> StoreResult<()>;
    async fn transaction(&self, tx_hash: TxHash) -> StoreResult<Option<TransactionRecord>>;
    async fn transactions_for_entity(&self, entity_id: &str) -> StoreResult<Vec<TransactionRecord>>;
    /// Apply a final outcome to the ledger and to every row carrying the hash.
    async fn apply_outcome(&self, update: OutcomeUpdate) -> StoreResult<()>;
}

//! In-memory off-chain store with JSON snapshot persistence.

use alloy::primitives::TxHash;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::observability::metrics;
use crate::store::{
    CheckinRecord, EventRow, NftRecord, OffChainStore, OutcomeUpdate, Participant, RecordStatus,
    StoreError, StoreResult, SubmissionRow, TransactionRecord, VoteRecord,
};

#[derive(Default)]
struct Tables {
    events: DashMap<u64, EventRow>,
    participants: DashMap<u64, Participant>,
    submissions: DashMap<u64, SubmissionRow>,
    checkins: DashMap<(u64, u64), CheckinRecord>,
    nfts: DashMap<(u64, u64), NftRecord>,
    votes: DashMap<u64, VoteRecord>,
    transactions: DashMap<TxHash, TransactionRecord>,
    next_vote_id: AtomicU64,
}

/// Serialized form. Composite keys are rebuilt from the rows on load.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Snapshot {
    events: Vec<EventRow>,
    participants: Vec<Participant>,
    submissions: Vec<SubmissionRow>,
    checkins: Vec<CheckinRecord>,
    nfts: Vec<NftRecord>,
    votes: Vec<VoteRecord>,
    transactions: Vec<TransactionRecord>,
}

/// Thread-safe store; clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Tables>,
    persistence_path: Option<String>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new(persistence_path: Option<String>) -> Self {
        Self {
            inner: Arc::new(Tables::default()),
            persistence_path,
        }
    }

    /// Load from file if it exists; otherwise start empty with that path.
    pub fn load_from_file(path: &str) -> StoreResult<Self> {
        let store = Self::new(Some(path.to_string()));
        if Path::new(path).exists() {
            let reader = BufReader::new(File::open(path)?);
            let snapshot: Snapshot = serde_json::from_reader(reader)?;
            store.restore(snapshot);
            tracing::info!(
                path = %path,
                events = store.inner.events.len(),
                transactions = store.inner.transactions.len(),
                "Loaded off-chain store snapshot"
            );
        }
        Ok(store)
    }

    /// Write a snapshot if a path is configured.
    pub fn save_to_file(&self) -> StoreResult<()> {
        if let Some(path) = &self.persistence_path {
            let writer = BufWriter::new(File::create(path)?);
            let snapshot = self.snapshot();
            serde_json::to_writer_pretty(writer, &snapshot)?;
            tracing::info!(
                path = %path,
                transactions = snapshot.transactions.len(),
                "Saved off-chain store snapshot"
            );
        }
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        fn values<K: std::hash::Hash + Eq, V: Clone>(map: &DashMap<K, V>) -> Vec<V> {
            map.iter().map(|r| r.value().clone()).collect()
        }
        Snapshot {
            events: values(&self.inner.events),
            participants: values(&self.inner.participants),
            submissions: values(&self.inner.submissions),
            checkins: values(&self.inner.checkins),
            nfts: values(&self.inner.nfts),
            votes: values(&self.inner.votes),
            transactions: values(&self.inner.transactions),
        }
    }

    fn restore(&self, snapshot: Snapshot) {
        let tables = &self.inner;
        for row in snapshot.events {
            tables.events.insert(row.id, row);
        }
        for row in snapshot.participants {
            tables.participants.insert(row.id, row);
        }
        for row in snapshot.submissions {
            tables.submissions.insert(row.id, row);
        }
        for row in snapshot.checkins {
            tables.checkins.insert((row.event_id, row.participant_id), row);
        }
        for row in snapshot.nfts {
            tables.nfts.insert((row.event_id, row.participant_id), row);
        }
        let mut max_vote_id = 0;
        for row in snapshot.votes {
            max_vote_id = max_vote_id.max(row.id);
            tables.votes.insert(row.id, row);
        }
        tables.next_vote_id.store(max_vote_id, Ordering::SeqCst);
        for row in snapshot.transactions {
            tables.transactions.insert(row.tx_hash, row);
        }
    }
}

#[async_trait]
impl OffChainStore for MemoryStore {
    async fn event(&self, event_id: u64) -> StoreResult<Option<EventRow>> {
        Ok(self.inner.events.get(&event_id).map(|r| r.value().clone()))
    }

    async fn upsert_event(&self, event: EventRow) -> StoreResult<()> {
        self.inner.events.insert(event.id, event);
        Ok(())
    }

    async fn set_chain_event_id(&self, event_id: u64, chain_event_id: u64) -> StoreResult<()> {
        let mut row = self.inner.events.get_mut(&event_id).ok_or(StoreError::NotFound {
            entity: "event",
            key: event_id.to_string(),
        })?;
        row.chain_event_id = chain_event_id;
        Ok(())
    }

    async fn mark_event_deleted(&self, event_id: u64) -> StoreResult<()> {
        let mut row = self.inner.events.get_mut(&event_id).ok_or(StoreError::NotFound {
            entity: "event",
            key: event_id.to_string(),
        })?;
        row.deleted = true;
        Ok(())
    }

    async fn participant(&self, participant_id: u64) -> StoreResult<Option<Participant>> {
        Ok(self.inner.participants.get(&participant_id).map(|r| r.value().clone()))
    }

    async fn upsert_participant(&self, participant: Participant) -> StoreResult<()> {
        self.inner.participants.insert(participant.id, participant);
        Ok(())
    }

    async fn submission(&self, submission_id: u64) -> StoreResult<Option<SubmissionRow>> {
        Ok(self.inner.submissions.get(&submission_id).map(|r| r.value().clone()))
    }

    async fn upsert_submission(&self, submission: SubmissionRow) -> StoreResult<()> {
        self.inner.submissions.insert(submission.id, submission);
        Ok(())
    }

    async fn checkin(&self, event_id: u64, participant_id: u64) -> StoreResult<Option<CheckinRecord>> {
        Ok(self
            .inner
            .checkins
            .get(&(event_id, participant_id))
            .map(|r| r.value().clone()))
    }

    async fn insert_checkin(&self, record: CheckinRecord) -> StoreResult<()> {
        let key = (record.event_id, record.participant_id);
        match self.inner.checkins.entry(key) {
            Entry::Occupied(mut slot) if slot.get().status.is_failed() => {
                slot.insert(record);
                Ok(())
            }
            Entry::Occupied(_) => Err(StoreError::Conflict {
                entity: "checkin",
                key: format!("{}/{}", key.0, key.1),
            }),
            Entry::Vacant(slot) => {
                slot.insert(record);
                metrics::record_store_size("checkins", self.inner.checkins.len());
                Ok(())
            }
        }
    }

    async fn checkins_for_event(&self, event_id: u64) -> StoreResult<Vec<CheckinRecord>> {
        Ok(self
            .inner
            .checkins
            .iter()
            .filter(|r| r.key().0 == event_id)
            .map(|r| r.value().clone())
            .collect())
    }

    async fn nft_record(&self, event_id: u64, participant_id: u64) -> StoreResult<Option<NftRecord>> {
        Ok(self
            .inner
            .nfts
            .get(&(event_id, participant_id))
            .map(|r| r.value().clone()))
    }

    async fn insert_nft_record(&self, record: NftRecord) -> StoreResult<()> {
        let key = (record.event_id, record.participant_id);
        match self.inner.nfts.entry(key) {
            Entry::Occupied(mut slot) if slot.get().status.is_failed() => {
                slot.insert(record);
                Ok(())
            }
            Entry::Occupied(_) => Err(StoreError::Conflict {
                entity: "nft",
                key: format!("{}/{}", key.0, key.1),
            }),
            Entry::Vacant(slot) => {
                slot.insert(record);
                metrics::record_store_size("nfts", self.inner.nfts.len());
                Ok(())
            }
        }
    }

    async fn nft_records_for_event(&self, event_id: u64) -> StoreResult<Vec<NftRecord>> {
        Ok(self
            .inner
            .nfts
            .iter()
            .filter(|r| r.key().0 == event_id)
            .map(|r| r.value().clone())
            .collect())
    }

    async fn active_vote(&self, participant_id: u64, submission_id: u64) -> StoreResult<Option<VoteRecord>> {
        Ok(self
            .inner
            .votes
            .iter()
            .find(|r| {
                let v = r.value();
                v.participant_id == participant_id
                    && v.submission_id == submission_id
                    && !v.revoked
                    && !v.status.is_failed()
            })
            .map(|r| r.value().clone()))
    }

    async fn insert_vote(&self, mut vote: VoteRecord) -> StoreResult<VoteRecord> {
        vote.id = self.inner.next_vote_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.votes.insert(vote.id, vote.clone());
        metrics::record_store_size("votes", self.inner.votes.len());
        Ok(vote)
    }

    async fn mark_vote_revoked(&self, vote_id: u64, revoke_tx_hash: Option<TxHash>) -> StoreResult<()> {
        let mut row = self.inner.votes.get_mut(&vote_id).ok_or(StoreError::NotFound {
            entity: "vote",
            key: vote_id.to_string(),
        })?;
        row.revoked = true;
        row.revoke_tx_hash = revoke_tx_hash;
        Ok(())
    }

    async fn votes_for_event(&self, event_id: u64) -> StoreResult<Vec<VoteRecord>> {
        let mut votes: Vec<VoteRecord> = self
            .inner
            .votes
            .iter()
            .filter(|r| r.value().event_id == event_id)
            .map(|r| r.value().clone())
            .collect();
        votes.sort_by_key(|v| v.id);
        Ok(votes)
    }

    async fn record_transaction(&self, record: TransactionRecord) -> StoreResult<()> {
        self.inner.transactions.insert(record.tx_hash, record);
        metrics::record_store_size("transactions", self.inner.transactions.len());
        Ok(())
    }

    async fn transaction(&self, tx_hash: TxHash) -> StoreResult<Option<TransactionRecord>> {
        Ok(self.inner.transactions.get(&tx_hash).map(|r| r.value().clone()))
    }

    async fn transactions_for_entity(&self, entity_id: &str) -> StoreResult<Vec<TransactionRecord>> {
        let mut records: Vec<TransactionRecord> = self
            .inner
            .transactions
            .iter()
            .filter(|r| r.value().entity_id == entity_id)
            .map(|r| r.value().clone())
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn apply_outcome(&self, update: OutcomeUpdate) -> StoreResult<()> {
        let tables = &self.inner;

        if let Some(mut tx) = tables.transactions.get_mut(&update.tx_hash) {
            tx.status = update.status;
            tx.block_number = update.block_number;
            if update.chain_assigned_id.is_some() {
                tx.chain_assigned_id = update.chain_assigned_id;
            }
            if let [(_, token_id)] = update.minted.as_slice() {
                tx.token_id = Some(*token_id);
            }
        }

        for mut row in tables.checkins.iter_mut() {
            if row.tx_hash == update.tx_hash {
                row.status = update.status;
                row.block_number = update.block_number;
            }
        }

        for mut row in tables.votes.iter_mut() {
            if row.tx_hash == Some(update.tx_hash) {
                row.status = update.status;
            }
        }

        for mut row in tables.nfts.iter_mut() {
            if row.tx_hash != update.tx_hash {
                continue;
            }
            row.status = update.status;
            if update.status == RecordStatus::Confirmed {
                let wallet = row.wallet_address;
                if let Some((_, token_id)) = update.minted.iter().find(|(who, _)| *who == wallet) {
                    row.token_id = Some(*token_id);
                }
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("events", &self.inner.events.len())
            .field("transactions", &self.inner.transactions.len())
            .field("persistence_path", &self.persistence_path)
            .finish()
    }
}

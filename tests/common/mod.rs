//! Shared fixtures for integration tests: a fast config, a context over
//! `MockChain`, and seed rows.

#![allow(dead_code)]

use alloy::primitives::Address;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use hackathon_chain::chain::MockChain;
use hackathon_chain::config::{AppConfig, ConfirmationConfig, SubmitterConfig};
use hackathon_chain::store::{CheckinRecord, EventRow, EventStatus, Participant, RecordStatus, SubmissionRow};
use hackathon_chain::{ChainContext, MemoryStore, OffChainStore};

pub const CHAIN_ID: u64 = 31337;

/// First Anvil dev account.
pub const PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.chain.private_key = Some(PRIVATE_KEY.to_string());
    config.submitter = SubmitterConfig {
        retry_backoff_ms: 1,
        ..Default::default()
    };
    config.confirmation = ConfirmationConfig {
        poll_interval_ms: 5,
        blocking_timeout_secs: 1,
        batch_timeout_secs: 1,
        background_initial_delay_ms: 1,
        background_poll_interval_ms: 5,
        background_budget_secs: 2,
        ..Default::default()
    };
    config
}

pub fn setup() -> (ChainContext, Arc<MockChain>, Arc<MemoryStore>) {
    let chain = Arc::new(MockChain::new(CHAIN_ID));
    let store = Arc::new(MemoryStore::new(None));
    let ctx = ChainContext::with_rpc(fast_config(), chain.clone(), store.clone()).expect("context");
    (ctx, chain, store)
}

pub fn wallet(participant_id: u64) -> Address {
    Address::repeat_byte(0x40 + participant_id as u8)
}

pub async fn seed_event(store: &MemoryStore, id: u64, chain_event_id: u64, status: EventStatus) {
    store
        .upsert_event(EventRow {
            id,
            name: format!("Hackathon {}", id),
            description: "48 hours of building".to_string(),
            location: "Lisbon".to_string(),
            start_time: 1_700_000_000,
            end_time: 1_700_172_800,
            status,
            chain_event_id,
            deleted: false,
        })
        .await
        .unwrap();
}

pub async fn seed_participant(store: &MemoryStore, id: u64) {
    store
        .upsert_participant(Participant {
            id,
            wallet_address: wallet(id).to_string(),
        })
        .await
        .unwrap();
}

pub async fn seed_submission(store: &MemoryStore, id: u64, event_id: u64) {
    store
        .upsert_submission(SubmissionRow {
            id,
            event_id,
            title: format!("Project {}", id),
            draft: false,
        })
        .await
        .unwrap();
}

/// A confirmed check-in row, as left behind by an earlier check-in.
pub async fn seed_checkin(store: &MemoryStore, event_id: u64, participant_id: u64) {
    store
        .insert_checkin(CheckinRecord {
            event_id,
            participant_id,
            wallet_address: wallet(participant_id),
            tx_hash: alloy::primitives::TxHash::repeat_byte(participant_id as u8),
            status: RecordStatus::Confirmed,
            block_number: Some(100),
            created_at: 1_700_000_100,
        })
        .await
        .unwrap();
}

/// Poll `check` until it returns true or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

//! Shared fixtures for façade tests.

use alloy::primitives::Address;
use std::sync::Arc;

use crate::chain::MockChain;
use crate::config::{AppConfig, ConfirmationConfig, SubmitterConfig};
use crate::services::ChainContext;
use crate::store::{EventRow, EventStatus, MemoryStore, Participant, SubmissionRow};

pub const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.chain.private_key = Some(TEST_PRIVATE_KEY.to_string());
    config.submitter = SubmitterConfig {
        retry_backoff_ms: 1,
        ..Default::default()
    };
    config.confirmation = ConfirmationConfig {
        poll_interval_ms: 5,
        blocking_timeout_secs: 2,
        batch_timeout_secs: 2,
        background_initial_delay_ms: 1,
        background_poll_interval_ms: 5,
        background_budget_secs: 2,
        ..Default::default()
    };
    config
}

pub fn context(chain: Arc<MockChain>) -> (ChainContext, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new(None));
    let ctx = ChainContext::with_rpc(config(), chain, store.clone()).expect("context");
    (ctx, store)
}

pub fn event(id: u64, chain_event_id: u64) -> EventRow {
    EventRow {
        id,
        name: "Rust Hack".to_string(),
        description: "Build things".to_string(),
        location: "Berlin".to_string(),
        start_time: 1_700_000_000,
        end_time: 1_700_086_400,
        status: EventStatus::Preparation,
        chain_event_id,
        deleted: false,
    }
}

pub fn wallet(participant_id: u64) -> Address {
    Address::repeat_byte(0x10 + participant_id as u8)
}

pub fn participant(id: u64) -> Participant {
    Participant {
        id,
        wallet_address: wallet(id).to_string(),
    }
}

pub fn submission(id: u64, event_id: u64) -> SubmissionRow {
    SubmissionRow {
        id,
        event_id,
        title: format!("Project {}", id),
        draft: false,
    }
}

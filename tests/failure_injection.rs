//! Failure injection against the in-memory chain: rejected broadcasts,
//! reverts, stuck and dropped transactions, flaky receipt lookups.

use alloy::primitives::TxHash;
use std::sync::Arc;
use std::time::Duration;

use hackathon_chain::chain::{ChainError, MockChain, ReceiptPlan, TxStatus, Wallet};
use hackathon_chain::config::SubmitterConfig;
use hackathon_chain::contracts::{parse_address, EventRegistry};
use hackathon_chain::store::{EventStatus, OffChainStore, RecordStatus};
use hackathon_chain::submitter::TxSubmitter;
use hackathon_chain::ServiceError;

mod common;

fn submitter(chain: Arc<MockChain>) -> (TxSubmitter, EventRegistry) {
    let wallet = Wallet::from_private_key(common::PRIVATE_KEY, common::CHAIN_ID).unwrap();
    let config = SubmitterConfig {
        retry_backoff_ms: 1,
        ..Default::default()
    };
    let registry = EventRegistry::new(alloy::primitives::Address::repeat_byte(0xe1), chain.clone());
    (TxSubmitter::new(chain, Some(wallet), config), registry)
}

#[tokio::test]
async fn test_underpriced_retries_raise_price_strictly() {
    let chain = Arc::new(MockChain::new(common::CHAIN_ID));
    chain.push_send_error("replacement transaction underpriced");
    chain.push_send_error("transaction underpriced");
    let (submitter, registry) = submitter(chain.clone());

    let submitted = submitter.submit(registry.activate_event(3)).await.unwrap();
    assert_eq!(submitted.rejected.len(), 2);
    assert_eq!(submitted.operation.attempt, 3);

    let mut prices: Vec<u128> = submitted.rejected.iter().map(|op| op.gas_price).collect();
    prices.push(submitted.operation.gas_price);
    assert!(prices.windows(2).all(|w| w[1] > w[0]), "prices not increasing: {:?}", prices);

    // Same intent, same nonce across attempts.
    assert!(submitted
        .rejected
        .iter()
        .all(|op| op.intent_id == submitted.operation.intent_id && op.nonce == submitted.operation.nonce));
    assert_eq!(chain.broadcasts().len(), 1);
}

#[tokio::test]
async fn test_retries_exhausted_after_three_attempts() {
    let chain = Arc::new(MockChain::new(common::CHAIN_ID));
    for _ in 0..3 {
        chain.push_send_error("transaction underpriced");
    }
    let (submitter, registry) = submitter(chain.clone());

    let err = submitter.submit(registry.end_event(3)).await.unwrap_err();
    assert!(matches!(err, ChainError::RetriesExhausted { attempts: 3, .. }));
    assert!(chain.broadcasts().is_empty());
}

#[tokio::test]
async fn test_other_rejections_are_not_retried() {
    let chain = Arc::new(MockChain::new(common::CHAIN_ID));
    chain.push_send_error("nonce too low");
    chain.push_send_error("transaction underpriced");
    let (submitter, registry) = submitter(chain.clone());

    let err = submitter.submit(registry.end_event(3)).await.unwrap_err();
    assert!(matches!(err, ChainError::Rejected(_)));
    // The queued underpriced error is still waiting: only one attempt was made.
    let retry = submitter.submit(registry.end_event(3)).await;
    assert!(retry.is_ok());
}

#[tokio::test]
async fn test_revert_is_not_a_timeout() {
    let (ctx, chain, store) = common::setup();
    common::seed_event(&store, 5, 8, EventStatus::Results).await;
    chain.push_receipt_plan(ReceiptPlan::Revert { after_lookups: 1 });

    let err = ctx.events().end_event(5).await.unwrap_err();
    let ServiceError::Chain(ChainError::TxReverted { tx_hash, .. }) = err else {
        panic!("expected a revert, got {:?}", err);
    };
    let ledger = store.transaction(tx_hash).await.unwrap().unwrap();
    assert_eq!(ledger.status, RecordStatus::Failed);
    assert_eq!(ctx.tx_status(tx_hash).await.unwrap().label(), "reverted");
}

#[tokio::test]
async fn test_stuck_transaction_times_out_and_stays_pending() {
    let (ctx, chain, store) = common::setup();
    common::seed_event(&store, 5, 8, EventStatus::Results).await;
    chain.push_receipt_plan(ReceiptPlan::StuckInPool);

    let err = ctx.events().activate_event(5).await.unwrap_err();
    assert!(matches!(err, ServiceError::Chain(ChainError::ConfirmationTimeout { .. })));

    let tx_hash = chain.broadcasts()[0].hash;
    assert!(matches!(ctx.tx_status(tx_hash).await.unwrap(), TxStatus::Pending));
    let ledger = store.transaction(tx_hash).await.unwrap().unwrap();
    assert_eq!(ledger.status, RecordStatus::Pending);
}

#[tokio::test]
async fn test_dropped_transaction_is_unknown() {
    let (ctx, chain, store) = common::setup();
    common::seed_event(&store, 5, 8, EventStatus::Results).await;
    chain.push_receipt_plan(ReceiptPlan::Dropped);

    assert!(ctx.events().activate_event(5).await.is_err());
    let tx_hash = chain.broadcasts()[0].hash;
    assert!(matches!(ctx.tx_status(tx_hash).await.unwrap(), TxStatus::Unknown));
    assert!(matches!(
        ctx.tx_status(TxHash::repeat_byte(0x77)).await.unwrap(),
        TxStatus::Unknown
    ));
}

#[tokio::test]
async fn test_flaky_receipt_lookups_still_confirm() {
    let (ctx, chain, store) = common::setup();
    common::seed_event(&store, 5, 8, EventStatus::Results).await;
    chain.fail_receipt_lookups(3);

    let result = ctx.events().activate_event(5).await.unwrap();
    let ledger = store.transaction(result.tx_hash()).await.unwrap().unwrap();
    assert_eq!(ledger.status, RecordStatus::Confirmed);
}

#[tokio::test]
async fn test_unresolved_background_check_in_stays_pending() {
    let (ctx, chain, store) = common::setup();
    common::seed_event(&store, 42, 0, EventStatus::Checkin).await;
    common::seed_participant(&store, 1).await;
    chain.on_call::<hackathon_chain::contracts::checkin_registry::ICheckInRegistry::hasParticipantCheckedInCall>(|_| false);
    chain.push_receipt_plan(ReceiptPlan::StuckInPool);

    let result = ctx.checkins().check_in(42, 1).await.unwrap();
    assert!(result.is_processing());

    // Budget is two seconds in the fast config.
    ctx.drain(Duration::from_secs(5)).await;
    let row = store.checkin(42, 1).await.unwrap().unwrap();
    assert_eq!(row.status, RecordStatus::Pending);
}

#[tokio::test]
async fn test_timed_out_vote_is_not_cast_twice() {
    let (ctx, chain, store) = common::setup();
    common::seed_event(&store, 7, 3, EventStatus::Voting).await;
    common::seed_participant(&store, 1).await;
    common::seed_submission(&store, 55, 7).await;
    common::seed_checkin(&store, 7, 1).await;
    chain.on_call::<hackathon_chain::contracts::checkin_registry::ICheckInRegistry::hasParticipantCheckedInCall>(|_| true);
    chain.on_call::<hackathon_chain::contracts::event_registry::IEventRegistry::getUserVotesCall>(|_| Vec::new());
    chain.push_receipt_plan(ReceiptPlan::StuckInPool);

    let err = ctx.votes().vote(7, 1, 55, None).await.unwrap_err();
    assert!(matches!(err, ServiceError::Chain(ChainError::ConfirmationTimeout { .. })));

    let err = ctx.votes().vote(7, 1, 55, None).await.unwrap_err();
    assert_eq!(err.to_string(), "already voted");
    assert_eq!(chain.broadcasts().len(), 1);

    let stored = store.votes_for_event(7).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].chain_vote_index, Some(0));
    assert_eq!(stored[0].status, RecordStatus::Pending);
}

#[test]
fn test_address_round_trip() {
    let lower = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
    let address = parse_address(lower).unwrap();
    let checksummed = address.to_string();
    assert_eq!(checksummed, "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    assert_eq!(parse_address(&checksummed).unwrap(), address);
    assert!(parse_address("0x1234").is_err());
}

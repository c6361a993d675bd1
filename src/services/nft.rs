//! Participation NFTs, keyed by platform event id. Minting requires a stored check-in.

use alloy::primitives::{Address, TxHash, U256};
use serde::Serialize;
use std::collections::HashMap;

use crate::contracts::nft_registry::{minted_tokens, EventNFT};
use crate::contracts::parse_address;
use crate::services::{ChainContext, OperationResult, ServiceError, ServiceResult};
use crate::store::{unix_now, NftRecord, RecordStatus, StoreError};

fn entity_id(event_id: u64, participant_id: u64) -> String {
    format!("nft:{}:{}", event_id, participant_id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NftStatus {
    pub off_chain: bool,
    pub on_chain: bool,
    pub token_id: Option<U256>,
    pub tx_hash: Option<TxHash>,
    pub record_status: Option<RecordStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintedToken {
    pub participant_id: u64,
    pub wallet: Address,
    /// `None` if the receipt carried no `NFTMinted` log for this wallet.
    pub token_id: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchMintReport {
    /// `None` when nobody was eligible.
    pub tx_hash: Option<TxHash>,
    pub block_number: Option<u64>,
    pub minted: Vec<MintedToken>,
    pub skipped: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NftSummary {
    pub event_id: u64,
    pub registered: bool,
    pub on_chain_count: u64,
    pub token_ids: Vec<U256>,
    pub stored_count: usize,
    pub total_supply: U256,
}

#[derive(Debug)]
pub struct NftService<'a> {
    ctx: &'a ChainContext,
}

impl<'a> NftService<'a> {
    pub(crate) fn new(ctx: &'a ChainContext) -> Self {
        Self { ctx }
    }

    /// Register the event with the NFT registry.
    pub async fn register_event(&self, event_id: u64) -> ServiceResult<OperationResult> {
        self.ctx.event_row(event_id).await?;
        if self.ctx.nfts.is_event_registered(event_id).await? {
            return Err(ServiceError::AlreadyRegistered(event_id));
        }
        let request = self.ctx.nfts.register_event(event_id);
        let receipt = self
            .ctx
            .submit_and_confirm(
                &format!("event:{}", event_id),
                request,
                format!("register event {} for NFTs", event_id),
                self.ctx.tracker.batch_timeout(),
            )
            .await?;
        Ok(OperationResult::completed(&receipt))
    }

    pub async fn authorize_organizer(&self, organizer: &str, authorized: bool) -> ServiceResult<OperationResult> {
        let organizer = parse_address(organizer)?;
        let request = self.ctx.nfts.authorize_organizer(organizer, authorized);
        let receipt = self
            .ctx
            .submit_and_confirm(
                &format!("organizer:{}", organizer),
                request,
                format!("set NFT organizer {} authorized={}", organizer, authorized),
                self.ctx.tracker.batch_timeout(),
            )
            .await?;
        Ok(OperationResult::completed(&receipt))
    }

    /// Mint the participant's NFT. Returns once broadcast; the token id is
    /// filled in when the background confirmation lands.
    pub async fn mint(&self, event_id: u64, participant_id: u64) -> ServiceResult<OperationResult> {
        self.ctx.event_row(event_id).await?;
        let (_, wallet) = self.ctx.participant_wallet(participant_id).await?;

        if self.ctx.checkins().live_checkin(event_id, participant_id).await?.is_none() {
            return Err(ServiceError::NotCheckedIn);
        }
        if self.live_record(event_id, participant_id).await?.is_some() {
            return Err(ServiceError::AlreadyMinted);
        }
        if self.ctx.nfts.has_nft(event_id, wallet).await? {
            return Err(ServiceError::AlreadyMinted);
        }

        let entity = entity_id(event_id, participant_id);
        let request = self.ctx.nfts.mint(event_id, wallet);
        let submitted = self
            .ctx
            .broadcast(&entity, request, format!("mint event {} NFT for {}", event_id, wallet))
            .await?;

        let record = NftRecord {
            event_id,
            participant_id,
            wallet_address: wallet,
            token_id: None,
            tx_hash: submitted.tx_hash(),
            status: RecordStatus::Pending,
            minted_at: unix_now(),
        };
        match self.ctx.store.insert_nft_record(record).await {
            Ok(()) => {}
            Err(StoreError::Conflict { .. }) => return Err(ServiceError::AlreadyMinted),
            Err(e) => return Err(e.into()),
        }

        self.ctx.confirm_in_background(entity, &submitted);
        tracing::info!(event_id, participant_id, tx_hash = %submitted.tx_hash(), "NFT mint broadcast");
        Ok(OperationResult::Processing {
            tx_hash: submitted.tx_hash(),
        })
    }

    /// Mint for every checked-in participant who does not hold the NFT yet.
    /// Blocks on confirmation and records token ids from the receipt logs.
    pub async fn batch_mint_for_checked_in(&self, event_id: u64) -> ServiceResult<BatchMintReport> {
        self.ctx.event_row(event_id).await?;

        let mut skipped = Vec::new();
        let mut eligible: Vec<(u64, Address)> = Vec::new();
        for checkin in self.ctx.store.checkins_for_event(event_id).await? {
            if checkin.status.is_failed() {
                continue;
            }
            let participant_id = checkin.participant_id;
            if self.live_record(event_id, participant_id).await?.is_some() {
                skipped.push(participant_id);
                continue;
            }
            match self.ctx.nfts.has_nft(event_id, checkin.wallet_address).await {
                Ok(false) => eligible.push((participant_id, checkin.wallet_address)),
                Ok(true) => skipped.push(participant_id),
                Err(e) => {
                    tracing::warn!(
                        event_id,
                        participant_id,
                        error = %e,
                        "NFT ownership lookup failed, skipping participant"
                    );
                    skipped.push(participant_id);
                }
            }
        }

        if eligible.is_empty() {
            return Ok(BatchMintReport {
                tx_hash: None,
                block_number: None,
                minted: Vec::new(),
                skipped,
            });
        }

        let entity = format!("event:{}", event_id);
        let request = self
            .ctx
            .nfts
            .batch_mint(event_id, eligible.iter().map(|(_, w)| *w).collect());
        let submitted = self
            .ctx
            .broadcast(
                &entity,
                request,
                format!("batch mint {} NFTs for event {}", eligible.len(), event_id),
            )
            .await?;

        // Pending rows first; the confirmed outcome fills in their token ids.
        let mut recorded = Vec::with_capacity(eligible.len());
        for (participant_id, wallet) in eligible {
            let record = NftRecord {
                event_id,
                participant_id,
                wallet_address: wallet,
                token_id: None,
                tx_hash: submitted.tx_hash(),
                status: RecordStatus::Pending,
                minted_at: unix_now(),
            };
            match self.ctx.store.insert_nft_record(record).await {
                Ok(()) => recorded.push((participant_id, wallet)),
                Err(StoreError::Conflict { .. }) => skipped.push(participant_id),
                Err(e) => {
                    tracing::warn!(
                        event_id,
                        participant_id,
                        tx_hash = %submitted.tx_hash(),
                        error = %e,
                        "Failed to record batch mint"
                    );
                    recorded.push((participant_id, wallet));
                }
            }
        }

        let receipt = self
            .ctx
            .await_confirmation(&entity, &submitted, self.ctx.tracker.batch_timeout())
            .await?;

        let tokens: HashMap<Address, U256> = minted_tokens(&receipt).into_iter().collect();
        let minted: Vec<MintedToken> = recorded
            .into_iter()
            .map(|(participant_id, wallet)| MintedToken {
                participant_id,
                wallet,
                token_id: tokens.get(&wallet).copied(),
            })
            .collect();

        tracing::info!(
            event_id,
            minted = minted.len(),
            skipped = skipped.len(),
            tx_hash = %receipt.tx_hash,
            "Batch mint confirmed"
        );
        Ok(BatchMintReport {
            tx_hash: Some(receipt.tx_hash),
            block_number: Some(receipt.block_number),
            minted,
            skipped,
        })
    }

    /// The stored NFT row unless its mint failed.
    async fn live_record(&self, event_id: u64, participant_id: u64) -> ServiceResult<Option<NftRecord>> {
        let row = self.ctx.store.nft_record(event_id, participant_id).await?;
        Ok(row.filter(|r| !r.status.is_failed()))
    }

    pub async fn nft_status(&self, event_id: u64, participant_id: u64) -> ServiceResult<NftStatus> {
        let (_, wallet) = self.ctx.participant_wallet(participant_id).await?;
        let stored = self.ctx.store.nft_record(event_id, participant_id).await?;
        let on_chain = self.ctx.nfts.has_nft(event_id, wallet).await?;
        let token_id = match stored.as_ref().and_then(|r| r.token_id) {
            Some(id) => Some(id),
            None if on_chain => Some(self.ctx.nfts.participant_token_id(event_id, wallet).await?),
            None => None,
        };

        Ok(NftStatus {
            off_chain: stored.is_some(),
            on_chain,
            token_id,
            tx_hash: stored.as_ref().map(|r| r.tx_hash),
            record_status: stored.as_ref().map(|r| r.status),
        })
    }

    pub async fn event_summary(&self, event_id: u64) -> ServiceResult<NftSummary> {
        self.ctx.event_row(event_id).await?;
        Ok(NftSummary {
            event_id,
            registered: self.ctx.nfts.is_event_registered(event_id).await?,
            on_chain_count: self.ctx.nfts.event_nft_count(event_id).await?,
            token_ids: self.ctx.nfts.event_token_ids(event_id).await?,
            stored_count: self.ctx.store.nft_records_for_event(event_id).await?.len(),
            total_supply: self.ctx.nfts.total_supply().await?,
        })
    }

    pub async fn event_nfts(&self, event_id: u64) -> ServiceResult<Vec<EventNFT>> {
        Ok(self.ctx.nfts.event_nfts(event_id).await?)
    }

    pub async fn event_nft_count(&self, event_id: u64) -> ServiceResult<u64> {
        Ok(self.ctx.nfts.event_nft_count(event_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainError, MockChain, ReceiptPlan};
    use crate::contracts::nft_registry::{INftRegistry, NFTMinted};
    use crate::services::testkit;
    use crate::store::{CheckinRecord, MemoryStore, OffChainStore};
    use alloy::sol_types::{SolCall, SolEvent};
    use std::sync::Arc;
    use std::time::Duration;

    async fn seed(store: &MemoryStore, participants: &[u64]) {
        store.upsert_event(testkit::event(5, 9)).await.unwrap();
        for &id in participants {
            store.upsert_participant(testkit::participant(id)).await.unwrap();
            store
                .insert_checkin(CheckinRecord {
                    event_id: 5,
                    participant_id: id,
                    wallet_address: testkit::wallet(id),
                    tx_hash: TxHash::repeat_byte(id as u8),
                    status: RecordStatus::Confirmed,
                    block_number: Some(101),
                    created_at: 1,
                })
                .await
                .unwrap();
        }
    }

    fn mint_log(wallet: Address, token: u64) -> alloy::primitives::LogData {
        NFTMinted {
            eventId: U256::from(5),
            tokenId: U256::from(token),
            participant: wallet,
            organizer: Address::ZERO,
            timestamp: U256::ZERO,
        }
        .encode_log_data()
    }

    #[tokio::test]
    async fn test_mint_requires_check_in() {
        let chain = Arc::new(MockChain::new(31337));
        let (ctx, store) = testkit::context(chain.clone());
        store.upsert_event(testkit::event(5, 9)).await.unwrap();
        store.upsert_participant(testkit::participant(1)).await.unwrap();

        let err = ctx.nfts().mint(5, 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotCheckedIn));
        assert_eq!(chain.rpc_call_count(), 0);
    }

    #[tokio::test]
    async fn test_mint_is_idempotent() {
        let chain = Arc::new(MockChain::new(31337));
        chain.on_call::<INftRegistry::hasParticipantNFTCall>(|_| false);
        chain.on_transaction::<INftRegistry::mintEventNFTCall>(|call| Ok(vec![mint_log(call.participant, 77)]));
        let (ctx, store) = testkit::context(chain.clone());
        seed(&store, &[1]).await;

        let result = ctx.nfts().mint(5, 1).await.unwrap();
        assert!(result.is_processing());
        let err = ctx.nfts().mint(5, 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyMinted));
        assert_eq!(chain.broadcasts().len(), 1);

        let mut token = None;
        for _ in 0..200 {
            token = store.nft_record(5, 1).await.unwrap().and_then(|r| r.token_id);
            if token.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(token, Some(U256::from(77)));
    }

    #[tokio::test]
    async fn test_mint_refused_when_chain_has_token() {
        let chain = Arc::new(MockChain::new(31337));
        chain.on_call::<INftRegistry::hasParticipantNFTCall>(|_| true);
        let (ctx, store) = testkit::context(chain.clone());
        seed(&store, &[1]).await;

        let err = ctx.nfts().mint(5, 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyMinted));
        assert!(chain.broadcasts().is_empty());
    }

    #[tokio::test]
    async fn test_batch_mint_skips_holders_and_failed_lookups() {
        let chain = Arc::new(MockChain::new(31337));
        let holder = testkit::wallet(2);
        chain.on_call::<INftRegistry::hasParticipantNFTCall>(move |call| call.participant == holder);
        chain.on_transaction::<INftRegistry::batchMintEventNFTCall>(|call| {
            Ok(call
                .participants
                .iter()
                .enumerate()
                .map(|(i, who)| mint_log(*who, 100 + i as u64))
                .collect())
        });
        let (ctx, store) = testkit::context(chain.clone());
        seed(&store, &[1, 2, 3]).await;

        let report = ctx.nfts().batch_mint_for_checked_in(5).await.unwrap();
        assert!(report.tx_hash.is_some());
        assert_eq!(report.skipped, vec![2]);
        let mut minted: Vec<u64> = report.minted.iter().map(|m| m.participant_id).collect();
        minted.sort_unstable();
        assert_eq!(minted, vec![1, 3]);
        assert!(report.minted.iter().all(|m| m.token_id.is_some()));

        let sent = INftRegistry::batchMintEventNFTCall::abi_decode(&chain.broadcasts()[0].input).unwrap();
        assert_eq!(sent.participants.len(), 2);

        let again = ctx.nfts().batch_mint_for_checked_in(5).await.unwrap();
        assert!(again.tx_hash.is_none());
        assert_eq!(chain.broadcasts().len(), 1);
    }

    #[tokio::test]
    async fn test_nft_status_reads_token_from_chain() {
        let chain = Arc::new(MockChain::new(31337));
        chain.on_call::<INftRegistry::hasParticipantNFTCall>(|_| true);
        chain.on_call::<INftRegistry::getParticipantNFTTokenIdCall>(|_| U256::from(12));
        let (ctx, store) = testkit::context(chain);
        seed(&store, &[1]).await;

        let status = ctx.nfts().nft_status(5, 1).await.unwrap();
        assert!(status.on_chain);
        assert!(!status.off_chain);
        assert_eq!(status.token_id, Some(U256::from(12)));
    }

    #[tokio::test]
    async fn test_event_summary() {
        let chain = Arc::new(MockChain::new(31337));
        chain.on_call::<INftRegistry::isEventRegisteredCall>(|_| true);
        chain.on_call::<INftRegistry::getEventNFTCountCall>(|_| U256::from(2));
        chain.on_call::<INftRegistry::getEventNFTTokenIdsCall>(|_| vec![U256::from(4), U256::from(9)]);
        chain.on_call::<INftRegistry::totalSupplyCall>(|_| U256::from(30));
        let (ctx, store) = testkit::context(chain);
        seed(&store, &[1]).await;

        let summary = ctx.nfts().event_summary(5).await.unwrap();
        assert_eq!(summary.on_chain_count, 2);
        assert_eq!(summary.token_ids, vec![U256::from(4), U256::from(9)]);
        assert_eq!(summary.stored_count, 0);
        assert_eq!(summary.total_supply, U256::from(30));
    }

    #[tokio::test]
    async fn test_failed_mint_can_be_retried() {
        let chain = Arc::new(MockChain::new(31337));
        chain.on_call::<INftRegistry::hasParticipantNFTCall>(|_| false);
        chain.push_receipt_plan(ReceiptPlan::Revert { after_lookups: 0 });
        let (ctx, store) = testkit::context(chain.clone());
        seed(&store, &[1]).await;

        ctx.nfts().mint(5, 1).await.unwrap();
        let mut status = None;
        for _ in 0..200 {
            status = store.nft_record(5, 1).await.unwrap().map(|r| r.status);
            if status == Some(RecordStatus::Failed) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, Some(RecordStatus::Failed));

        let retry = ctx.nfts().mint(5, 1).await.unwrap();
        assert_eq!(chain.broadcasts().len(), 2);
        assert_eq!(store.nft_record(5, 1).await.unwrap().unwrap().tx_hash, retry.tx_hash());
    }

    #[tokio::test]
    async fn test_batch_mint_timeout_keeps_pending_rows() {
        let chain = Arc::new(MockChain::new(31337));
        chain.on_call::<INftRegistry::hasParticipantNFTCall>(|_| false);
        chain.push_receipt_plan(ReceiptPlan::StuckInPool);
        let (ctx, store) = testkit::context(chain.clone());
        seed(&store, &[1, 2]).await;

        let err = ctx.nfts().batch_mint_for_checked_in(5).await.unwrap_err();
        assert!(matches!(err, ServiceError::Chain(ChainError::ConfirmationTimeout { .. })));
        let rows = store.nft_records_for_event(5).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows
            .iter()
            .all(|r| r.status == RecordStatus::Pending && r.tx_hash == chain.broadcasts()[0].hash));

        let mut again = ctx.nfts().batch_mint_for_checked_in(5).await.unwrap();
        assert!(again.tx_hash.is_none());
        again.skipped.sort_unstable();
        assert_eq!(again.skipped, vec![1, 2]);
        assert!(matches!(ctx.nfts().mint(5, 1).await.unwrap_err(), ServiceError::AlreadyMinted));
        assert_eq!(chain.broadcasts().len(), 1);
    }
}

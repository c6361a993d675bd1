//! Check-ins against the check-in registry, keyed by platform event id.

use alloy::primitives::{Address, TxHash};
use serde::Serialize;

use crate::contracts::parse_address;
use crate::services::{require_phase, ChainContext, OperationResult, ServiceError, ServiceResult};
use crate::store::{unix_now, CheckinRecord, EventStatus, RecordStatus, StoreError};
use crate::submitter::GasQuote;

fn entity_id(event_id: u64, participant_id: u64) -> String {
    format!("checkin:{}:{}", event_id, participant_id)
}

/// Combined off-chain and on-chain view of one participant's check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckInStatus {
    /// True only when both sides agree.
    pub checked_in: bool,
    pub off_chain: bool,
    pub on_chain: bool,
    pub checked_in_at: Option<u64>,
    pub tx_hash: Option<TxHash>,
    pub record_status: Option<RecordStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchCheckInReport {
    /// `None` when every participant was already checked in.
    pub tx_hash: Option<TxHash>,
    pub block_number: Option<u64>,
    pub checked_in: Vec<u64>,
    pub skipped: Vec<u64>,
}

/// Registry-wide counters next to the stored row count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckInSummary {
    pub event_id: u64,
    pub registered: bool,
    pub on_chain_count: u64,
    pub unique_participants: u64,
    pub last_check_in_time: u64,
    pub stored_count: usize,
}

#[derive(Debug)]
pub struct CheckInService<'a> {
    ctx: &'a ChainContext,
}

impl<'a> CheckInService<'a> {
    pub(crate) fn new(ctx: &'a ChainContext) -> Self {
        Self { ctx }
    }

    /// Register the event with the check-in registry.
    pub async fn register_event(&self, event_id: u64) -> ServiceResult<OperationResult> {
        self.ctx.event_row(event_id).await?;
        if self.ctx.checkins.is_event_registered(event_id).await? {
            return Err(ServiceError::AlreadyRegistered(event_id));
        }
        let request = self.ctx.checkins.register_event(event_id);
        let receipt = self
            .ctx
            .submit_and_confirm(
                &format!("event:{}", event_id),
                request,
                format!("register event {} for check-in", event_id),
                self.ctx.tracker.batch_timeout(),
            )
            .await?;
        Ok(OperationResult::completed(&receipt))
    }

    pub async fn authorize_organizer(&self, organizer: &str, authorized: bool) -> ServiceResult<OperationResult> {
        let organizer = parse_address(organizer)?;
        let request = self.ctx.checkins.authorize_organizer(organizer, authorized);
        let receipt = self
            .ctx
            .submit_and_confirm(
                &format!("organizer:{}", organizer),
                request,
                format!("set check-in organizer {} authorized={}", organizer, authorized),
                self.ctx.tracker.batch_timeout(),
            )
            .await?;
        Ok(OperationResult::completed(&receipt))
    }

    /// Check a participant in. Returns as soon as the transaction is in the pool;
    /// the provisional row is confirmed in the background.
    pub async fn check_in(&self, event_id: u64, participant_id: u64) -> ServiceResult<OperationResult> {
        let row = self.ctx.event_row(event_id).await?;
        require_phase(&row, EventStatus::Checkin)?;
        let (_, wallet) = self.ctx.participant_wallet(participant_id).await?;

        if self.live_checkin(event_id, participant_id).await?.is_some() {
            return Err(ServiceError::AlreadyCheckedIn);
        }
        if self.ctx.checkins.has_checked_in(event_id, wallet).await? {
            return Err(ServiceError::AlreadyCheckedIn);
        }

        let entity = entity_id(event_id, participant_id);
        let request = self.ctx.checkins.check_in(event_id, wallet);
        let submitted = self
            .ctx
            .broadcast(&entity, request, format!("check in {} to event {}", wallet, event_id))
            .await?;

        let record = CheckinRecord {
            event_id,
            participant_id,
            wallet_address: wallet,
            tx_hash: submitted.tx_hash(),
            status: RecordStatus::Pending,
            block_number: None,
            created_at: unix_now(),
        };
        match self.ctx.store.insert_checkin(record).await {
            Ok(()) => {}
            Err(StoreError::Conflict { .. }) => return Err(ServiceError::AlreadyCheckedIn),
            Err(e) => return Err(e.into()),
        }

        self.ctx.confirm_in_background(entity, &submitted);
        tracing::info!(
            event_id,
            participant_id,
            tx_hash = %submitted.tx_hash(),
            "Check-in broadcast, confirming in background"
        );
        Ok(OperationResult::Processing {
            tx_hash: submitted.tx_hash(),
        })
    }

    /// Check in several participants in one transaction, skipping those already
    /// checked in on either side. Blocks on confirmation.
    pub async fn batch_check_in(&self, event_id: u64, participant_ids: &[u64]) -> ServiceResult<BatchCheckInReport> {
        let row = self.ctx.event_row(event_id).await?;
        require_phase(&row, EventStatus::Checkin)?;

        let mut skipped = Vec::new();
        let mut candidates: Vec<(u64, Address)> = Vec::new();
        for &participant_id in participant_ids {
            let (_, wallet) = self.ctx.participant_wallet(participant_id).await?;
            if self.live_checkin(event_id, participant_id).await?.is_some() {
                skipped.push(participant_id);
            } else {
                candidates.push((participant_id, wallet));
            }
        }

        let on_chain = if candidates.is_empty() {
            Vec::new()
        } else {
            let wallets = candidates.iter().map(|(_, w)| *w).collect();
            self.ctx.checkins.batch_status(event_id, wallets).await?
        };
        let mut pending = Vec::new();
        for (i, candidate) in candidates.into_iter().enumerate() {
            if on_chain.get(i).copied().unwrap_or(false) {
                skipped.push(candidate.0);
            } else {
                pending.push(candidate);
            }
        }

        if pending.is_empty() {
            return Ok(BatchCheckInReport {
                tx_hash: None,
                block_number: None,
                checked_in: Vec::new(),
                skipped,
            });
        }

        let entity = format!("event:{}", event_id);
        let request = self
            .ctx
            .checkins
            .batch_check_in(event_id, pending.iter().map(|(_, w)| *w).collect());
        let submitted = self
            .ctx
            .broadcast(
                &entity,
                request,
                format!("batch check-in of {} participants to event {}", pending.len(), event_id),
            )
            .await?;

        // Rows go in before the wait; a timeout leaves them pending on this hash.
        let mut checked_in = Vec::with_capacity(pending.len());
        for (participant_id, wallet) in pending {
            let record = CheckinRecord {
                event_id,
                participant_id,
                wallet_address: wallet,
                tx_hash: submitted.tx_hash(),
                status: RecordStatus::Pending,
                block_number: None,
                created_at: unix_now(),
            };
            match self.ctx.store.insert_checkin(record).await {
                Ok(()) => checked_in.push(participant_id),
                Err(StoreError::Conflict { .. }) => skipped.push(participant_id),
                Err(e) => {
                    tracing::warn!(
                        event_id,
                        participant_id,
                        tx_hash = %submitted.tx_hash(),
                        error = %e,
                        "Failed to record batch check-in"
                    );
                    checked_in.push(participant_id);
                }
            }
        }

        let receipt = self
            .ctx
            .await_confirmation(&entity, &submitted, self.ctx.tracker.batch_timeout())
            .await?;

        Ok(BatchCheckInReport {
            tx_hash: Some(receipt.tx_hash),
            block_number: Some(receipt.block_number),
            checked_in,
            skipped,
        })
    }

    /// A participant counts as checked in only when the stored row and the
    /// on-chain flag agree.
    pub async fn check_in_status(&self, event_id: u64, participant_id: u64) -> ServiceResult<CheckInStatus> {
        let (_, wallet) = self.ctx.participant_wallet(participant_id).await?;
        let stored = self.ctx.store.checkin(event_id, participant_id).await?;
        let off_chain = stored.as_ref().is_some_and(|r| !r.status.is_failed());
        let on_chain = off_chain && self.ctx.checkins.has_checked_in(event_id, wallet).await?;

        Ok(CheckInStatus {
            checked_in: off_chain && on_chain,
            off_chain,
            on_chain,
            checked_in_at: stored.as_ref().map(|r| r.created_at),
            tx_hash: stored.as_ref().map(|r| r.tx_hash),
            record_status: stored.as_ref().map(|r| r.status),
        })
    }

    pub async fn event_summary(&self, event_id: u64) -> ServiceResult<CheckInSummary> {
        self.ctx.event_row(event_id).await?;
        let registered = self.ctx.checkins.is_event_registered(event_id).await?;
        let on_chain_count = self.ctx.checkins.check_in_count(event_id).await?;
        let stats = self.ctx.checkins.stats(event_id).await?;
        let stored_count = self.ctx.store.checkins_for_event(event_id).await?.len();

        Ok(CheckInSummary {
            event_id,
            registered,
            on_chain_count,
            unique_participants: stats.uniqueParticipants.saturating_to(),
            last_check_in_time: stats.lastCheckInTime.saturating_to(),
            stored_count,
        })
    }

    /// The stored check-in unless its transaction failed.
    pub(crate) async fn live_checkin(&self, event_id: u64, participant_id: u64) -> ServiceResult<Option<CheckinRecord>> {
        let row = self.ctx.store.checkin(event_id, participant_id).await?;
        Ok(row.filter(|r| !r.status.is_failed()))
    }

    /// Cost preview for checking the participant in.
    pub async fn estimate_check_in_gas(&self, event_id: u64, participant_id: u64) -> ServiceResult<GasQuote> {
        self.ctx.event_row(event_id).await?;
        let (_, wallet) = self.ctx.participant_wallet(participant_id).await?;
        let request = self.ctx.checkins.check_in(event_id, wallet);
        let quote = self.ctx.submitter.quote(&request, self.ctx.payer_or(wallet)).await?;
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainError, MockChain, ReceiptPlan};
    use crate::contracts::checkin_registry::ICheckInRegistry;
    use crate::services::testkit;
    use crate::store::{EventRow, OffChainStore};
    use std::sync::Arc;
    use std::time::Duration;

    fn checkin_event(id: u64) -> EventRow {
        EventRow {
            status: EventStatus::Checkin,
            ..testkit::event(id, 0)
        }
    }

    #[tokio::test]
    async fn test_wrong_phase_costs_nothing() {
        let chain = Arc::new(MockChain::new(31337));
        let (ctx, store) = testkit::context(chain.clone());
        store.upsert_event(testkit::event(42, 0)).await.unwrap();
        store.upsert_participant(testkit::participant(1)).await.unwrap();

        let err = ctx.checkins().check_in(42, 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::WrongPhase { required: "checkin", actual: "preparation" }));
        assert_eq!(chain.rpc_call_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_wallet_fails_before_network() {
        let chain = Arc::new(MockChain::new(31337));
        let (ctx, store) = testkit::context(chain.clone());
        store.upsert_event(checkin_event(42)).await.unwrap();
        store
            .upsert_participant(crate::store::Participant {
                id: 1,
                wallet_address: "0x1234".to_string(),
            })
            .await
            .unwrap();

        let err = ctx.checkins().check_in(42, 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::Chain(ChainError::InvalidAddress(_))));
        assert_eq!(chain.rpc_call_count(), 0);
    }

    #[tokio::test]
    async fn test_on_chain_check_in_blocks_resubmission() {
        let chain = Arc::new(MockChain::new(31337));
        chain.on_call::<ICheckInRegistry::hasParticipantCheckedInCall>(|_| true);
        let (ctx, store) = testkit::context(chain.clone());
        store.upsert_event(checkin_event(42)).await.unwrap();
        store.upsert_participant(testkit::participant(1)).await.unwrap();

        let err = ctx.checkins().check_in(42, 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyCheckedIn));
        assert!(chain.broadcasts().is_empty());
        assert!(store.checkin(42, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_batch_skips_checked_in() {
        let chain = Arc::new(MockChain::new(31337));
        let already_on_chain = testkit::wallet(2);
        chain.on_call::<ICheckInRegistry::batchCheckCheckInStatusCall>(move |call| {
            call.participants.iter().map(|p| *p == already_on_chain).collect()
        });
        let (ctx, store) = testkit::context(chain.clone());
        store.upsert_event(checkin_event(42)).await.unwrap();
        for id in 1..=3 {
            store.upsert_participant(testkit::participant(id)).await.unwrap();
        }

        let report = ctx.checkins().batch_check_in(42, &[1, 2, 3]).await.unwrap();
        assert_eq!(report.checked_in, vec![1, 3]);
        assert_eq!(report.skipped, vec![2]);
        assert_eq!(chain.broadcasts().len(), 1);
        assert!(chain.broadcasts()[0].gas_limit >= 200_000);

        let row = store.checkin(42, 3).await.unwrap().unwrap();
        assert_eq!(row.status, RecordStatus::Confirmed);
        assert_eq!(Some(row.tx_hash), report.tx_hash);
    }

    #[tokio::test]
    async fn test_status_requires_both_sides() {
        let chain = Arc::new(MockChain::new(31337));
        chain.on_call::<ICheckInRegistry::hasParticipantCheckedInCall>(|_| false);
        let (ctx, store) = testkit::context(chain);
        store.upsert_participant(testkit::participant(1)).await.unwrap();
        store
            .insert_checkin(CheckinRecord {
                event_id: 42,
                participant_id: 1,
                wallet_address: testkit::wallet(1),
                tx_hash: TxHash::repeat_byte(0x42),
                status: RecordStatus::Pending,
                block_number: None,
                created_at: 1,
            })
            .await
            .unwrap();

        let status = ctx.checkins().check_in_status(42, 1).await.unwrap();
        assert!(status.off_chain);
        assert!(!status.on_chain);
        assert!(!status.checked_in);
    }

    #[tokio::test]
    async fn test_estimate_uses_signer_as_payer() {
        let chain = Arc::new(MockChain::new(31337));
        chain.set_estimate(Ok(90_000));
        let (ctx, store) = testkit::context(chain);
        store.upsert_event(checkin_event(42)).await.unwrap();
        store.upsert_participant(testkit::participant(1)).await.unwrap();

        let quote = ctx.checkins().estimate_check_in_gas(42, 1).await.unwrap();
        assert_eq!(quote.gas_limit, 90_000);
        assert_eq!(Some(quote.payer), ctx.signer_address());
    }

    #[tokio::test]
    async fn test_event_summary_combines_both_sides() {
        use crate::contracts::checkin_registry::CheckInStats;
        use alloy::primitives::U256;

        let chain = Arc::new(MockChain::new(31337));
        chain.on_call::<ICheckInRegistry::isEventRegisteredCall>(|_| true);
        chain.on_call::<ICheckInRegistry::getEventCheckInCountCall>(|_| U256::from(3));
        chain.on_call::<ICheckInRegistry::getEventCheckInStatsCall>(|call| CheckInStats {
            eventId: call.eventId,
            totalCheckIns: U256::from(3),
            uniqueParticipants: U256::from(2),
            lastCheckInTime: U256::from(1_700_000_500u64),
        });
        let (ctx, store) = testkit::context(chain);
        store.upsert_event(checkin_event(42)).await.unwrap();

        let summary = ctx.checkins().event_summary(42).await.unwrap();
        assert!(summary.registered);
        assert_eq!(summary.on_chain_count, 3);
        assert_eq!(summary.unique_participants, 2);
        assert_eq!(summary.stored_count, 0);
    }

    #[tokio::test]
    async fn test_failed_check_in_can_be_retried() {
        let chain = Arc::new(MockChain::new(31337));
        chain.on_call::<ICheckInRegistry::hasParticipantCheckedInCall>(|_| false);
        chain.push_receipt_plan(ReceiptPlan::Revert { after_lookups: 0 });
        let (ctx, store) = testkit::context(chain.clone());
        store.upsert_event(checkin_event(42)).await.unwrap();
        store.upsert_participant(testkit::participant(1)).await.unwrap();

        let first = ctx.checkins().check_in(42, 1).await.unwrap();
        let mut status = None;
        for _ in 0..200 {
            status = store.checkin(42, 1).await.unwrap().map(|r| r.status);
            if status == Some(RecordStatus::Failed) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, Some(RecordStatus::Failed));
        assert!(!ctx.checkins().check_in_status(42, 1).await.unwrap().off_chain);

        let retry = ctx.checkins().check_in(42, 1).await.unwrap();
        assert_ne!(retry.tx_hash(), first.tx_hash());
        assert_eq!(chain.broadcasts().len(), 2);
        let row = store.checkin(42, 1).await.unwrap().unwrap();
        assert_eq!(row.tx_hash, retry.tx_hash());
        assert_ne!(row.status, RecordStatus::Failed);
    }

    #[tokio::test]
    async fn test_batch_timeout_keeps_pending_rows() {
        let chain = Arc::new(MockChain::new(31337));
        chain.on_call::<ICheckInRegistry::batchCheckCheckInStatusCall>(|call| vec![false; call.participants.len()]);
        chain.push_receipt_plan(ReceiptPlan::StuckInPool);
        let (ctx, store) = testkit::context(chain.clone());
        store.upsert_event(checkin_event(42)).await.unwrap();
        for id in [1, 2] {
            store.upsert_participant(testkit::participant(id)).await.unwrap();
        }

        let err = ctx.checkins().batch_check_in(42, &[1, 2]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Chain(ChainError::ConfirmationTimeout { .. })));

        let batch_hash = chain.broadcasts()[0].hash;
        for id in [1, 2] {
            let row = store.checkin(42, id).await.unwrap().unwrap();
            assert_eq!(row.status, RecordStatus::Pending);
            assert_eq!(row.tx_hash, batch_hash);
        }

        let again = ctx.checkins().batch_check_in(42, &[1, 2]).await.unwrap();
        assert!(again.tx_hash.is_none());
        assert_eq!(again.skipped, vec![1, 2]);
        let err = ctx.checkins().check_in(42, 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyCheckedIn));
        assert_eq!(chain.broadcasts().len(), 1);
    }
}

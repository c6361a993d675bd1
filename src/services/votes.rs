//! Votes relayed to the event registry. Votes and revocations block on confirmation.

use serde::Serialize;

use crate::services::{require_phase, ChainContext, OperationResult, ServiceError, ServiceResult};
use crate::store::{unix_now, EventStatus, RecordStatus, VoteRecord};
use crate::submitter::GasQuote;

pub const DEFAULT_SCORE: u64 = 10;

fn entity_id(event_id: u64, participant_id: u64, submission_id: u64) -> String {
    format!("vote:{}:{}:{}", event_id, participant_id, submission_id)
}

/// The stored index of a mined vote. A vote still in the pool has no list
/// position yet.
fn on_chain_index(vote: &VoteRecord) -> ServiceResult<u64> {
    let index = vote.chain_vote_index.ok_or(ServiceError::VoteNotOnChain)?;
    match (vote.status, vote.tx_hash) {
        (RecordStatus::Pending, Some(tx_hash)) => Err(ServiceError::VotePending(tx_hash)),
        _ => Ok(index),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VoteOutcome {
    pub vote: VoteRecord,
    /// `None` when the event is not on chain and the vote was stored off-chain only.
    pub result: Option<OperationResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevokeOutcome {
    pub vote_id: u64,
    pub result: Option<OperationResult>,
}

#[derive(Debug)]
pub struct VoteService<'a> {
    ctx: &'a ChainContext,
}

impl<'a> VoteService<'a> {
    pub(crate) fn new(ctx: &'a ChainContext) -> Self {
        Self { ctx }
    }

    /// Vote for a submission. One active vote per (participant, submission).
    ///
    /// The vote index is the length of the voter's on-chain list, read just
    /// before submitting.
    pub async fn vote(
        &self,
        event_id: u64,
        participant_id: u64,
        submission_id: u64,
        score: Option<u64>,
    ) -> ServiceResult<VoteOutcome> {
        let score = score.unwrap_or(DEFAULT_SCORE);
        if !(1..=10).contains(&score) {
            return Err(ServiceError::InvalidScore(score));
        }

        let row = self.ctx.event_row(event_id).await?;
        require_phase(&row, EventStatus::Voting)?;
        let (_, wallet) = self.ctx.participant_wallet(participant_id).await?;

        let status = self.ctx.checkins().check_in_status(event_id, participant_id).await?;
        if !status.checked_in {
            return Err(ServiceError::NotCheckedIn);
        }

        match self.ctx.store.submission(submission_id).await? {
            Some(submission) if submission.event_id == event_id && !submission.draft => {}
            _ => return Err(ServiceError::SubmissionNotFound(submission_id)),
        }

        if self.ctx.store.active_vote(participant_id, submission_id).await?.is_some() {
            return Err(ServiceError::AlreadyVoted);
        }

        let mut vote = VoteRecord {
            id: 0,
            event_id,
            participant_id,
            submission_id,
            voter_address: wallet,
            score,
            chain_vote_index: None,
            tx_hash: None,
            status: RecordStatus::Confirmed,
            revoked: false,
            revoke_tx_hash: None,
            created_at: unix_now(),
        };

        if !row.is_on_chain() {
            tracing::warn!(event_id, participant_id, submission_id, "Event not on chain, storing vote off-chain only");
            let vote = self.ctx.store.insert_vote(vote).await?;
            return Ok(VoteOutcome { vote, result: None });
        }

        let entity = entity_id(event_id, participant_id, submission_id);
        let vote_index = self.ctx.events.user_votes(row.chain_event_id, wallet).await?.len() as u64;
        let request = self.ctx.events.vote(row.chain_event_id, wallet, submission_id, score);
        let submitted = self
            .ctx
            .broadcast(&entity, request, format!("vote for submission {}", submission_id))
            .await?;

        // A vote that times out must still block a second one.
        vote.chain_vote_index = Some(vote_index);
        vote.tx_hash = Some(submitted.tx_hash());
        vote.status = RecordStatus::Pending;
        let mut vote = self.ctx.store.insert_vote(vote).await?;

        let receipt = self
            .ctx
            .await_confirmation(&entity, &submitted, self.ctx.tracker.blocking_timeout())
            .await?;
        vote.status = RecordStatus::Confirmed;
        tracing::info!(
            event_id,
            participant_id,
            submission_id,
            vote_index,
            tx_hash = %receipt.tx_hash,
            "Vote recorded on chain"
        );

        Ok(VoteOutcome {
            vote,
            result: Some(OperationResult::completed(&receipt)),
        })
    }

    /// Revoke the participant's active vote for a submission using its stored index.
    pub async fn revoke_vote(&self, participant_id: u64, submission_id: u64) -> ServiceResult<RevokeOutcome> {
        let vote = self
            .ctx
            .store
            .active_vote(participant_id, submission_id)
            .await?
            .ok_or(ServiceError::VoteNotFound)?;
        let row = self.ctx.event_row(vote.event_id).await?;
        require_phase(&row, EventStatus::Voting)?;

        if !row.is_on_chain() {
            self.ctx.store.mark_vote_revoked(vote.id, None).await?;
            return Ok(RevokeOutcome {
                vote_id: vote.id,
                result: None,
            });
        }

        let vote_index = on_chain_index(&vote)?;
        let request = self
            .ctx
            .events
            .revoke_vote(row.chain_event_id, vote.voter_address, vote_index);
        let receipt = self
            .ctx
            .submit_and_confirm(
                &entity_id(vote.event_id, participant_id, submission_id),
                request,
                format!("revoke vote {} for submission {}", vote_index, submission_id),
                self.ctx.tracker.blocking_timeout(),
            )
            .await?;
        self.ctx.store.mark_vote_revoked(vote.id, Some(receipt.tx_hash)).await?;

        Ok(RevokeOutcome {
            vote_id: vote.id,
            result: Some(OperationResult::completed(&receipt)),
        })
    }

    /// Cost preview for a vote. Fails before any network call when the event
    /// is not on chain.
    pub async fn estimate_vote_gas(
        &self,
        event_id: u64,
        participant_id: u64,
        submission_id: u64,
    ) -> ServiceResult<GasQuote> {
        let row = self.ctx.on_chain_event(event_id).await?;
        let (_, wallet) = self.ctx.participant_wallet(participant_id).await?;
        let request = self
            .ctx
            .events
            .vote(row.chain_event_id, wallet, submission_id, DEFAULT_SCORE);
        Ok(self.ctx.submitter.quote(&request, self.ctx.payer_or(wallet)).await?)
    }

    /// Cost preview for revoking, using the stored vote index.
    pub async fn estimate_revoke_vote_gas(&self, participant_id: u64, submission_id: u64) -> ServiceResult<GasQuote> {
        let vote = self
            .ctx
            .store
            .active_vote(participant_id, submission_id)
            .await?
            .ok_or(ServiceError::VoteNotFound)?;
        let row = self.ctx.on_chain_event(vote.event_id).await?;
        let vote_index = on_chain_index(&vote)?;
        let request = self
            .ctx
            .events
            .revoke_vote(row.chain_event_id, vote.voter_address, vote_index);
        Ok(self
            .ctx
            .submitter
            .quote(&request, self.ctx.payer_or(vote.voter_address))
            .await?)
    }
}

//! Field-by-field comparison of stored records against chain state.

use alloy::primitives::Address;
use futures_util::future::join_all;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::chain::TxStatus;
use crate::config::ReconciliationConfig;
use crate::confirmation::ConfirmationTracker;
use crate::contracts::{parse_address, CheckInRegistry, EventRegistry};
use crate::observability::metrics;
use crate::reconcile::report::{VerificationReport, VerifiedEntity, VoteTally, UNAVAILABLE};
use crate::reconcile::{ReconcileError, ReconcileResult};
use crate::store::{EventRow, OffChainStore};

/// Read-only verifier over both stores.
#[derive(Clone)]
pub struct Verifier {
    events: EventRegistry,
    checkins: CheckInRegistry,
    tracker: ConfirmationTracker,
    store: Arc<dyn OffChainStore>,
    config: ReconciliationConfig,
}

impl Verifier {
    pub fn new(
        events: EventRegistry,
        checkins: CheckInRegistry,
        tracker: ConfirmationTracker,
        store: Arc<dyn OffChainStore>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            events,
            checkins,
            tracker,
            store,
            config,
        }
    }

    async fn event_row(&self, event_id: u64) -> ReconcileResult<EventRow> {
        self.store
            .event(event_id)
            .await?
            .ok_or(ReconcileError::EventNotFound(event_id))
    }

    /// Compare stored event metadata with the on-chain event.
    pub async fn verify_event(&self, event_id: u64) -> ReconcileResult<VerificationReport> {
        let row = self.event_row(event_id).await?;
        let mut report = VerificationReport::new(VerifiedEntity::Event, event_id.to_string());
        report.off_chain = json!({
            "name": row.name,
            "description": row.description,
            "location": row.location,
            "start_time": row.start_time,
            "end_time": row.end_time,
            "chain_event_id": row.chain_event_id,
            "deleted": row.deleted,
        });

        if !row.is_on_chain() {
            report.differ("chain_event_id", UNAVAILABLE, 0);
            report.issue("event is not on chain");
            return Ok(self.seal(report, "event metadata verified"));
        }

        match self.events.get_event(row.chain_event_id).await {
            Ok(info) => {
                let start = info.startTime.saturating_to::<u64>();
                let end = info.endTime.saturating_to::<u64>();
                report.on_chain = json!({
                    "name": info.name,
                    "description": info.description,
                    "location": info.location,
                    "start_time": start,
                    "end_time": end,
                    "organizer": info.organizer.to_string(),
                    "is_active": info.isActive,
                    "is_deleted": info.isDeleted,
                });
                report.compare_exact("name", &info.name, &row.name);
                report.compare_exact("description", &info.description, &row.description);
                report.compare_exact("location", &info.location, &row.location);
                let skew = self.config.event_time_skew_secs;
                report.compare_time("start_time", start, row.start_time, skew);
                report.compare_time("end_time", end, row.end_time, skew);
                if info.isDeleted != row.deleted {
                    report.differ("deleted", info.isDeleted, row.deleted);
                }
            }
            Err(e) => {
                report.differ("event", UNAVAILABLE, row.chain_event_id);
                report.issue(format!("could not fetch on-chain event {}: {}", row.chain_event_id, e));
            }
        }

        Ok(self.seal(report, "event metadata verified"))
    }

    /// Compare a participant's stored check-in with the on-chain record.
    pub async fn verify_check_in(&self, event_id: u64, participant_id: u64) -> ReconcileResult<VerificationReport> {
        let participant = self
            .store
            .participant(participant_id)
            .await?
            .ok_or(ReconcileError::ParticipantNotFound(participant_id))?;
        let stored = self.store.checkin(event_id, participant_id).await?;

        let mut report = VerificationReport::new(
            VerifiedEntity::CheckIn,
            format!("{}:{}", event_id, participant_id),
        );
        report.off_chain = json!({
            "wallet_address": participant.wallet_address,
            "record": stored,
        });

        let wallet = match parse_address(&participant.wallet_address) {
            Ok(wallet) => wallet,
            Err(e) => {
                report.differ("participant", UNAVAILABLE, &participant.wallet_address);
                report.issue(e.to_string());
                return Ok(self.seal(report, "check-in verified"));
            }
        };

        let record = match self.checkins.record(event_id, wallet).await {
            Ok(record) => record,
            Err(e) => {
                report.differ("record", UNAVAILABLE, if stored.is_some() { "present" } else { "absent" });
                report.issue(format!("could not fetch on-chain check-in record: {}", e));
                return Ok(self.seal(report, "check-in verified"));
            }
        };

        let chain_event_id = record.eventId.saturating_to::<u64>();
        let chain_timestamp = record.timestamp.saturating_to::<u64>();
        report.on_chain = json!({
            "event_id": chain_event_id,
            "participant": record.participant.to_string(),
            "timestamp": chain_timestamp,
            "check_in_id": record.checkInId.saturating_to::<u64>(),
            "is_active": record.isActive,
        });

        if chain_event_id != event_id {
            report.differ("event_id", chain_event_id, event_id);
        }
        if record.participant != wallet {
            report.differ("participant", record.participant, wallet);
        }

        match stored {
            Some(stored) => {
                report.compare_time(
                    "timestamp",
                    chain_timestamp,
                    stored.created_at,
                    self.config.checkin_time_skew_secs,
                );
                match self.tracker.status(stored.tx_hash).await {
                    Ok(TxStatus::Mined(receipt)) if receipt.success => {}
                    Ok(status) => {
                        report.differ("transaction", status.label(), stored.tx_hash);
                        report.issue(format!(
                            "check-in transaction {} is {}; record is provisional",
                            stored.tx_hash,
                            status.label()
                        ));
                    }
                    Err(e) => {
                        report.differ("transaction", UNAVAILABLE, stored.tx_hash);
                        report.issue(format!("could not look up check-in transaction: {}", e));
                    }
                }
            }
            None => {
                report.differ("record", "present", "absent");
                report.issue("check-in exists on chain but not off chain");
            }
        }

        Ok(self.seal(report, "check-in verified"))
    }

    /// Compare each voter's active vote count with their on-chain list.
    pub async fn verify_votes(&self, event_id: u64) -> ReconcileResult<VerificationReport> {
        let row = self.event_row(event_id).await?;
        let votes = self.store.votes_for_event(event_id).await?;

        let mut by_voter: BTreeMap<Address, usize> = BTreeMap::new();
        for vote in votes.iter().filter(|v| !v.revoked && !v.status.is_failed()) {
            *by_voter.entry(vote.voter_address).or_default() += 1;
        }

        let mut report = VerificationReport::new(VerifiedEntity::Votes, event_id.to_string());
        let mut tally = VoteTally {
            total_votes_db: by_voter.values().sum(),
            ..Default::default()
        };
        report.off_chain = json!(by_voter
            .iter()
            .map(|(voter, count)| (voter.to_string(), *count))
            .collect::<BTreeMap<String, usize>>());

        if !row.is_on_chain() {
            report.differ("chain_event_id", UNAVAILABLE, 0);
            report.issue("event is not on chain; votes cannot be verified");
            report.votes = Some(tally);
            return Ok(self.seal(report, "vote records verified"));
        }

        let lookups = by_voter
            .keys()
            .map(|voter| self.events.user_votes(row.chain_event_id, *voter));
        let results = join_all(lookups).await;

        let mut chain_counts = BTreeMap::new();
        for ((voter, db_count), result) in by_voter.iter().zip(results) {
            let field = format!("votes[{}]", voter);
            match result {
                Ok(list) => {
                    let active = list.iter().filter(|v| !v.isRevoked).count();
                    tally.total_votes_chain += active;
                    chain_counts.insert(voter.to_string(), active);
                    if active == *db_count {
                        tally.verified_voters += 1;
                    } else {
                        report.differ(field, active, db_count);
                        tally.mismatched_voters.push(voter.to_string());
                    }
                }
                Err(e) => {
                    report.differ(field, UNAVAILABLE, db_count);
                    report.issue(format!("could not fetch on-chain votes for {}: {}", voter, e));
                    tally.mismatched_voters.push(voter.to_string());
                }
            }
        }
        report.on_chain = json!(chain_counts);

        let passed = format!(
            "verified {} voter(s), {} passed",
            by_voter.len(),
            tally.verified_voters
        );
        report.votes = Some(tally);
        Ok(self.seal(report, &passed))
    }

    /// Event metadata and vote records in one report.
    pub async fn verify_all(&self, event_id: u64) -> ReconcileResult<VerificationReport> {
        let event = self.verify_event(event_id).await?;
        let votes = self.verify_votes(event_id).await?;

        let mut report = VerificationReport::new(VerifiedEntity::All, event_id.to_string());
        report.off_chain = json!({ "event": event.off_chain, "votes": votes.off_chain });
        report.on_chain = json!({ "event": event.on_chain, "votes": votes.on_chain });
        if !event.is_valid {
            report.issue("event metadata verification failed");
        }
        if !votes.is_valid {
            report.issue("vote records verification failed");
        }
        report.issues.extend(event.issues);
        report.issues.extend(votes.issues);
        report.differences.extend(event.differences);
        report.differences.extend(votes.differences);
        report.votes = votes.votes;

        Ok(self.seal(report, "all records verified"))
    }

    fn seal(&self, report: VerificationReport, passed: &str) -> VerificationReport {
        let report = report.finish(passed);
        metrics::record_verification(report.entity.as_str(), report.is_valid);
        tracing::info!(
            entity = report.entity.as_str(),
            entity_id = %report.entity_id,
            is_valid = report.is_valid,
            differences = report.differences.len(),
            "Verification complete"
        );
        report
    }
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("events", &self.events.address())
            .field("checkins", &self.checkins.address())
            .field("config", &self.config)
            .finish()
    }
}

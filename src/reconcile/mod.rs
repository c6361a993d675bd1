//! Reconciliation of off-chain records against chain state.
//!
//! # Data Flow
//! ```text
//! OffChainStore ──(event row, check-in row, votes)──┐
//!                                                   ├─▶ Verifier ──▶ VerificationReport
//! chain ──(getEvent, getCheckInRecord, getUserVotes,┘
//!          transaction receipt)
//! ```
//!
//! # Design Decisions
//! - Never writes to either side and never retries
//! - Chain fetch failures become report content, not errors
//! - Only a missing off-chain anchor (unknown event or participant) is an error

pub mod report;
pub mod verifier;

use thiserror::Error;

use crate::store::StoreError;

pub use report::{FieldDifference, VerificationReport, VerifiedEntity, VoteTally};
pub use verifier::Verifier;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("event {0} not found")]
    EventNotFound(u64),

    #[error("participant {0} not found")]
    ParticipantNotFound(u64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

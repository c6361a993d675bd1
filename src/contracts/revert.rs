//! Revert reason classification.
//!
//! Contracts reject with free-form reason strings. Callers care about a
//! small set of outcomes, so reasons are matched against a substring table
//! and mapped to a [`RevertKind`]. Unknown reasons become [`RevertKind::Other`].

use serde::Serialize;

/// Why a contract refused an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevertKind {
    NotStarted,
    AlreadyEnded,
    NotActive,
    AlreadyCheckedIn,
    AlreadyHasNft,
    AlreadyVoted,
    VoteAlreadyRevoked,
    VoteNotFound,
    EventNotFound,
    TokenNotFound,
    EventDeleted,
    EventLocked,
    NotAuthorized,
    AlreadyRegistered,
    InvalidTimeRange,
    EmptyBatch,
    BatchTooLarge,
    InvalidInput,
    Other,
}

/// Lowercase substrings checked in order; first match wins.
const REVERT_TABLE: &[(&str, RevertKind)] = &[
    ("not started", RevertKind::NotStarted),
    ("already ended", RevertKind::AlreadyEnded),
    ("has ended", RevertKind::AlreadyEnded),
    ("not active", RevertKind::NotActive),
    ("already checked in", RevertKind::AlreadyCheckedIn),
    ("already has nft", RevertKind::AlreadyHasNft),
    ("already voted", RevertKind::AlreadyVoted),
    ("already revoked", RevertKind::VoteAlreadyRevoked),
    ("invalid vote index", RevertKind::VoteNotFound),
    ("nft does not exist", RevertKind::TokenNotFound),
    ("event does not exist", RevertKind::EventNotFound),
    ("has been deleted", RevertKind::EventDeleted),
    ("cannot edit", RevertKind::EventLocked),
    ("cannot delete", RevertKind::EventLocked),
    ("not authorized", RevertKind::NotAuthorized),
    ("already registered", RevertKind::AlreadyRegistered),
    ("invalid time range", RevertKind::InvalidTimeRange),
    ("empty participants", RevertKind::EmptyBatch),
    ("too many participants", RevertKind::BatchTooLarge),
    ("invalid address", RevertKind::InvalidInput),
    ("invalid event id", RevertKind::InvalidInput),
    ("cannot be empty", RevertKind::InvalidInput),
];

impl RevertKind {
    /// Map a raw revert reason to its kind.
    pub fn classify(reason: &str) -> Self {
        let lower = reason.to_lowercase();
        REVERT_TABLE
            .iter()
            .find(|(needle, _)| lower.contains(needle))
            .map(|(_, kind)| *kind)
            .unwrap_or(RevertKind::Other)
    }

    /// Human-readable description used in error messages.
    pub fn description(&self) -> &'static str {
        match self {
            RevertKind::NotStarted => "event has not started",
            RevertKind::AlreadyEnded => "event has already ended",
            RevertKind::NotActive => "event is not active",
            RevertKind::AlreadyCheckedIn => "participant already checked in",
            RevertKind::AlreadyHasNft => "participant already holds the event NFT",
            RevertKind::AlreadyVoted => "voter already voted",
            RevertKind::VoteAlreadyRevoked => "vote already revoked",
            RevertKind::VoteNotFound => "vote does not exist",
            RevertKind::EventNotFound => "event does not exist on chain",
            RevertKind::TokenNotFound => "token does not exist",
            RevertKind::EventDeleted => "event has been deleted",
            RevertKind::EventLocked => "event has started or ended and can no longer change",
            RevertKind::NotAuthorized => "signer is not an authorized organizer",
            RevertKind::AlreadyRegistered => "event already registered",
            RevertKind::InvalidTimeRange => "invalid time range",
            RevertKind::EmptyBatch => "batch is empty",
            RevertKind::BatchTooLarge => "batch is too large",
            RevertKind::InvalidInput => "invalid input",
            RevertKind::Other => "rejected on chain",
        }
    }
}

impl std::fmt::Display for RevertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_reasons() {
        assert_eq!(
            RevertKind::classify("execution reverted: Event has not started"),
            RevertKind::NotStarted
        );
        assert_eq!(
            RevertKind::classify("Participant already has NFT for this event"),
            RevertKind::AlreadyHasNft
        );
        assert_eq!(
            RevertKind::classify("Cannot edit started or ended event"),
            RevertKind::EventLocked
        );
        assert_eq!(RevertKind::classify("Event has been deleted"), RevertKind::EventDeleted);
        assert_eq!(RevertKind::classify("Event does not exist"), RevertKind::EventNotFound);
        assert_eq!(RevertKind::classify("NFT does not exist"), RevertKind::TokenNotFound);
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(
            RevertKind::classify("ALREADY CHECKED IN"),
            RevertKind::AlreadyCheckedIn
        );
    }

    #[test]
    fn test_unknown_reason() {
        assert_eq!(RevertKind::classify("out of cheese"), RevertKind::Other);
        assert_eq!(RevertKind::Other.to_string(), "rejected on chain");
    }
}

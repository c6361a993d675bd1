//! Verification report model.

use serde::Serialize;
use serde_json::Value;

use crate::store::unix_now;

/// Placeholder for a value that could not be read.
pub const UNAVAILABLE: &str = "<unavailable>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifiedEntity {
    Event,
    CheckIn,
    Votes,
    All,
}

impl VerifiedEntity {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifiedEntity::Event => "event",
            VerifiedEntity::CheckIn => "check_in",
            VerifiedEntity::Votes => "votes",
            VerifiedEntity::All => "all",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDifference {
    pub field: String,
    pub chain_value: String,
    pub db_value: String,
}

/// Vote counts compared per voter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub total_votes_db: usize,
    pub total_votes_chain: usize,
    pub verified_voters: usize,
    pub mismatched_voters: Vec<String>,
}

/// Derived, never stored. `is_valid` holds exactly when `differences` is empty.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub entity_id: String,
    pub entity: VerifiedEntity,
    pub verified_at: u64,
    pub is_valid: bool,
    pub summary: String,
    pub off_chain: Value,
    pub on_chain: Value,
    pub differences: Vec<FieldDifference>,
    pub issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<VoteTally>,
}

impl VerificationReport {
    /// Start an empty report; call [`finish`](Self::finish) once every check ran.
    pub fn new(entity: VerifiedEntity, entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity,
            verified_at: unix_now(),
            is_valid: false,
            summary: String::new(),
            off_chain: Value::Null,
            on_chain: Value::Null,
            differences: Vec::new(),
            issues: Vec::new(),
            votes: None,
        }
    }

    pub fn differ(&mut self, field: impl Into<String>, chain_value: impl ToString, db_value: impl ToString) {
        self.differences.push(FieldDifference {
            field: field.into(),
            chain_value: chain_value.to_string(),
            db_value: db_value.to_string(),
        });
    }

    pub fn issue(&mut self, issue: impl Into<String>) {
        self.issues.push(issue.into());
    }

    /// Compare two strings exactly.
    pub fn compare_exact(&mut self, field: &str, chain_value: &str, db_value: &str) {
        if chain_value != db_value {
            self.differ(field, chain_value, db_value);
        }
    }

    /// Compare two unix timestamps, allowing `skew_secs` of drift.
    pub fn compare_time(&mut self, field: &str, chain_value: u64, db_value: u64, skew_secs: u64) {
        if chain_value.abs_diff(db_value) > skew_secs {
            self.differ(field, chain_value, db_value);
        }
    }

    /// Seal validity and summary. `passed` is the summary for a clean report.
    pub fn finish(mut self, passed: &str) -> Self {
        self.is_valid = self.differences.is_empty();
        self.summary = if self.is_valid {
            passed.to_string()
        } else {
            format!(
                "{} verification failed: {} difference(s) found",
                self.entity.as_str(),
                self.differences.len()
            )
        };
        self
    }
}

use crate::utils::error::CheckError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 批次作業的識別碼，由呼叫端提供
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Checker 對單一地址的判定。同時也是結果分類 (valid / bounced / error)。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    Bounced,
    Error,
}

impl ValidationStatus {
    pub const ALL: [ValidationStatus; 3] = [
        ValidationStatus::Valid,
        ValidationStatus::Bounced,
        ValidationStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Valid => "valid",
            ValidationStatus::Bounced => "bounced",
            ValidationStatus::Error => "error",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationStatus {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "valid" => Ok(ValidationStatus::Valid),
            "bounced" => Ok(ValidationStatus::Bounced),
            "error" => Ok(ValidationStatus::Error),
            other => Err(CheckError::UnknownCategory {
                category: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub status: ValidationStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ValidationOutcome {
    pub fn new(status: ValidationStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn valid(message: impl Into<String>) -> Self {
        Self::new(ValidationStatus::Valid, message)
    }

    pub fn bounced(message: impl Into<String>) -> Self {
        Self::new(ValidationStatus::Bounced, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ValidationStatus::Error, message)
    }
}

/// 一筆處理完成的結果：地址與它的判定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub address: String,
    pub outcome: ValidationOutcome,
}

impl CheckRecord {
    pub fn status(&self) -> ValidationStatus {
        self.outcome.status
    }
}

/// Counts derived from a job's results. Only built by folding results, so
/// `valid + bounced + error == total` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    valid: usize,
    bounced: usize,
    error: usize,
    total: usize,
}

impl Aggregate {
    pub fn tally<'a>(records: impl IntoIterator<Item = &'a CheckRecord>) -> Self {
        records.into_iter().fold(Self::default(), |mut acc, record| {
            acc.count(record.status());
            acc
        })
    }

    pub(crate) fn count(&mut self, status: ValidationStatus) {
        match status {
            ValidationStatus::Valid => self.valid += 1,
            ValidationStatus::Bounced => self.bounced += 1,
            ValidationStatus::Error => self.error += 1,
        }
        self.total += 1;
    }

    pub fn valid(&self) -> usize {
        self.valid
    }

    pub fn bounced(&self) -> usize {
        self.bounced
    }

    pub fn error(&self) -> usize {
        self.error
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn of(&self, status: ValidationStatus) -> usize {
        match status {
            ValidationStatus::Valid => self.valid,
            ValidationStatus::Bounced => self.bounced,
            ValidationStatus::Error => self.error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Running,
    Paused,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(address: &str, status: ValidationStatus) -> CheckRecord {
        CheckRecord {
            address: address.to_string(),
            outcome: ValidationOutcome::new(status, "test"),
        }
    }

    #[test]
    fn test_aggregate_tally_matches_results() {
        let records = vec![
            record("a@gmail.com", ValidationStatus::Valid),
            record("not-an-email", ValidationStatus::Error),
            record("b@gmail.com", ValidationStatus::Valid),
            record("gone@gmail.com", ValidationStatus::Bounced),
        ];

        let aggregate = Aggregate::tally(&records);

        assert_eq!(aggregate.valid(), 2);
        assert_eq!(aggregate.bounced(), 1);
        assert_eq!(aggregate.error(), 1);
        assert_eq!(aggregate.total(), 4);
        assert_eq!(aggregate.of(ValidationStatus::Valid), 2);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("valid".parse::<ValidationStatus>().unwrap(), ValidationStatus::Valid);
        assert_eq!("error".parse::<ValidationStatus>().unwrap(), ValidationStatus::Error);

        let err = "Valid".parse::<ValidationStatus>().unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ValidationStatus::Bounced).unwrap();
        assert_eq!(json, "\"bounced\"");

        let json = serde_json::to_string(&JobStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Paused.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }
}

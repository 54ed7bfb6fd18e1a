use crate::domain::model::{
    Aggregate, CheckRecord, JobId, JobStatus, ValidationOutcome, ValidationStatus,
};
use crate::utils::error::{CheckError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The mutable record of one batch run.
///
/// Only the job's worker holds a `&mut JobState`. Every mutation goes through
/// `record` or a status transition, so `aggregate` is always the fold of
/// `results` and `cursor == results.len()`.
#[derive(Debug, Clone)]
pub struct JobState {
    job_id: JobId,
    status: JobStatus,
    addresses: Vec<String>,
    cursor: usize,
    results: Vec<CheckRecord>,
    aggregate: Aggregate,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl JobState {
    pub fn new(job_id: JobId, addresses: Vec<String>) -> Result<Self> {
        if addresses.is_empty() {
            return Err(CheckError::EmptyBatch);
        }

        Ok(Self {
            job_id,
            status: JobStatus::Running,
            results: Vec::with_capacity(addresses.len()),
            addresses,
            cursor: 0,
            aggregate: Aggregate::default(),
            started_at: Utc::now(),
            finished_at: None,
        })
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn total(&self) -> usize {
        self.addresses.len()
    }

    pub fn aggregate(&self) -> Aggregate {
        self.aggregate
    }

    pub fn results(&self) -> &[CheckRecord] {
        &self.results
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.addresses.len()
    }

    /// 下一個要處理的地址
    pub fn next_address(&self) -> Option<&str> {
        self.addresses.get(self.cursor).map(String::as_str)
    }

    /// Appends the outcome for `addresses[cursor]`, folds it into the
    /// aggregate and advances the cursor.
    pub fn record(&mut self, outcome: ValidationOutcome) -> Result<&CheckRecord> {
        if self.status != JobStatus::Running {
            return Err(CheckError::invalid_state(
                self.job_id.as_str(),
                "record a result",
                self.status,
            ));
        }
        let address = self.next_address().map(str::to_string).ok_or_else(|| {
            CheckError::invalid_state(self.job_id.as_str(), "record a result", "exhausted")
        })?;

        self.aggregate.count(outcome.status);
        self.results.push(CheckRecord { address, outcome });
        self.cursor += 1;

        Ok(&self.results[self.results.len() - 1])
    }

    pub fn pause(&mut self) -> Result<()> {
        self.transition(JobStatus::Paused, "pause")
    }

    pub fn resume(&mut self) -> Result<()> {
        self.transition(JobStatus::Running, "resume")
    }

    pub fn complete(&mut self) -> Result<()> {
        if !self.is_exhausted() {
            return Err(CheckError::invalid_state(
                self.job_id.as_str(),
                "complete",
                format!("at {}/{}", self.cursor, self.total()),
            ));
        }
        self.transition(JobStatus::Completed, "complete")
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.transition(JobStatus::Cancelled, "cancel")
    }

    fn transition(&mut self, to: JobStatus, action: &str) -> Result<()> {
        let allowed = matches!(
            (self.status, to),
            (JobStatus::Running, JobStatus::Paused)
                | (JobStatus::Paused, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running | JobStatus::Paused, JobStatus::Cancelled)
        );
        if !allowed {
            return Err(CheckError::invalid_state(
                self.job_id.as_str(),
                action,
                self.status,
            ));
        }

        self.status = to;
        if to.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.job_id.clone(),
            status: self.status,
            current: self.cursor,
            total: self.total(),
            current_email: self.results.last().map(|r| r.address.clone()),
            aggregate: self.aggregate,
            results: self.results.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// An owned, step-consistent copy of a job's state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub current: usize,
    pub total: usize,
    pub current_email: Option<String>,
    pub aggregate: Aggregate,
    pub results: Vec<CheckRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobSnapshot {
    pub fn results_for(&self, category: ValidationStatus) -> impl Iterator<Item = &CheckRecord> {
        self.results
            .iter()
            .filter(move |record| record.status() == category)
    }

    /// 進度百分比，四捨五入到小數第一位
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.current as f64 / self.total as f64 * 1000.0).round() / 10.0
    }
}

use crate::core::event_bus::{
    Completion, EventBus, EventPayload, Progress, RunChannel, Subscription,
};
use crate::core::job_state::{JobSnapshot, JobState};
use crate::domain::model::{JobId, JobStatus, ValidationOutcome};
use crate::domain::ports::Checker;
use crate::utils::error::{CheckError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_ITEM_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// 單次 check 的上限，超時記為 error
    pub check_timeout: Option<Duration>,
    /// 每筆處理完後的間隔，避免壓垮 checker 後端
    pub item_delay: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            check_timeout: Some(DEFAULT_CHECK_TIMEOUT),
            item_delay: DEFAULT_ITEM_DELAY,
        }
    }
}

/// Latched control request, applied by the worker at the next item boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlSignal {
    Run,
    Pause,
    Cancel,
}

struct JobEntry {
    state: Arc<RwLock<JobState>>,
    control: watch::Sender<ControlSignal>,
    status: watch::Receiver<JobStatus>,
}

/// Owns every job's lifecycle. Each started job gets its own worker task;
/// the worker is the only writer of that job's `JobState`.
#[derive(Clone)]
pub struct BatchOrchestrator {
    checker: Arc<dyn Checker>,
    bus: EventBus,
    settings: OrchestratorSettings,
    jobs: Arc<RwLock<HashMap<JobId, JobEntry>>>,
}

impl BatchOrchestrator {
    pub fn new(checker: Arc<dyn Checker>, bus: EventBus, settings: OrchestratorSettings) -> Self {
        Self {
            checker,
            bus,
            settings,
            jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub async fn start(&self, job_id: JobId, addresses: Vec<String>) -> Result<()> {
        let state = JobState::new(job_id.clone(), addresses)?;
        let total = state.total();

        let mut jobs = self.jobs.write().await;
        if let Some(existing) = jobs.get(&job_id) {
            if !existing.state.read().await.status().is_terminal() {
                return Err(CheckError::JobAlreadyRunning {
                    job_id: job_id.to_string(),
                });
            }
            tracing::info!("Replacing finished job {}", job_id);
        }

        let state = Arc::new(RwLock::new(state));
        let (control_tx, control_rx) = watch::channel(ControlSignal::Run);
        let (status_tx, status_rx) = watch::channel(JobStatus::Running);
        let run = self.bus.open(&job_id);
        jobs.insert(
            job_id.clone(),
            JobEntry {
                state: Arc::clone(&state),
                control: control_tx,
                status: status_rx,
            },
        );
        drop(jobs);

        let worker = Worker {
            run,
            state,
            control: control_rx,
            status: status_tx,
            checker: Arc::clone(&self.checker),
            settings: self.settings.clone(),
        };
        tokio::spawn(worker.run());

        tracing::info!("🚀 Job {} started with {} addresses", job_id, total);
        Ok(())
    }

    pub async fn pause(&self, job_id: &JobId) -> Result<()> {
        self.request(job_id, ControlSignal::Pause).await
    }

    pub async fn resume(&self, job_id: &JobId) -> Result<()> {
        self.request(job_id, ControlSignal::Run).await
    }

    pub async fn cancel(&self, job_id: &JobId) -> Result<()> {
        self.request(job_id, ControlSignal::Cancel).await
    }

    async fn request(&self, job_id: &JobId, requested: ControlSignal) -> Result<()> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(job_id).ok_or_else(|| CheckError::UnknownJob {
            job_id: job_id.to_string(),
        })?;
        let status = entry.state.read().await.status();

        let mut outcome = Ok(());
        entry
            .control
            .send_if_modified(|pending| match next_signal(job_id, status, *pending, requested) {
                Ok(Some(next)) => {
                    *pending = next;
                    true
                }
                Ok(None) => false,
                Err(e) => {
                    outcome = Err(e);
                    false
                }
            });

        if outcome.is_ok() {
            tracing::debug!("Job {} control request {:?} accepted", job_id, requested);
        }
        outcome
    }

    pub async fn snapshot(&self, job_id: &JobId) -> Result<JobSnapshot> {
        let state = self.state_of(job_id).await?;
        let snapshot = state.read().await.snapshot();
        Ok(snapshot)
    }

    /// Snapshot plus a subscription for everything after it. No event falls
    /// between the two. A finished job has nothing left to stream.
    pub async fn attach(&self, job_id: &JobId) -> Result<(JobSnapshot, Option<Subscription>)> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(job_id).ok_or_else(|| CheckError::UnknownJob {
            job_id: job_id.to_string(),
        })?;
        let state = entry.state.read().await;
        let snapshot = state.snapshot();
        let subscription = if state.status().is_terminal() {
            None
        } else {
            Some(self.bus.subscribe(job_id))
        };
        Ok((snapshot, subscription))
    }

    /// Subscribes to a job id, which need not be started yet; the next run
    /// started under it streams to this subscription. The stream of a job
    /// that already finished is over, so that subscription ends immediately.
    pub async fn subscribe(&self, job_id: &JobId) -> Subscription {
        let jobs = self.jobs.read().await;
        let Some(entry) = jobs.get(job_id) else {
            return self.bus.subscribe(job_id);
        };

        let state = entry.state.read().await;
        if state.status().is_terminal() {
            tracing::debug!("Job {} already {}, stream is closed", job_id, state.status());
            return Subscription::closed(job_id.clone());
        }
        self.bus.subscribe(job_id)
    }

    pub async fn watch_status(&self, job_id: &JobId) -> Result<watch::Receiver<JobStatus>> {
        let jobs = self.jobs.read().await;
        jobs.get(job_id)
            .map(|entry| entry.status.clone())
            .ok_or_else(|| CheckError::UnknownJob {
                job_id: job_id.to_string(),
            })
    }

    /// 等待 job 進入終止狀態並回傳最終快照
    pub async fn wait(&self, job_id: &JobId) -> Result<JobSnapshot> {
        let mut status = self.watch_status(job_id).await?;
        status
            .wait_for(JobStatus::is_terminal)
            .await
            .map_err(|_| CheckError::checker(format!("worker for job {} stopped", job_id)))?;
        self.snapshot(job_id).await
    }

    /// Cancels a live job and forgets it. Its worker winds down on its own
    /// stream; a later run under the same id starts a fresh one.
    pub async fn discard(&self, job_id: &JobId) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.remove(job_id).ok_or_else(|| CheckError::UnknownJob {
            job_id: job_id.to_string(),
        })?;
        self.bus.detach(job_id);
        drop(jobs);

        entry.control.send_replace(ControlSignal::Cancel);
        tracing::info!("Job {} discarded", job_id);
        Ok(())
    }

    pub async fn job_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.jobs.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn state_of(&self, job_id: &JobId) -> Result<Arc<RwLock<JobState>>> {
        let jobs = self.jobs.read().await;
        jobs.get(job_id)
            .map(|entry| Arc::clone(&entry.state))
            .ok_or_else(|| CheckError::UnknownJob {
                job_id: job_id.to_string(),
            })
    }
}

/// Decides what a control request does given the applied status and the
/// request already latched. `Ok(None)` is an idempotent no-op.
fn next_signal(
    job_id: &JobId,
    status: JobStatus,
    pending: ControlSignal,
    requested: ControlSignal,
) -> Result<Option<ControlSignal>> {
    let action = match requested {
        ControlSignal::Run => "resume",
        ControlSignal::Pause => "pause",
        ControlSignal::Cancel => "cancel",
    };

    match requested {
        ControlSignal::Cancel => match status {
            JobStatus::Cancelled => Ok(None),
            JobStatus::Completed | JobStatus::Idle => {
                Err(CheckError::invalid_state(job_id.as_str(), action, status))
            }
            JobStatus::Running | JobStatus::Paused if pending == ControlSignal::Cancel => Ok(None),
            JobStatus::Running | JobStatus::Paused => Ok(Some(ControlSignal::Cancel)),
        },
        ControlSignal::Pause | ControlSignal::Run => {
            if status.is_terminal() || status == JobStatus::Idle {
                return Err(CheckError::invalid_state(job_id.as_str(), action, status));
            }
            if pending == ControlSignal::Cancel {
                return Err(CheckError::invalid_state(job_id.as_str(), action, "cancelling"));
            }
            if pending == requested {
                Ok(None)
            } else {
                Ok(Some(requested))
            }
        }
    }
}

struct Worker {
    run: RunChannel,
    state: Arc<RwLock<JobState>>,
    control: watch::Receiver<ControlSignal>,
    status: watch::Sender<JobStatus>,
    checker: Arc<dyn Checker>,
    settings: OrchestratorSettings,
}

impl Worker {
    async fn run(mut self) {
        loop {
            if !self.at_boundary().await {
                self.finish(JobStatus::Cancelled).await;
                return;
            }

            let next = self.state.read().await.next_address().map(str::to_string);
            let Some(address) = next else {
                break;
            };

            let outcome = check_address(&self.checker, &address, self.settings.check_timeout).await;
            self.record(outcome).await;

            if !self.settings.item_delay.is_zero() {
                tokio::time::sleep(self.settings.item_delay).await;
            }
        }

        self.finish(JobStatus::Completed).await;
    }

    /// Applies latched requests. Returns `false` when the job must stop.
    async fn at_boundary(&mut self) -> bool {
        loop {
            let signal = *self.control.borrow_and_update();
            match signal {
                ControlSignal::Run => {
                    self.transition(JobStatus::Running).await;
                    return true;
                }
                ControlSignal::Cancel => return false,
                ControlSignal::Pause => {
                    self.transition(JobStatus::Paused).await;
                    if self.control.changed().await.is_err() {
                        // job 已被 discard
                        return false;
                    }
                }
            }
        }
    }

    async fn record(&self, outcome: ValidationOutcome) {
        let mut state = self.state.write().await;
        let record = match state.record(outcome) {
            Ok(record) => record.clone(),
            Err(e) => {
                tracing::error!("Job {} failed to record result: {}", self.run.job_id(), e);
                return;
            }
        };

        tracing::debug!(
            "Job {} [{}/{}] {} -> {} ({})",
            self.run.job_id(),
            state.cursor(),
            state.total(),
            record.address,
            record.outcome.status,
            record.outcome.message
        );

        let progress = Progress {
            current: state.cursor(),
            total: state.total(),
            current_email: record.address.clone(),
        };
        self.run.publish(EventPayload::Result(record));
        self.run.publish(EventPayload::Progress(progress));
    }

    async fn transition(&self, to: JobStatus) {
        let mut state = self.state.write().await;
        if state.status() == to {
            return;
        }

        let applied = match to {
            JobStatus::Running => state.resume(),
            JobStatus::Paused => state.pause(),
            JobStatus::Completed => state.complete(),
            JobStatus::Cancelled => state.cancel(),
            JobStatus::Idle => Err(CheckError::invalid_state(
                self.run.job_id().as_str(),
                "reset",
                state.status(),
            )),
        };
        if let Err(e) = applied {
            tracing::error!("Job {} transition failed: {}", self.run.job_id(), e);
            return;
        }

        tracing::info!(
            "Job {} is now {} at {}/{}",
            self.run.job_id(),
            to,
            state.cursor(),
            state.total()
        );
        self.status.send_replace(to);

        if to.is_terminal() {
            let aggregate = state.aggregate();
            let delivered = self.run.publish(EventPayload::ProcessingComplete(Completion {
                aggregate,
                final_status: to,
            }));
            // 串流在 worker 結束、RunChannel 被 drop 時關閉
            tracing::debug!(
                "Job {} final event delivered to {} of {} observers",
                self.run.job_id(),
                delivered,
                self.run.observer_count()
            );
        }
    }

    async fn finish(&self, status: JobStatus) {
        self.transition(status).await;

        let state = self.state.read().await;
        let aggregate = state.aggregate();
        tracing::info!(
            "✅ Job {} {}: total {}, valid {}, bounced {}, error {}",
            self.run.job_id(),
            state.status(),
            aggregate.total(),
            aggregate.valid(),
            aggregate.bounced(),
            aggregate.error()
        );
    }
}

/// Runs one check in its own task so a panic or a hang inside the checker
/// becomes an `error` outcome instead of taking the job down.
async fn check_address(
    checker: &Arc<dyn Checker>,
    address: &str,
    timeout: Option<Duration>,
) -> ValidationOutcome {
    let checker = Arc::clone(checker);
    let owned = address.to_string();
    let mut task = tokio::spawn(async move { checker.check(&owned).await });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                task.abort();
                tracing::warn!("Check of {} timed out after {:?}", address, limit);
                return ValidationOutcome::error(format!(
                    "Timeout contacting checker after {}s",
                    limit.as_secs_f64()
                ));
            }
        },
        None => task.await,
    };

    match joined {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            tracing::warn!("Check of {} failed: {}", address, e);
            ValidationOutcome::error(e.to_string())
        }
        Err(join_error) if join_error.is_panic() => {
            tracing::warn!("Checker panicked on {}", address);
            ValidationOutcome::error("Checker panicked while validating this address")
        }
        Err(_) => ValidationOutcome::error("Check was aborted"),
    }
}

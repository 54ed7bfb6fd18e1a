use crate::domain::model::{Aggregate, CheckRecord, JobId, JobStatus};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub current_email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub aggregate: Aggregate,
    pub final_status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    Progress(Progress),
    Result(CheckRecord),
    ProcessingComplete(Completion),
}

impl EventPayload {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventPayload::ProcessingComplete(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: JobId,
    #[serde(flatten)]
    pub payload: EventPayload,
}

/// In-process fan-out of job events, one bounded broadcast channel per run.
///
/// Observers may subscribe to a job id before its run starts; `open` adopts
/// that pending channel. A running job's worker publishes through its own
/// `RunChannel`, so a discarded run can never reach a later run with the same
/// id. An observer that falls more than `capacity` events behind loses the
/// oldest ones.
#[derive(Debug, Clone)]
pub struct EventBus {
    channels: Channels,
    capacity: usize,
}

type Channels = Arc<Mutex<HashMap<JobId, Channel>>>;

#[derive(Debug)]
struct Channel {
    sender: broadcast::Sender<JobEvent>,
    /// 已被某個 run 認領
    live: bool,
}

fn lock(channels: &Channels) -> MutexGuard<'_, HashMap<JobId, Channel>> {
    channels.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pending channels nobody listens to any more.
fn prune_idle(channels: &mut HashMap<JobId, Channel>) {
    channels.retain(|_, channel| channel.live || channel.sender.receiver_count() > 0);
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Claims the stream for a new run of `job_id`, keeping observers that
    /// subscribed before the run started.
    pub fn open(&self, job_id: &JobId) -> RunChannel {
        let mut channels = lock(&self.channels);
        prune_idle(&mut channels);

        let sender = match channels.remove(job_id) {
            Some(pending) if !pending.live => pending.sender,
            _ => broadcast::channel(self.capacity).0,
        };
        channels.insert(
            job_id.clone(),
            Channel {
                sender: sender.clone(),
                live: true,
            },
        );

        RunChannel {
            job_id: job_id.clone(),
            sender,
            channels: Arc::clone(&self.channels),
        }
    }

    /// Joins the current run's stream, or a pending one if no run is live.
    pub fn subscribe(&self, job_id: &JobId) -> Subscription {
        let mut channels = lock(&self.channels);
        prune_idle(&mut channels);

        let receiver = channels
            .entry(job_id.clone())
            .or_insert_with(|| Channel {
                sender: broadcast::channel(self.capacity).0,
                live: false,
            })
            .sender
            .subscribe();

        tracing::debug!("Observer subscribed to job {}", job_id);
        Subscription {
            job_id: job_id.clone(),
            receiver,
            missed: 0,
        }
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        let job_id = subscription.job_id.clone();
        drop(subscription);

        prune_idle(&mut lock(&self.channels));
        tracing::debug!("Observer unsubscribed from job {}", job_id);
    }

    /// Unlinks the id from its current run. Existing observers keep that
    /// run's stream until it ends; new subscribers start a fresh one.
    pub fn detach(&self, job_id: &JobId) {
        lock(&self.channels).remove(job_id);
    }
}

/// The publishing side of one run's stream. Dropping it ends every
/// subscription to the run once buffered events are drained.
#[derive(Debug)]
pub struct RunChannel {
    job_id: JobId,
    sender: broadcast::Sender<JobEvent>,
    channels: Channels,
}

impl RunChannel {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Returns the number of observers the event was handed to.
    pub fn publish(&self, payload: EventPayload) -> usize {
        let event = JobEvent {
            job_id: self.job_id.clone(),
            payload,
        };
        self.sender.send(event).unwrap_or(0)
    }

    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Drop for RunChannel {
    fn drop(&mut self) {
        let mut channels = lock(&self.channels);
        if channels
            .get(&self.job_id)
            .is_some_and(|channel| channel.sender.same_channel(&self.sender))
        {
            channels.remove(&self.job_id);
        }
    }
}

/// One observer's view of a job's events.
#[derive(Debug)]
pub struct Subscription {
    job_id: JobId,
    receiver: broadcast::Receiver<JobEvent>,
    missed: u64,
}

impl Subscription {
    /// A subscription whose stream has already ended, for runs that are over.
    pub fn closed(job_id: JobId) -> Self {
        let (_, receiver) = broadcast::channel(1);
        Self {
            job_id,
            receiver,
            missed: 0,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Events dropped because this observer fell behind.
    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// Waits for the next event. `None` once the job's stream is closed.
    pub async fn recv(&mut self) -> Option<JobEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<JobEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// 讀到串流結束為止
    pub async fn collect(mut self) -> Vec<JobEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.recv().await {
            events.push(event);
        }
        events
    }

    fn record_lag(&mut self, skipped: u64) {
        self.missed += skipped;
        tracing::warn!(
            "Observer of job {} fell behind and missed {} events",
            self.job_id,
            skipped
        );
    }
}

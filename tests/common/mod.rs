#![allow(dead_code)]

use async_trait::async_trait;
use mail_batch::{
    BatchOrchestrator, CheckError, Checker, EventBus, EventPayload, JobEvent, JobId, JobStatus,
    OrchestratorSettings, Subscription, ValidationOutcome, ValidationStatus,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

pub const WAIT_LIMIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub enum Script {
    Outcome(ValidationStatus),
    Fail,
    Panic,
    Hang,
}

/// Deterministic checker. Addresses without a script are `valid`. With a
/// gate, every check first takes one permit.
#[derive(Default)]
pub struct ScriptedChecker {
    scripts: HashMap<String, Script>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, address: &str, script: Script) -> Self {
        self.scripts.insert(address.to_string(), script);
        self
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl Checker for ScriptedChecker {
    async fn check(&self, address: &str) -> mail_batch::Result<ValidationOutcome> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        match self.scripts.get(address).copied() {
            None => Ok(ValidationOutcome::valid("Mailbox exists")),
            Some(Script::Outcome(status)) => Ok(ValidationOutcome::new(status, format!("scripted {}", status))),
            Some(Script::Fail) => Err(CheckError::checker("Connection failed")),
            Some(Script::Panic) => panic!("checker blew up on {}", address),
            Some(Script::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

pub fn immediate_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        check_timeout: None,
        item_delay: Duration::ZERO,
    }
}

pub fn orchestrator(checker: ScriptedChecker) -> BatchOrchestrator {
    orchestrator_with(checker, immediate_settings())
}

pub fn orchestrator_with(checker: ScriptedChecker, settings: OrchestratorSettings) -> BatchOrchestrator {
    BatchOrchestrator::new(Arc::new(checker), EventBus::default(), settings)
}

pub fn addresses(items: &[&str]) -> Vec<String> {
    items.iter().map(|a| a.to_string()).collect()
}

pub fn numbered(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("user{}@gmail.com", i)).collect()
}

pub async fn next_event(subscription: &mut Subscription) -> Option<JobEvent> {
    tokio::time::timeout(WAIT_LIMIT, subscription.recv())
        .await
        .expect("timed out waiting for an event")
}

/// Reads events until a progress event reports `current`.
pub async fn wait_for_progress(subscription: &mut Subscription, current: usize) {
    loop {
        let event = next_event(subscription).await.expect("stream ended early");
        if let EventPayload::Progress(progress) = event.payload {
            if progress.current == current {
                return;
            }
        }
    }
}

pub async fn wait_for_status(orchestrator: &BatchOrchestrator, job_id: &JobId, status: JobStatus) {
    let mut watch = orchestrator.watch_status(job_id).await.expect("job exists");
    tokio::time::timeout(WAIT_LIMIT, watch.wait_for(|s| *s == status))
        .await
        .expect("timed out waiting for status")
        .expect("worker stopped");
}

pub fn result_addresses(events: &[JobEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match &event.payload {
            EventPayload::Result(record) => Some(record.address.clone()),
            _ => None,
        })
        .collect()
}

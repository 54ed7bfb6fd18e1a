use crate::config::AppConfig;
use crate::core::event_bus::{EventBus, Subscription};
use crate::core::exporter::{ExportFile, ResultExporter};
use crate::core::job_state::JobSnapshot;
use crate::core::orchestrator::BatchOrchestrator;
use crate::core::source::EmailSource;
use crate::core::{CheckRecord, Checker, JobId, ValidationStatus};
use crate::utils::error::Result;
use serde::Serialize;
use std::sync::Arc;

/// 上傳後回傳給呼叫端的摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub job_id: JobId,
    pub total_emails: usize,
    pub original_uploaded: usize,
    pub duplicates_removed: usize,
}

/// Entry points for a transport layer: upload, job control, event stream,
/// status, per-category results and export.
#[derive(Clone)]
pub struct CheckService {
    orchestrator: BatchOrchestrator,
    source: EmailSource,
    exporter: ResultExporter,
}

impl CheckService {
    pub fn new(orchestrator: BatchOrchestrator, source: EmailSource, exporter: ResultExporter) -> Self {
        Self {
            orchestrator,
            source,
            exporter,
        }
    }

    pub fn from_config(config: &AppConfig, checker: Arc<dyn Checker>) -> Result<Self> {
        let bus = EventBus::new(config.orchestrator.event_capacity);
        let orchestrator = BatchOrchestrator::new(checker, bus, config.orchestrator_settings());
        Ok(Self::new(
            orchestrator,
            config.email_source(),
            ResultExporter::new(config.export_format()?),
        ))
    }

    pub fn orchestrator(&self) -> &BatchOrchestrator {
        &self.orchestrator
    }

    pub fn exporter(&self) -> &ResultExporter {
        &self.exporter
    }

    /// Parses the payload and starts a job over it.
    pub async fn upload(&self, job_id: impl Into<JobId>, raw: &[u8]) -> Result<UploadReceipt> {
        let job_id = job_id.into();
        let parsed = self.source.parse_with_stats(raw)?;
        let receipt = UploadReceipt {
            job_id: job_id.clone(),
            total_emails: parsed.addresses.len(),
            original_uploaded: parsed.original_count,
            duplicates_removed: parsed.duplicates_removed,
        };

        self.orchestrator.start(job_id, parsed.addresses).await?;

        tracing::info!(
            "📥 Upload accepted for job {}: {} addresses ({} duplicates removed)",
            receipt.job_id,
            receipt.total_emails,
            receipt.duplicates_removed
        );
        Ok(receipt)
    }

    pub async fn pause(&self, job_id: &JobId) -> Result<()> {
        self.orchestrator.pause(job_id).await
    }

    pub async fn resume(&self, job_id: &JobId) -> Result<()> {
        self.orchestrator.resume(job_id).await
    }

    pub async fn cancel(&self, job_id: &JobId) -> Result<()> {
        self.orchestrator.cancel(job_id).await
    }

    pub async fn subscribe(&self, job_id: &JobId) -> Subscription {
        self.orchestrator.subscribe(job_id).await
    }

    /// For observers (re)connecting mid-job: current state plus the live stream.
    pub async fn attach(&self, job_id: &JobId) -> Result<(JobSnapshot, Option<Subscription>)> {
        self.orchestrator.attach(job_id).await
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        self.orchestrator.bus().unsubscribe(subscription);
    }

    pub async fn status(&self, job_id: &JobId) -> Result<JobSnapshot> {
        self.orchestrator.snapshot(job_id).await
    }

    pub async fn results(&self, job_id: &JobId, category: &str) -> Result<Vec<CheckRecord>> {
        let category: ValidationStatus = category.parse()?;
        let snapshot = self.orchestrator.snapshot(job_id).await?;
        Ok(snapshot.results_for(category).cloned().collect())
    }

    pub async fn export(&self, job_id: &JobId, category: &str) -> Result<ExportFile> {
        let category: ValidationStatus = category.parse()?;
        let snapshot = self.orchestrator.snapshot(job_id).await?;
        self.exporter.export_file(&snapshot, category)
    }

    pub async fn wait(&self, job_id: &JobId) -> Result<JobSnapshot> {
        self.orchestrator.wait(job_id).await
    }

    pub async fn discard(&self, job_id: &JobId) -> Result<()> {
        self.orchestrator.discard(job_id).await
    }
}

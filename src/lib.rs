pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{FormatChecker, LocalStorage, RetryPolicy, RetryingChecker};
pub use app::{CheckService, UploadReceipt};
pub use config::AppConfig;
pub use crate::core::event_bus::{EventBus, EventPayload, JobEvent, RunChannel, Subscription};
pub use crate::core::exporter::{ExportFile, ExportFormat, ResultExporter};
pub use crate::core::job_state::{JobSnapshot, JobState};
pub use crate::core::orchestrator::{BatchOrchestrator, OrchestratorSettings};
pub use crate::core::source::EmailSource;
pub use domain::model::{
    Aggregate, CheckRecord, JobId, JobStatus, ValidationOutcome, ValidationStatus,
};
pub use domain::ports::{Checker, Storage};
pub use utils::error::{CheckError, Result};

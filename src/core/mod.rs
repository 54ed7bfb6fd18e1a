pub mod event_bus;
pub mod exporter;
pub mod job_state;
pub mod orchestrator;
pub mod source;

pub use crate::domain::model::{
    Aggregate, CheckRecord, JobId, JobStatus, ValidationOutcome, ValidationStatus,
};
pub use crate::domain::ports::{Checker, Storage};
pub use crate::utils::error::Result;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("No email addresses found in input")]
    EmptyBatch,

    #[error("Job '{job_id}' is already running")]
    JobAlreadyRunning { job_id: String },

    #[error("Job '{job_id}' cannot {action} while {status}")]
    InvalidState {
        job_id: String,
        action: String,
        status: String,
    },

    #[error("Unknown job: {job_id}")]
    UnknownJob { job_id: String },

    #[error("Unknown category: {category}")]
    UnknownCategory { category: String },

    #[error("Checker failure: {message}")]
    Checker { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 呼叫端的請求有誤 (輸入、類別、未知 job)
    Client,
    /// job 生命週期不允許此操作
    Lifecycle,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CheckError {
    pub fn invalid_state(job_id: &str, action: &str, status: impl ToString) -> Self {
        CheckError::InvalidState {
            job_id: job_id.to_string(),
            action: action.to_string(),
            status: status.to_string(),
        }
    }

    pub fn checker(message: impl Into<String>) -> Self {
        CheckError::Checker {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CheckError::InvalidInput { .. }
            | CheckError::EmptyBatch
            | CheckError::UnknownJob { .. }
            | CheckError::UnknownCategory { .. } => ErrorCategory::Client,
            CheckError::JobAlreadyRunning { .. } | CheckError::InvalidState { .. } => {
                ErrorCategory::Lifecycle
            }
            CheckError::ConfigError { .. }
            | CheckError::ConfigValidationError { .. }
            | CheckError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            CheckError::Checker { .. }
            | CheckError::IoError(_)
            | CheckError::CsvError(_)
            | CheckError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Lifecycle => ErrorSeverity::Low,
            ErrorCategory::Client => ErrorSeverity::Medium,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => match self {
                CheckError::Checker { .. } => ErrorSeverity::Medium,
                _ => ErrorSeverity::Critical,
            },
        }
    }

    /// 4xx 類錯誤：不是伺服器本身的問題
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Client | ErrorCategory::Lifecycle
        )
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            CheckError::InvalidInput { .. } => {
                "The uploaded file could not be read as text".to_string()
            }
            CheckError::EmptyBatch => "The uploaded file contains no email addresses".to_string(),
            CheckError::JobAlreadyRunning { job_id } => {
                format!("A validation run named '{}' is still in progress", job_id)
            }
            CheckError::InvalidState { action, status, .. } => {
                format!("Cannot {} a job that is {}", action, status)
            }
            CheckError::UnknownJob { job_id } => format!("No validation run named '{}'", job_id),
            CheckError::UnknownCategory { category } => format!(
                "'{}' is not a result category (expected valid, bounced or error)",
                category
            ),
            CheckError::ConfigError { .. }
            | CheckError::ConfigValidationError { .. }
            | CheckError::InvalidConfigValueError { .. } => {
                format!("Configuration problem: {}", self)
            }
            _ => format!("Internal error: {}", self),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            CheckError::InvalidInput { .. } => "Save the file as UTF-8 plain text and upload it again",
            CheckError::EmptyBatch => "Put one email address per line",
            CheckError::JobAlreadyRunning { .. } => {
                "Wait for the current run to finish or cancel it first"
            }
            CheckError::InvalidState { .. } => "Check the job status before sending a command",
            CheckError::UnknownJob { .. } => "Upload a file to start a new run",
            CheckError::UnknownCategory { .. } => "Use one of: valid, bounced, error",
            CheckError::Checker { .. } => "Retry later; the checker backend may be unavailable",
            CheckError::ConfigError { .. }
            | CheckError::ConfigValidationError { .. }
            | CheckError::InvalidConfigValueError { .. } => {
                "Fix the configuration file and run again"
            }
            CheckError::IoError(_) => "Check file paths and permissions",
            CheckError::CsvError(_) | CheckError::SerializationError(_) => {
                "Report this as a bug with the input that triggered it"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, CheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_errors_are_client_errors() {
        let err = CheckError::invalid_state("job-1", "pause", "completed");
        assert_eq!(err.category(), ErrorCategory::Lifecycle);
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "Job 'job-1' cannot pause while completed");
    }

    #[test]
    fn test_unknown_category_is_client_error() {
        let err = CheckError::UnknownCategory {
            category: "spam".to_string(),
        };
        assert!(err.is_client_error());
        assert_eq!(err.severity(), ErrorSeverity::Medium);
    }

    #[test]
    fn test_io_error_is_critical_system_error() {
        let err = CheckError::from(std::io::Error::other("disk gone"));
        assert_eq!(err.category(), ErrorCategory::System);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(!err.is_client_error());
    }
}

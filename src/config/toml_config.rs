use crate::adapters::RetryPolicy;
use crate::core::exporter::ExportFormat;
use crate::core::orchestrator::{OrchestratorSettings, DEFAULT_CHECK_TIMEOUT, DEFAULT_ITEM_DELAY};
use crate::core::source::EmailSource;
use crate::utils::error::{CheckError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is a valid regex"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub orchestrator: OrchestratorConfig,
    pub checker: CheckerConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub dedup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// 0 代表不設上限
    pub check_timeout_seconds: u64,
    pub item_delay_ms: u64,
    pub event_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            check_timeout_seconds: DEFAULT_CHECK_TIMEOUT.as_secs(),
            item_delay_ms: DEFAULT_ITEM_DELAY.as_millis() as u64,
            event_capacity: crate::core::event_bus::DEFAULT_EVENT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    pub allowed_domains: Vec<String>,
    pub max_attempts: u32,
    pub initial_wait_ms: u64,
    pub backoff_base: f64,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            allowed_domains: Vec::new(),
            max_attempts: policy.max_attempts,
            initial_wait_ms: policy.initial_wait.as_millis() as u64,
            backoff_base: policy.backoff_base,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub format: String,
    pub output_path: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Lines.to_string(),
            output_path: "./downloads".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: String,
    pub verbose: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "compact".to_string(),
            verbose: false,
        }
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置，支援 ${VAR} 環境變數替換
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);

        toml::from_str(&processed).map_err(|e| CheckError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_PATTERN
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_positive_number(
            "orchestrator.event_capacity",
            self.orchestrator.event_capacity,
            1,
        )?;
        validation::validate_range("checker.max_attempts", self.checker.max_attempts, 1, 10)?;
        validation::validate_range("checker.backoff_base", self.checker.backoff_base, 1.0, 10.0)?;
        for domain in &self.checker.allowed_domains {
            validation::validate_non_empty_string("checker.allowed_domains", domain)?;
        }
        validation::validate_path("export.output_path", &self.export.output_path)?;
        validation::validate_one_of("export.format", &self.export.format, &["lines", "txt", "csv"])?;
        validation::validate_one_of("logging.format", &self.logging.format, &["compact", "json"])?;

        Ok(())
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        let timeout = self.orchestrator.check_timeout_seconds;
        OrchestratorSettings {
            check_timeout: (timeout > 0).then(|| Duration::from_secs(timeout)),
            item_delay: Duration::from_millis(self.orchestrator.item_delay_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.checker.max_attempts,
            initial_wait: Duration::from_millis(self.checker.initial_wait_ms),
            backoff_base: self.checker.backoff_base,
        }
    }

    pub fn export_format(&self) -> Result<ExportFormat> {
        self.export.format.parse()
    }

    pub fn email_source(&self) -> EmailSource {
        EmailSource::new().with_dedup(self.source.dedup)
    }

    pub fn json_logs(&self) -> bool {
        self.logging.format == "json"
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

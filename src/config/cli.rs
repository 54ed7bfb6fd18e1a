use crate::config::toml_config::AppConfig;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "mail-batch")]
#[command(about = "Validate a list of email addresses as a pausable batch job")]
pub struct CliConfig {
    /// File with one email address per line
    pub input: String,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(long, default_value = "cli")]
    pub job_id: String,

    /// Directory for per-category export files
    #[arg(long)]
    pub output_path: Option<String>,

    /// Export format: lines or csv
    #[arg(long)]
    pub format: Option<String>,

    /// Remove duplicate addresses before checking
    #[arg(long)]
    pub dedup: bool,

    #[arg(long, value_delimiter = ',')]
    pub allowed_domains: Vec<String>,

    /// Per-address check timeout in seconds (0 disables)
    #[arg(long)]
    pub check_timeout: Option<u64>,

    #[arg(long)]
    pub item_delay_ms: Option<u64>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    /// 命令列參數覆蓋設定檔
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(output_path) = &self.output_path {
            config.export.output_path = output_path.clone();
        }
        if let Some(format) = &self.format {
            config.export.format = format.clone();
        }
        if self.dedup {
            config.source.dedup = true;
        }
        if !self.allowed_domains.is_empty() {
            config.checker.allowed_domains = self.allowed_domains.clone();
        }
        if let Some(timeout) = self.check_timeout {
            config.orchestrator.check_timeout_seconds = timeout;
        }
        if let Some(delay) = self.item_delay_ms {
            config.orchestrator.item_delay_ms = delay;
        }
        if self.verbose {
            config.logging.verbose = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_file_values() {
        let cli = CliConfig::parse_from([
            "mail-batch",
            "emails.txt",
            "--dedup",
            "--format",
            "csv",
            "--allowed-domains",
            "gmail.com,example.com",
            "--check-timeout",
            "0",
        ]);
        let mut config = AppConfig::default();

        cli.apply_overrides(&mut config);

        assert_eq!(cli.input, "emails.txt");
        assert_eq!(cli.job_id, "cli");
        assert!(config.source.dedup);
        assert_eq!(config.export.format, "csv");
        assert_eq!(config.checker.allowed_domains, vec!["gmail.com", "example.com"]);
        assert!(config.orchestrator_settings().check_timeout.is_none());
        assert_eq!(config.export.output_path, "./downloads");
    }
}

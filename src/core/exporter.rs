use crate::core::job_state::JobSnapshot;
use crate::domain::model::{CheckRecord, ValidationStatus};
use crate::utils::error::{CheckError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// 每行一個地址 (.txt)
    #[default]
    Lines,
    /// address,status,message,timestamp
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Lines => "txt",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Lines => "text/plain; charset=utf-8",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Lines => f.write_str("lines"),
            ExportFormat::Csv => f.write_str("csv"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lines" | "txt" => Ok(ExportFormat::Lines),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(CheckError::InvalidConfigValueError {
                field: "export.format".to_string(),
                value: other.to_string(),
                reason: "Unsupported format. Valid formats: lines, csv".to_string(),
            }),
        }
    }
}

/// 一個可下載的匯出檔
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResultExporter {
    format: ExportFormat,
}

impl ResultExporter {
    pub fn new(format: ExportFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn file_name(&self, category: ValidationStatus) -> String {
        format!("{}_emails.{}", category, self.format.extension())
    }

    /// Renders the results of one category in input order. Works on
    /// a snapshot, so exporting a running job yields what exists so far.
    ///
    /// A category with no results renders as an empty body (only the header
    /// row for CSV), never an error. A transport that should answer "No
    /// {category} emails to download" instead checks
    /// `snapshot.aggregate.of(category) == 0` before calling this.
    pub fn export(&self, snapshot: &JobSnapshot, category: ValidationStatus) -> Result<Vec<u8>> {
        let records = snapshot.results_for(category);
        let body = match self.format {
            ExportFormat::Lines => render_lines(records),
            ExportFormat::Csv => render_csv(records)?,
        };

        tracing::debug!(
            "Exported {} {} results of job {} ({} bytes)",
            snapshot.aggregate.of(category),
            category,
            snapshot.job_id,
            body.len()
        );
        Ok(body)
    }

    pub fn export_file(&self, snapshot: &JobSnapshot, category: ValidationStatus) -> Result<ExportFile> {
        Ok(ExportFile {
            file_name: self.file_name(category),
            content_type: self.format.content_type(),
            body: self.export(snapshot, category)?,
        })
    }
}

fn render_lines<'a>(records: impl Iterator<Item = &'a CheckRecord>) -> Vec<u8> {
    let lines: Vec<&str> = records.map(|record| record.address.as_str()).collect();
    lines.join("\n").into_bytes()
}

#[derive(Serialize)]
struct CsvRow<'a> {
    address: &'a str,
    status: ValidationStatus,
    message: &'a str,
    timestamp: String,
}

fn render_csv<'a>(records: impl Iterator<Item = &'a CheckRecord>) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(["address", "status", "message", "timestamp"])?;

    for record in records {
        writer.serialize(CsvRow {
            address: &record.address,
            status: record.outcome.status,
            message: &record.outcome.message,
            timestamp: record.outcome.timestamp.to_rfc3339(),
        })?;
    }

    writer
        .into_inner()
        .map_err(|e| CheckError::IoError(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job_state::JobState;
    use crate::domain::model::{JobId, ValidationOutcome};

    fn snapshot() -> JobSnapshot {
        let mut state = JobState::new(
            JobId::from("export"),
            vec![
                "a@gmail.com".to_string(),
                "gone@gmail.com".to_string(),
                "b@gmail.com".to_string(),
                "not-an-email".to_string(),
            ],
        )
        .unwrap();
        state.record(ValidationOutcome::valid("Mailbox exists")).unwrap();
        state.record(ValidationOutcome::bounced("Mailbox does not exist")).unwrap();
        state.record(ValidationOutcome::valid("Mailbox exists")).unwrap();
        state.snapshot()
    }

    #[test]
    fn test_lines_export_keeps_input_order() {
        let exporter = ResultExporter::new(ExportFormat::Lines);
        let body = exporter.export(&snapshot(), ValidationStatus::Valid).unwrap();

        assert_eq!(String::from_utf8(body).unwrap(), "a@gmail.com\nb@gmail.com");
    }

    #[test]
    fn test_partial_export_of_running_job() {
        let exporter = ResultExporter::default();
        let body = exporter.export(&snapshot(), ValidationStatus::Error).unwrap();

        // not-an-email 尚未處理
        assert!(body.is_empty());
    }

    #[test]
    fn test_csv_export_has_header_and_escapes_fields() {
        let mut state = JobState::new(JobId::from("csv"), vec!["x@gmail.com".to_string()]).unwrap();
        state
            .record(ValidationOutcome::bounced("Rejected, code 550"))
            .unwrap();

        let exporter = ResultExporter::new(ExportFormat::Csv);
        let body = exporter.export(&state.snapshot(), ValidationStatus::Bounced).unwrap();
        let text = String::from_utf8(body).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "address,status,message,timestamp");
        assert!(lines[1].starts_with("x@gmail.com,bounced,\"Rejected, code 550\","));
    }

    #[test]
    fn test_csv_export_of_empty_category_is_header_only() {
        let exporter = ResultExporter::new(ExportFormat::Csv);
        let body = exporter.export(&snapshot(), ValidationStatus::Error).unwrap();

        assert_eq!(String::from_utf8(body).unwrap(), "address,status,message,timestamp\n");
    }

    #[test]
    fn test_export_file_metadata() {
        let exporter = ResultExporter::new(ExportFormat::Csv);
        let file = exporter.export_file(&snapshot(), ValidationStatus::Bounced).unwrap();

        assert_eq!(file.file_name, "bounced_emails.csv");
        assert_eq!(file.content_type, "text/csv; charset=utf-8");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("txt".parse::<ExportFormat>().unwrap(), ExportFormat::Lines);
        assert!("xlsx".parse::<ExportFormat>().is_err());
    }
}

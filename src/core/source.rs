use crate::utils::error::{CheckError, Result};
use std::collections::HashSet;

const BOM: char = '\u{feff}';

/// 解析後的地址與統計
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSource {
    pub addresses: Vec<String>,
    pub original_count: usize,
    pub duplicates_removed: usize,
}

/// Turns an uploaded text payload into candidate addresses, one per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailSource {
    dedup: bool,
}

impl EmailSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dedup(mut self, dedup: bool) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn parse(&self, raw: &[u8]) -> Result<Vec<String>> {
        Ok(self.parse_with_stats(raw)?.addresses)
    }

    pub fn parse_with_stats(&self, raw: &[u8]) -> Result<ParsedSource> {
        let text = std::str::from_utf8(raw).map_err(|e| CheckError::InvalidInput {
            message: format!("input is not valid UTF-8 text: {}", e),
        })?;

        let tokens: Vec<String> = text
            .split(['\n', '\r'])
            .map(clean_line)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        let original_count = tokens.len();

        let addresses = if self.dedup {
            let mut seen = HashSet::with_capacity(tokens.len());
            tokens
                .into_iter()
                .filter(|address| seen.insert(address.clone()))
                .collect()
        } else {
            tokens
        };

        tracing::debug!(
            "Parsed {} addresses ({} lines before dedup)",
            addresses.len(),
            original_count
        );

        Ok(ParsedSource {
            duplicates_removed: original_count - addresses.len(),
            original_count,
            addresses,
        })
    }
}

fn clean_line(line: &str) -> &str {
    line.trim().trim_start_matches(BOM).trim()
}

use crate::core::{Checker, ValidationOutcome};
use crate::utils::error::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9-]+(\.[a-zA-Z0-9-]+)*$")
        .expect("email pattern is a valid regex")
});

/// Offline checker: syntax plus an optional domain allow-list.
///
/// Never touches the network, so it never returns `Err`.
#[derive(Debug, Clone, Default)]
pub struct FormatChecker {
    allowed_domains: Vec<String>,
}

impl FormatChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 空清單代表不限網域
    pub fn with_allowed_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_domains = domains
            .into_iter()
            .map(|d| d.as_ref().trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        self
    }

    pub fn classify(&self, address: &str) -> ValidationOutcome {
        let address = address.trim_start_matches('\u{feff}').trim();
        let domain = address
            .rsplit_once('@')
            .map(|(_, domain)| domain.to_lowercase())
            .unwrap_or_default();

        if !self.allowed_domains.is_empty() && !self.allowed_domains.contains(&domain) {
            return ValidationOutcome::error(format!("Domain not allowed (domain: {})", domain));
        }

        if !EMAIL_PATTERN.is_match(address) {
            return ValidationOutcome::error("Invalid email format");
        }

        ValidationOutcome::valid("Address format accepted")
    }
}

#[async_trait]
impl Checker for FormatChecker {
    async fn check(&self, address: &str) -> Result<ValidationOutcome> {
        Ok(self.classify(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ValidationStatus;

    #[test]
    fn test_accepts_well_formed_addresses() {
        let checker = FormatChecker::new();

        for address in ["a@gmail.com", "first.last+tag@example.co.uk", "o'neil@mail-host.org"] {
            assert_eq!(checker.classify(address).status, ValidationStatus::Valid, "{}", address);
        }
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        let checker = FormatChecker::new();

        for address in ["not-an-email", "a@", "@gmail.com", "a b@gmail.com", "a@gmail..com"] {
            let outcome = checker.classify(address);
            assert_eq!(outcome.status, ValidationStatus::Error, "{}", address);
            assert_eq!(outcome.message, "Invalid email format");
        }
    }

    #[test]
    fn test_domain_allow_list_is_case_insensitive() {
        let checker = FormatChecker::new().with_allowed_domains(["Gmail.com"]);

        assert_eq!(checker.classify("a@GMAIL.COM").status, ValidationStatus::Valid);

        let outcome = checker.classify("a@yahoo.com");
        assert_eq!(outcome.status, ValidationStatus::Error);
        assert!(outcome.message.contains("yahoo.com"));
    }

    #[tokio::test]
    async fn test_check_never_fails() {
        let checker = FormatChecker::new();
        let outcome = checker.check("\u{feff}a@gmail.com").await.unwrap();

        assert_eq!(outcome.status, ValidationStatus::Valid);
    }
}

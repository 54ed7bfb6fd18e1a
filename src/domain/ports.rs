use crate::domain::model::ValidationOutcome;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Classifies one address.
///
/// A rejected or malformed address is a normal `Ok` outcome (`bounced` or
/// `error`). `Err` is reserved for infrastructure failures such as a lost
/// connection; the orchestrator records those as `error` outcomes.
#[async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, address: &str) -> Result<ValidationOutcome>;
}

pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

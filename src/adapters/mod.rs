// Adapters layer: concrete implementations of the domain ports.

pub mod format_checker;
pub mod retry;
pub mod storage;

pub use format_checker::FormatChecker;
pub use retry::{RetryPolicy, RetryingChecker};
pub use storage::LocalStorage;

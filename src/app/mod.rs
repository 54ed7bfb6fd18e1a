pub mod service;

pub use service::{CheckService, UploadReceipt};

//! Basic library shared by the power control services
//!
//! Provides:
//! - logging initialization (console + daily rolling files)
//! - structured error records and the error-logging collaborator
//! - service bootstrap and graceful shutdown helpers

pub mod error_logging;
pub mod logging;
pub mod service_bootstrap;
pub mod shutdown;

pub use error_logging::{
    ErrorLogging, ErrorRecord, FileErrorLogging, MemoryErrorLogging, Severity, SubmissionError,
};

// Re-export common dependencies
pub use anyhow;
pub use serde_json;
pub use tokio;

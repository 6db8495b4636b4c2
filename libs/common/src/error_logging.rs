//! Structured error records and the error-logging collaborator
//!
//! Fault reporters build an [`ErrorRecord`] and hand it to an
//! [`ErrorLogging`] implementation. Submission may fail independently of the
//! fault being reported; callers decide whether to swallow that failure.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error record severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Informational,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Informational => "informational",
        };
        f.write_str(s)
    }
}

/// One structured error record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Stable error identifier, e.g. `xyz.openbmc_project.Power.Error.Shutdown`
    pub message: String,
    pub severity: Severity,
    /// Key/value diagnostic bundle
    #[serde(default)]
    pub additional_data: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(
        message: impl Into<String>,
        severity: Severity,
        additional_data: BTreeMap<String, String>,
    ) -> Self {
        Self {
            message: message.into(),
            severity,
            additional_data,
            timestamp: Utc::now(),
        }
    }
}

/// Failure to submit an error record
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error-logging collaborator
pub trait ErrorLogging: Send + Sync {
    /// Submit a record; fire-and-forget from the caller's point of view
    fn submit(&self, record: &ErrorRecord) -> Result<(), SubmissionError>;
}

/// Persists records as JSON lines in `{dir}/{YYYYMMDD}_errors.jsonl`
pub struct FileErrorLogging {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileErrorLogging {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, record: &ErrorRecord) -> PathBuf {
        self.dir
            .join(format!("{}_errors.jsonl", record.timestamp.format("%Y%m%d")))
    }
}

impl ErrorLogging for FileErrorLogging {
    fn submit(&self, record: &ErrorRecord) -> Result<(), SubmissionError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.lock.lock();
        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_path(record))?;
        file.write_all(line.as_bytes())?;

        tracing::debug!("Error record: {} ({})", record.message, record.severity);
        Ok(())
    }
}

/// Keeps submitted records in memory (tests, simulation)
#[derive(Default)]
pub struct MemoryErrorLogging {
    records: Mutex<Vec<ErrorRecord>>,
}

impl MemoryErrorLogging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ErrorRecord> {
        self.records.lock().clone()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl ErrorLogging for MemoryErrorLogging {
    fn submit(&self, record: &ErrorRecord) -> Result<(), SubmissionError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

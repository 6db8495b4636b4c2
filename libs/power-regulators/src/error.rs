//! Regulator control error types

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::device_access::DeviceAccessError;

/// Result type for regulator operations
pub type Result<T> = std::result::Result<T, RegulatorsError>;

/// Kind of object registered in the ID map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Chassis,
    Device,
    Rail,
    Rule,
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IdKind::Chassis => "chassis",
            IdKind::Device => "device",
            IdKind::Rail => "rail",
            IdKind::Rule => "rule",
        };
        f.write_str(s)
    }
}

/// Regulator control errors
#[derive(Debug, Error)]
pub enum RegulatorsError {
    /// Configuration file could not be read, is malformed, or is invalid
    #[error("Configuration file error: {path}: {reason}")]
    ConfigFile { path: PathBuf, reason: String },

    /// Invalid element found while parsing a configuration document
    #[error("{0}")]
    InvalidConfig(String),

    /// ID reference could not be resolved
    #[error("Unable to find {kind} with ID \"{id}\"")]
    NotFound { kind: IdKind, id: String },

    /// Same ID registered twice
    #[error("Duplicate {kind} ID: {id}")]
    DuplicateId { kind: IdKind, id: String },

    /// Hardware access failed while executing an action
    #[error("Action failed: {action}")]
    DeviceAccess {
        action: String,
        #[source]
        source: DeviceAccessError,
    },

    /// Computed or read-back value is not acceptable
    #[error("Validation error: {0}")]
    Validation(String),

    /// Nested `run_rule` calls went too deep (usually a rule cycle)
    #[error("Maximum rule depth exceeded by rule {0}")]
    RuleDepthExceeded(String),
}

impl RegulatorsError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(kind: IdKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Render an error and every `source()` below it, outermost first
pub fn format_error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut messages = vec![err.to_string()];
    let mut current = err.source();
    while let Some(source) = current {
        messages.push(source.to_string());
        current = source.source();
    }
    messages.join(": ")
}

//! Power sequencer error types

use std::path::PathBuf;

use thiserror::Error;

/// Result type for power sequencer operations
pub type Result<T> = std::result::Result<T, SequencerError>;

#[derive(Debug, Error)]
pub enum SequencerError {
    /// Failure reported by the hardware driver
    #[error("{0}")]
    Driver(String),

    /// Rail is configured for a PMBus check but has no PAGE
    #[error("A PMBus PAGE is required for rail {0}")]
    PageRequired(String),

    #[error("Unable to read {register} value for rail {rail}: {source}")]
    RailRead {
        register: &'static str,
        rail: String,
        #[source]
        source: Box<SequencerError>,
    },

    #[error(
        "Invalid GPIO line offset {line} for rail {rail}: Device only has {count} GPIO values"
    )]
    InvalidGpioLine {
        line: usize,
        rail: String,
        count: usize,
    },

    /// Register read through the PMBus driver failed
    #[error("Unable to read {register} for {target}: {source}")]
    DriverRead {
        register: &'static str,
        target: String,
        #[source]
        source: Box<SequencerError>,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown power sequencer device type: {0}")]
    UnknownDeviceType(String),

    /// Pgood fault isolation could not complete
    #[error("Unable to determine if a pgood fault occurred in device {device}: {source}")]
    PgoodFault {
        device: String,
        #[source]
        source: Box<SequencerError>,
    },
}

impl SequencerError {
    pub fn driver(msg: impl Into<String>) -> Self {
        Self::Driver(msg.into())
    }
}

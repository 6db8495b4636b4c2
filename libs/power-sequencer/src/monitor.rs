//! Power-on failure reporting
//!
//! Every failure ends in exactly one critical error record. Records that
//! cannot be submitted are logged locally and dropped.

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{ErrorLogging, ErrorRecord, Severity};
use tracing::{error, info};

use crate::standard_device::{PmbusDriver, StandardDevice};

pub const POWER_ON_TIMEOUT_ERROR: &str = "xyz.openbmc_project.Power.Error.PowerOnTimeout";
pub const SHUTDOWN_ERROR: &str = "xyz.openbmc_project.Power.Error.Shutdown";

pub struct PowerSequencerMonitor {
    error_logging: Arc<dyn ErrorLogging>,
}

impl PowerSequencerMonitor {
    pub fn new(error_logging: Arc<dyn ErrorLogging>) -> Self {
        Self { error_logging }
    }

    /// Report a power-on failure with no device-level isolation
    ///
    /// A known power supply error takes priority over a timeout.
    pub fn on_failure(&self, timed_out: bool, power_supply_error: &str) {
        let message = if !power_supply_error.is_empty() {
            power_supply_error
        } else if timed_out {
            POWER_ON_TIMEOUT_ERROR
        } else {
            SHUTDOWN_ERROR
        };
        self.log_error(message, BTreeMap::new());
    }

    /// Report a pgood fault, isolated to a rail of `device` when possible
    pub fn on_pgood_fault(
        &self,
        device: &StandardDevice,
        driver: &dyn PmbusDriver,
        timed_out: bool,
        power_supply_error: &str,
    ) {
        let mut additional_data = BTreeMap::new();
        match device.find_pgood_fault(driver, power_supply_error, &mut additional_data) {
            Ok(message) if !message.is_empty() => self.log_error(&message, additional_data),
            Ok(_) => {
                info!("No pgood fault found in device {}", device.name());
                self.on_failure(timed_out, power_supply_error);
            },
            Err(e) => {
                error!("{}", e);
                self.on_failure(timed_out, power_supply_error);
            },
        }
    }

    /// Submit one critical record; `_PID` is always added
    pub fn log_error(&self, message: &str, mut additional_data: BTreeMap<String, String>) {
        additional_data.insert("_PID".to_string(), std::process::id().to_string());
        let record = ErrorRecord::new(message, Severity::Critical, additional_data);

        match self.error_logging.submit(&record) {
            Ok(()) => info!("Logged error: {}", message),
            Err(e) => error!("Unable to log error, message: {}, error {}", message, e),
        }
    }
}

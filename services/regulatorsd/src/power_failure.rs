//! Power-on failure reporting for the `report-failure` command

use std::sync::Arc;

use common::ErrorLogging;
use power_sequencer::PowerSequencerMonitor;
use tracing::info;

use crate::config::SequencerConfig;

/// Log one error record for a failed power-on
///
/// With a configured sequencer the record names the rail that lost pgood
/// when it can be found.
pub fn report_power_on_failure(
    sequencer: Option<&SequencerConfig>,
    error_logging: Arc<dyn ErrorLogging>,
    timed_out: bool,
    power_supply_error: &str,
) -> anyhow::Result<()> {
    let monitor = PowerSequencerMonitor::new(error_logging);
    match sequencer {
        Some(sequencer) => {
            let device = sequencer.device()?;
            info!(
                "Checking {} device {} for a pgood fault",
                device.device_type(),
                device.name()
            );
            monitor.on_pgood_fault(&device, &sequencer.driver(), timed_out, power_supply_error);
        },
        None => monitor.on_failure(timed_out, power_supply_error),
    }
    Ok(())
}

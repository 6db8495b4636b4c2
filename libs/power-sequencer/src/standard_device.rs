//! Pgood fault isolation for a power sequencer device
//!
//! When the chassis loses pgood, the rails enabled by the sequencer are
//! examined in power-on order to find the one that failed first.

use std::collections::BTreeMap;

use tracing::error;

use crate::device_type::DeviceType;
use crate::error::{Result, SequencerError};
use crate::rail::SequencerRail;

/// Error identifier reported for a rail pgood fault
pub const VOLTAGE_FAULT_ERROR: &str = "xyz.openbmc_project.Power.Error.PowerSequencerVoltageFault";

/// Hardware reads needed for pgood fault isolation
pub trait PmbusDriver: Send + Sync {
    /// Hook run once before any other read
    fn prepare_for_pgood_fault_detection(&self) -> Result<()> {
        Ok(())
    }

    /// All GPIO values of the device, indexed by line offset
    fn gpio_values(&self) -> Result<Vec<i32>>;

    fn status_word(&self, page: u8) -> Result<u16>;

    fn status_vout(&self, page: u8) -> Result<u8>;

    fn read_vout(&self, page: u8) -> Result<f64>;

    fn vout_uv_fault_limit(&self, page: u8) -> Result<f64>;

    /// Manufacturer-specific status; only some devices provide it
    fn mfr_status(&self) -> Result<u64> {
        Err(SequencerError::driver("MFR_STATUS is not supported"))
    }
}

/// Sequencer device with its rails in power-on order
#[derive(Debug, Clone, PartialEq)]
pub struct StandardDevice {
    name: String,
    device_type: DeviceType,
    rails: Vec<SequencerRail>,
}

impl StandardDevice {
    pub fn new(name: impl Into<String>, rails: Vec<SequencerRail>) -> Self {
        Self {
            name: name.into(),
            device_type: DeviceType::Standard,
            rails,
        }
    }

    pub fn with_device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn rails(&self) -> &[SequencerRail] {
        &self.rails
    }

    /// Find the error to report for a pgood fault in this device
    ///
    /// Returns an empty string when no rail shows a fault. Debug data for the
    /// faulted rail is added to `additional_data`.
    pub fn find_pgood_fault(
        &self,
        driver: &dyn PmbusDriver,
        power_supply_error: &str,
        additional_data: &mut BTreeMap<String, String>,
    ) -> Result<String> {
        self.find_pgood_fault_inner(driver, power_supply_error, additional_data)
            .map_err(|e| SequencerError::PgoodFault {
                device: self.name.clone(),
                source: Box::new(e),
            })
    }

    fn find_pgood_fault_inner(
        &self,
        driver: &dyn PmbusDriver,
        power_supply_error: &str,
        additional_data: &mut BTreeMap<String, String>,
    ) -> Result<String> {
        driver.prepare_for_pgood_fault_detection()?;

        // Read once, shared by every rail; failures only disable the GPIO check
        let gpio_values = driver.gpio_values().unwrap_or_default();

        let Some(rail) = self.find_rail_with_pgood_fault(driver, &gpio_values, additional_data)?
        else {
            return Ok(String::new());
        };

        error!("Pgood fault found in rail monitored by device {}", self.name);

        let error = if rail.is_power_supply_rail() && !power_supply_error.is_empty() {
            power_supply_error.to_string()
        } else {
            VOLTAGE_FAULT_ERROR.to_string()
        };

        self.device_type.store_pgood_fault_debug_data(
            &self.name,
            driver,
            &gpio_values,
            additional_data,
        );

        Ok(error)
    }

    /// STATUS_VOUT is checked on every rail before the GPIO and voltage checks
    fn find_rail_with_pgood_fault(
        &self,
        driver: &dyn PmbusDriver,
        gpio_values: &[i32],
        additional_data: &mut BTreeMap<String, String>,
    ) -> Result<Option<&SequencerRail>> {
        for rail in &self.rails {
            if rail.has_pgood_fault_status_vout(driver, additional_data)? {
                return Ok(Some(rail));
            }
        }

        for rail in &self.rails {
            if rail.has_pgood_fault_gpio(driver, gpio_values, additional_data)?
                || rail.has_pgood_fault_output_voltage(driver, additional_data)?
            {
                return Ok(Some(rail));
            }
        }

        Ok(None)
    }
}

//! Voltage rail enabled by a power sequencer device

use std::collections::BTreeMap;

use tracing::{error, info};

use crate::error::{Result, SequencerError};
use crate::standard_device::PmbusDriver;

/// STATUS_VOUT bits that indicate a fault (OV fault, UV fault, TON_MAX fault)
pub const STATUS_VOUT_FAULT_MASK: u8 = 0x94;

/// GPIO that reports the pgood state of a rail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioConfig {
    /// Offset into the device's GPIO values
    pub line: usize,
    pub active_low: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequencerRail {
    name: String,
    page: Option<u8>,
    is_power_supply_rail: bool,
    check_status_vout: bool,
    compare_voltage_to_limit: bool,
    gpio: Option<GpioConfig>,
}

impl SequencerRail {
    /// Fails if a PMBus check is requested without a PAGE
    pub fn new(
        name: impl Into<String>,
        page: Option<u8>,
        is_power_supply_rail: bool,
        check_status_vout: bool,
        compare_voltage_to_limit: bool,
        gpio: Option<GpioConfig>,
    ) -> Result<Self> {
        let name = name.into();
        if (check_status_vout || compare_voltage_to_limit) && page.is_none() {
            return Err(SequencerError::PageRequired(name));
        }
        Ok(Self {
            name,
            page,
            is_power_supply_rail,
            check_status_vout,
            compare_voltage_to_limit,
            gpio,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page(&self) -> Option<u8> {
        self.page
    }

    pub fn is_power_supply_rail(&self) -> bool {
        self.is_power_supply_rail
    }

    pub fn gpio(&self) -> Option<GpioConfig> {
        self.gpio
    }

    fn read<T>(
        &self,
        register: &'static str,
        read: impl FnOnce(u8) -> Result<T>,
    ) -> Result<Option<T>> {
        let Some(page) = self.page else {
            return Ok(None);
        };
        read(page)
            .map(Some)
            .map_err(|e| SequencerError::RailRead {
                register,
                rail: self.name.clone(),
                source: Box::new(e),
            })
    }

    /// Fault bits set in STATUS_VOUT
    pub fn has_pgood_fault_status_vout(
        &self,
        driver: &dyn PmbusDriver,
        additional_data: &mut BTreeMap<String, String>,
    ) -> Result<bool> {
        if !self.check_status_vout {
            return Ok(false);
        }
        let Some(status_vout) = self.read("STATUS_VOUT", |page| driver.status_vout(page))? else {
            return Ok(false);
        };
        if status_vout & STATUS_VOUT_FAULT_MASK == 0 {
            return Ok(false);
        }

        error!(
            "Rail {} has fault bits set in STATUS_VOUT: 0x{:02x}",
            self.name, status_vout
        );
        additional_data.insert("STATUS_VOUT".to_string(), format!("0x{:02x}", status_vout));
        self.store_pgood_fault_debug_data(driver, additional_data);
        Ok(true)
    }

    /// Pgood GPIO holds its inactive value
    ///
    /// Rails without a GPIO, or checked against an empty value list, never fault here.
    pub fn has_pgood_fault_gpio(
        &self,
        driver: &dyn PmbusDriver,
        gpio_values: &[i32],
        additional_data: &mut BTreeMap<String, String>,
    ) -> Result<bool> {
        let Some(gpio) = self.gpio else {
            return Ok(false);
        };
        if gpio_values.is_empty() {
            return Ok(false);
        }
        let value = *gpio_values
            .get(gpio.line)
            .ok_or_else(|| SequencerError::InvalidGpioLine {
                line: gpio.line,
                rail: self.name.clone(),
                count: gpio_values.len(),
            })?;

        let active_value = if gpio.active_low { 0 } else { 1 };
        if value == active_value {
            return Ok(false);
        }

        error!(
            "Rail {} pgood GPIO line offset {} has inactive value {}",
            self.name, gpio.line, value
        );
        additional_data.insert("GPIO_LINE".to_string(), gpio.line.to_string());
        additional_data.insert("GPIO_VALUE".to_string(), value.to_string());
        self.store_pgood_fault_debug_data(driver, additional_data);
        Ok(true)
    }

    /// READ_VOUT at or below VOUT_UV_FAULT_LIMIT
    pub fn has_pgood_fault_output_voltage(
        &self,
        driver: &dyn PmbusDriver,
        additional_data: &mut BTreeMap<String, String>,
    ) -> Result<bool> {
        if !self.compare_voltage_to_limit {
            return Ok(false);
        }
        let Some(vout) = self.read("READ_VOUT", |page| driver.read_vout(page))? else {
            return Ok(false);
        };
        let Some(uv_limit) =
            self.read("VOUT_UV_FAULT_LIMIT", |page| driver.vout_uv_fault_limit(page))?
        else {
            return Ok(false);
        };
        if vout > uv_limit {
            return Ok(false);
        }

        error!(
            "Rail {} output voltage {}V is <= UV fault limit {}V",
            self.name, vout, uv_limit
        );
        additional_data.insert("READ_VOUT".to_string(), vout.to_string());
        additional_data.insert("VOUT_UV_FAULT_LIMIT".to_string(), uv_limit.to_string());
        self.store_pgood_fault_debug_data(driver, additional_data);
        Ok(true)
    }

    fn store_pgood_fault_debug_data(
        &self,
        driver: &dyn PmbusDriver,
        additional_data: &mut BTreeMap<String, String>,
    ) {
        error!("Pgood fault detected in rail {}", self.name);
        additional_data.insert("RAIL_NAME".to_string(), self.name.clone());

        // STATUS_WORD is best effort
        if let Some(page) = self.page {
            if let Ok(status_word) = driver.status_word(page) {
                info!("Rail {} STATUS_WORD: 0x{:04x}", self.name, status_word);
                additional_data.insert("STATUS_WORD".to_string(), format!("0x{:04x}", status_word));
            }
        }
    }
}

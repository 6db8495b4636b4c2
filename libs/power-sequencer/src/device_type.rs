//! Device-specific pgood fault debug data
//!
//! Every sequencer records its name and GPIO values. UCD90x devices also
//! record MFR_STATUS, and their GPIO values are split into named pins or
//! pin groups when the value count matches the part.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use crate::error::SequencerError;
use crate::standard_device::PmbusDriver;

/// UCD90160 pin names in GPIO line offset order
const UCD90160_PIN_NAMES: [&str; 26] = [
    "FPWM1_GPIO5",
    "FPWM2_GPIO6",
    "FPWM3_GPIO7",
    "FPWM4_GPIO8",
    "FPWM5_GPIO9",
    "FPWM6_GPIO10",
    "FPWM7_GPIO11",
    "FPWM8_GPIO12",
    "GPI1_PWM1",
    "GPI2_PWM2",
    "GPI3_PWM3",
    "GPI4_PWM4",
    "GPIO14",
    "GPIO15",
    "TDO_GPIO20",
    "TCK_GPIO19",
    "TMS_GPIO22",
    "TDI_GPIO21",
    "GPIO1",
    "GPIO2",
    "GPIO3",
    "GPIO4",
    "GPIO13",
    "GPIO16",
    "GPIO17",
    "GPIO18",
];

/// Pins per journal line for the UCD90160
const UCD90160_PINS_PER_LINE: usize = 4;

/// Consecutive UCD90320 pins reported together
struct GpioGroup {
    additional_data_name: &'static str,
    journal_name: &'static str,
    offset: usize,
    count: usize,
}

/// Offsets are UCD90320 Pin IDs, which are also the GPIO line offsets
const UCD90320_GPIO_GROUPS: [GpioGroup; 5] = [
    GpioGroup {
        additional_data_name: "MAR01_24_GPIO_VALUES",
        journal_name: "MAR01-24",
        offset: 0,
        count: 24,
    },
    GpioGroup {
        additional_data_name: "EN1_32_GPIO_VALUES",
        journal_name: "EN1-32",
        offset: 24,
        count: 32,
    },
    GpioGroup {
        additional_data_name: "LGP01_16_GPIO_VALUES",
        journal_name: "LGP01-16",
        offset: 56,
        count: 16,
    },
    GpioGroup {
        additional_data_name: "DMON1_8_GPIO_VALUES",
        journal_name: "DMON1-8",
        offset: 72,
        count: 8,
    },
    GpioGroup {
        additional_data_name: "GPIO1_4_GPIO_VALUES",
        journal_name: "GPIO1-4",
        offset: 80,
        count: 4,
    },
];

const UCD90320_GPIO_COUNT: usize = 84;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceType {
    /// Any PMBus sequencer; GPIO values are stored as one list
    #[default]
    Standard,
    Ucd90160,
    Ucd90320,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Ucd90160 => "ucd90160",
            Self::Ucd90320 => "ucd90320",
        }
    }

    pub fn has_mfr_status(&self) -> bool {
        matches!(self, Self::Ucd90160 | Self::Ucd90320)
    }

    /// Record device-level debug data once a rail with a pgood fault is found
    pub(crate) fn store_pgood_fault_debug_data(
        &self,
        device_name: &str,
        driver: &dyn PmbusDriver,
        gpio_values: &[i32],
        additional_data: &mut BTreeMap<String, String>,
    ) {
        additional_data.insert("DEVICE_NAME".to_string(), device_name.to_string());
        if !gpio_values.is_empty() {
            self.store_gpio_values(device_name, gpio_values, additional_data);
        }

        if self.has_mfr_status() {
            match driver.mfr_status() {
                Ok(mfr_status) => {
                    let value = format!("0x{:x}", mfr_status);
                    info!("Device {} MFR_STATUS: {}", device_name, value);
                    additional_data.insert("MFR_STATUS".to_string(), value);
                },
                Err(e) => debug!("{}", e),
            }
        }
    }

    fn store_gpio_values(
        &self,
        device_name: &str,
        values: &[i32],
        additional_data: &mut BTreeMap<String, String>,
    ) {
        match self {
            Self::Ucd90160 if values.len() == UCD90160_PIN_NAMES.len() => {
                info!("Device {} GPIO values:", device_name);
                let names = UCD90160_PIN_NAMES.chunks(UCD90160_PINS_PER_LINE);
                for (names, values) in names.zip(values.chunks(UCD90160_PINS_PER_LINE)) {
                    info!("[{}]: {}", names.join(", "), format_gpio_values(values));
                    for (name, value) in names.iter().zip(values) {
                        additional_data.insert(name.to_string(), value.to_string());
                    }
                }
            },
            Self::Ucd90320 if values.len() == UCD90320_GPIO_COUNT => {
                info!("Device {} GPIO values:", device_name);
                for group in &UCD90320_GPIO_GROUPS {
                    let formatted =
                        format_gpio_values(&values[group.offset..group.offset + group.count]);
                    info!("{}: {}", group.journal_name, formatted);
                    additional_data.insert(group.additional_data_name.to_string(), formatted);
                }
            },
            // Unexpected count for a UCD part falls back to a plain list
            _ => {
                let formatted = format_gpio_values(values);
                info!("Device {} GPIO values: {}", device_name, formatted);
                additional_data.insert("GPIO_VALUES".to_string(), formatted);
            },
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = SequencerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" | "" => Ok(Self::Standard),
            "ucd90160" => Ok(Self::Ucd90160),
            "ucd90320" => Ok(Self::Ucd90320),
            _ => Err(SequencerError::UnknownDeviceType(s.to_string())),
        }
    }
}

pub(crate) fn format_gpio_values(values: &[i32]) -> String {
    let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", values.join(", "))
}

//! PMBus actions and data format conversion

use std::fmt;

use super::action_error;
use crate::environment::ActionEnvironment;
use crate::error::{RegulatorsError, Result};
use crate::sensors::{SensorReading, SensorType};

/// PMBus VOUT_MODE command code
pub const VOUT_MODE: u8 = 0x20;
/// PMBus VOUT_COMMAND command code
pub const VOUT_COMMAND: u8 = 0x21;

// ============================================================================
// Data formats
// ============================================================================

/// Encoding of a sensor value read by `pmbus_read_sensor`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorDataFormat {
    Linear11,
    Linear16,
}

impl fmt::Display for SensorDataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorDataFormat::Linear11 => f.write_str("linear_11"),
            SensorDataFormat::Linear16 => f.write_str("linear_16"),
        }
    }
}

/// Encoding of the VOUT_COMMAND value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoutDataFormat {
    Linear,
}

impl fmt::Display for VoutDataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("linear")
    }
}

/// Decoded VOUT_MODE byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoutMode {
    Linear { exponent: i8 },
    Vid,
    Direct,
    Ieee,
    Unknown(u8),
}

/// Bits 7..5 select the mode; for linear mode bits 4..0 are a signed exponent
pub fn parse_vout_mode(byte: u8) -> VoutMode {
    match byte >> 5 {
        0b000 => VoutMode::Linear {
            exponent: sign_extend_5(byte & 0x1F),
        },
        0b001 => VoutMode::Vid,
        0b010 => VoutMode::Direct,
        0b011 => VoutMode::Ieee,
        mode => VoutMode::Unknown(mode),
    }
}

fn sign_extend_5(bits: u8) -> i8 {
    ((bits << 3) as i8) >> 3
}

/// Linear11: bits 15..11 signed exponent, bits 10..0 signed mantissa
pub fn linear11_to_f64(raw: u16) -> f64 {
    let exponent = (raw as i16) >> 11;
    let mantissa = ((raw as i16) << 5) >> 5;
    f64::from(mantissa) * 2f64.powi(i32::from(exponent))
}

/// Linear16: unsigned mantissa with the exponent supplied separately
pub fn linear16_to_f64(raw: u16, exponent: i8) -> f64 {
    f64::from(raw) * 2f64.powi(i32::from(exponent))
}

/// Encode volts as a linear16 mantissa; `None` if it does not fit in 16 bits
pub fn linear16_from_volts(volts: f64, exponent: i8) -> Option<u16> {
    let raw = (volts * 2f64.powi(-i32::from(exponent))).round();
    if raw.is_finite() && (0.0..=f64::from(u16::MAX)).contains(&raw) {
        Some(raw as u16)
    } else {
        None
    }
}

fn read_vout_exponent(env: &ActionEnvironment<'_>, action: &dyn fmt::Display) -> Result<i8> {
    let device = env.device()?;
    let mode = env
        .services()
        .device_access()
        .read_byte(device, VOUT_MODE)
        .map_err(|e| action_error(action, e))?;
    match parse_vout_mode(mode) {
        VoutMode::Linear { exponent } => Ok(exponent),
        other => Err(RegulatorsError::validation(format!(
            "{}: unsupported VOUT_MODE 0x{:02X} ({:?}) on device {}",
            action,
            mode,
            other,
            device.id()
        ))),
    }
}

// ============================================================================
// pmbus_read_sensor
// ============================================================================

/// Read one sensor value and record it in the environment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PmbusReadSensor {
    pub sensor_type: SensorType,
    pub command: u8,
    pub format: SensorDataFormat,
    /// Linear16 exponent; read from VOUT_MODE when absent
    pub exponent: Option<i8>,
}

impl PmbusReadSensor {
    pub fn execute(&self, env: &mut ActionEnvironment<'_>) -> Result<bool> {
        let device = env.device()?;
        let raw = env
            .services()
            .device_access()
            .read_word(device, self.command)
            .map_err(|e| action_error(self, e))?;

        let value = match self.format {
            SensorDataFormat::Linear11 => linear11_to_f64(raw),
            SensorDataFormat::Linear16 => {
                let exponent = match self.exponent {
                    Some(exponent) => exponent,
                    None => read_vout_exponent(env, self)?,
                };
                linear16_to_f64(raw, exponent)
            },
        };

        env.set_value(self.sensor_type.as_str(), value);
        env.add_sensor_reading(SensorReading {
            sensor_type: self.sensor_type,
            value,
        });
        Ok(true)
    }
}

impl fmt::Display for PmbusReadSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pmbus_read_sensor: {{ type: {}, command: 0x{:02X}, format: {}",
            self.sensor_type, self.command, self.format
        )?;
        if let Some(exponent) = self.exponent {
            write!(f, ", exponent: {}", exponent)?;
        }
        f.write_str(" }")
    }
}

// ============================================================================
// pmbus_write_vout_command
// ============================================================================

/// Set the output voltage through VOUT_COMMAND
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PmbusWriteVoutCommand {
    /// Target volts; taken from the environment when absent
    pub volts: Option<f64>,
    pub format: VoutDataFormat,
    /// Linear exponent; read from VOUT_MODE when absent
    pub exponent: Option<i8>,
    /// Read VOUT_COMMAND back and compare with the written value
    pub is_verified: bool,
}

impl PmbusWriteVoutCommand {
    pub fn execute(&self, env: &mut ActionEnvironment<'_>) -> Result<bool> {
        let volts = self.volts.or(env.volts()).ok_or_else(|| {
            RegulatorsError::validation(format!("{}: no volts value defined", self))
        })?;

        let exponent = match self.exponent {
            Some(exponent) => exponent,
            None => read_vout_exponent(env, self)?,
        };

        let raw = linear16_from_volts(volts, exponent).ok_or_else(|| {
            RegulatorsError::validation(format!(
                "{}: {} volts cannot be encoded with exponent {}",
                self, volts, exponent
            ))
        })?;

        let device = env.device()?;
        let access = env.services().device_access();
        access
            .write_word(device, VOUT_COMMAND, raw)
            .map_err(|e| action_error(self, e))?;

        if self.is_verified {
            let read_back = access
                .read_word(device, VOUT_COMMAND)
                .map_err(|e| action_error(self, e))?;
            if read_back != raw {
                return Err(RegulatorsError::validation(format!(
                    "{}: device {} wrote 0x{:04X}, read back 0x{:04X}",
                    self,
                    device.id(),
                    raw,
                    read_back
                )));
            }
        }

        Ok(true)
    }
}

impl fmt::Display for PmbusWriteVoutCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("pmbus_write_vout_command: {")?;
        if let Some(volts) = self.volts {
            write!(f, " volts: {},", volts)?;
        }
        write!(f, " format: {}", self.format)?;
        if let Some(exponent) = self.exponent {
            write!(f, ", exponent: {}", exponent)?;
        }
        write!(f, ", is_verified: {} }}", self.is_verified)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::services::Services;
    use crate::system::System;
    use crate::topology::{Chassis, Device, I2cInterface};

    fn system() -> System {
        let device = Device::new(
            "vdd_reg",
            true,
            "/system/chassis/motherboard/vdd_reg",
            I2cInterface::new(1, 0x70),
            None,
            vec![],
        );
        System::new(vec![], vec![Chassis::new(1, None, vec![device])]).unwrap()
    }

    fn write_vout(
        volts: Option<f64>,
        exponent: Option<i8>,
        is_verified: bool,
    ) -> PmbusWriteVoutCommand {
        PmbusWriteVoutCommand {
            volts,
            format: VoutDataFormat::Linear,
            exponent,
            is_verified,
        }
    }

    #[test]
    fn test_parse_vout_mode() {
        assert_eq!(parse_vout_mode(0x17), VoutMode::Linear { exponent: -9 });
        assert_eq!(parse_vout_mode(0x1B), VoutMode::Linear { exponent: -5 });
        assert_eq!(parse_vout_mode(0x0F), VoutMode::Linear { exponent: 15 });
        assert_eq!(parse_vout_mode(0x20), VoutMode::Vid);
        assert_eq!(parse_vout_mode(0x40), VoutMode::Direct);
        assert_eq!(parse_vout_mode(0x60), VoutMode::Ieee);
        assert_eq!(parse_vout_mode(0xE0), VoutMode::Unknown(7));
    }

    #[test]
    fn test_linear11() {
        // exponent -2, mantissa 0x0C8 = 200 -> 50.0
        assert_eq!(linear11_to_f64(0xF0C8), 50.0);
        // exponent 0, mantissa -1
        assert_eq!(linear11_to_f64(0x07FF), -1.0);
        // exponent 1, mantissa 3
        assert_eq!(linear11_to_f64(0x0803), 6.0);
    }

    #[test]
    fn test_linear16() {
        assert_eq!(linear16_from_volts(1.3, -8), Some(333));
        assert_eq!(linear16_to_f64(0x0D00, -11), 1.625);
        assert_eq!(linear16_from_volts(-0.5, -8), None);
        assert_eq!(linear16_from_volts(300.0, -8), None);
    }

    #[test]
    fn test_read_sensor_linear11() {
        let system = system();
        let (services, access, _) = Services::in_memory();
        access.set_word("vdd_reg", 0x8C, 0xF0C8);

        let mut env = ActionEnvironment::new(&system, &services, "vdd_reg");
        let action = PmbusReadSensor {
            sensor_type: SensorType::Iout,
            command: 0x8C,
            format: SensorDataFormat::Linear11,
            exponent: None,
        };
        assert!(action.execute(&mut env).unwrap());
        assert_eq!(env.value("iout"), Some(50.0));
        assert_eq!(
            env.sensor_readings(),
            &[SensorReading {
                sensor_type: SensorType::Iout,
                value: 50.0
            }]
        );
    }

    #[test]
    fn test_read_sensor_linear16_uses_vout_mode() {
        let system = system();
        let (services, access, _) = Services::in_memory();
        access.set_byte("vdd_reg", VOUT_MODE, 0x15); // exponent -11
        access.set_word("vdd_reg", 0x8B, 0x0D00);

        let mut env = ActionEnvironment::new(&system, &services, "vdd_reg");
        PmbusReadSensor {
            sensor_type: SensorType::Vout,
            command: 0x8B,
            format: SensorDataFormat::Linear16,
            exponent: None,
        }
        .execute(&mut env)
        .unwrap();
        assert_eq!(env.value("vout"), Some(1.625));
    }

    #[test]
    fn test_write_vout_command_uses_environment_volts() {
        let system = system();
        let (services, access, _) = Services::in_memory();
        let mut env = ActionEnvironment::new(&system, &services, "vdd_reg");
        env.set_volts(1.3);

        write_vout(None, Some(-8), true).execute(&mut env).unwrap();
        assert_eq!(access.word("vdd_reg", VOUT_COMMAND), Some(333));
    }

    #[test]
    fn test_write_vout_command_without_volts() {
        let system = system();
        let (services, access, _) = Services::in_memory();
        let mut env = ActionEnvironment::new(&system, &services, "vdd_reg");

        let err = write_vout(None, Some(-8), false)
            .execute(&mut env)
            .unwrap_err();
        assert!(matches!(err, RegulatorsError::Validation(_)));
        assert!(access.writes().is_empty());
    }

    #[test]
    fn test_write_vout_command_rejects_non_linear_mode() {
        let system = system();
        let (services, access, _) = Services::in_memory();
        access.set_byte("vdd_reg", VOUT_MODE, 0x40);
        let mut env = ActionEnvironment::new(&system, &services, "vdd_reg");

        let err = write_vout(Some(1.0), None, false)
            .execute(&mut env)
            .unwrap_err();
        assert!(err.to_string().contains("unsupported VOUT_MODE 0x40"));
    }

    #[test]
    fn test_write_vout_command_out_of_range() {
        let system = system();
        let (services, _, _) = Services::in_memory();
        let mut env = ActionEnvironment::new(&system, &services, "vdd_reg");

        let err = write_vout(Some(70000.0), Some(0), false)
            .execute(&mut env)
            .unwrap_err();
        assert!(matches!(err, RegulatorsError::Validation(_)));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            write_vout(Some(1.03), Some(-8), true).to_string(),
            "pmbus_write_vout_command: { volts: 1.03, format: linear, exponent: -8, is_verified: true }"
        );
        assert_eq!(
            PmbusReadSensor {
                sensor_type: SensorType::Vout,
                command: 0x8B,
                format: SensorDataFormat::Linear16,
                exponent: None,
            }
            .to_string(),
            "pmbus_read_sensor: { type: vout, command: 0x8B, format: linear_16 }"
        );
    }
}

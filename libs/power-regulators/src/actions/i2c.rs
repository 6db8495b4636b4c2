//! Single-register I2C actions

use std::fmt;

use super::action_error;
use crate::environment::ActionEnvironment;
use crate::error::{RegulatorsError, Result};

fn read_register(
    env: &ActionEnvironment<'_>,
    action: &dyn fmt::Display,
    register: u8,
) -> Result<u8> {
    let device = env.device()?;
    env.services()
        .device_access()
        .read_byte(device, register)
        .map_err(|e| action_error(action, e))
}

fn write_register(
    env: &ActionEnvironment<'_>,
    action: &dyn fmt::Display,
    register: u8,
    value: u8,
) -> Result<()> {
    let device = env.device()?;
    env.services()
        .device_access()
        .write_byte(device, register, value)
        .map_err(|e| action_error(action, e))
}

/// Single-bit mask; positions past bit 7 are rejected before any I/O
fn bit_mask(action: &dyn fmt::Display, position: u8) -> Result<u8> {
    if position > 7 {
        return Err(RegulatorsError::validation(format!(
            "{}: bit position must be 0-7",
            action
        )));
    }
    Ok(0x01 << position)
}

/// True if bit `position` of `register` equals `value`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cCompareBit {
    pub register: u8,
    pub position: u8,
    pub value: u8,
}

impl I2cCompareBit {
    pub fn execute(&self, env: &mut ActionEnvironment<'_>) -> Result<bool> {
        let bit = bit_mask(self, self.position)?;
        let current = read_register(env, self, self.register)?;
        Ok(u8::from(current & bit != 0) == self.value)
    }
}

impl fmt::Display for I2cCompareBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "i2c_compare_bit: {{ register: 0x{:02X}, position: {}, value: {} }}",
            self.register, self.position, self.value
        )
    }
}

/// True if the masked register equals the masked value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cCompareByte {
    pub register: u8,
    pub value: u8,
    pub mask: Option<u8>,
}

impl I2cCompareByte {
    pub fn mask(&self) -> u8 {
        self.mask.unwrap_or(0xFF)
    }

    pub fn execute(&self, env: &mut ActionEnvironment<'_>) -> Result<bool> {
        let current = read_register(env, self, self.register)?;
        let mask = self.mask();
        Ok(current & mask == self.value & mask)
    }
}

impl fmt::Display for I2cCompareByte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "i2c_compare_byte: {{ register: 0x{:02X}, value: 0x{:02X}, mask: 0x{:02X} }}",
            self.register,
            self.value,
            self.mask()
        )
    }
}

/// Read-modify-write of one bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cWriteBit {
    pub register: u8,
    pub position: u8,
    pub value: u8,
}

impl I2cWriteBit {
    pub fn execute(&self, env: &mut ActionEnvironment<'_>) -> Result<bool> {
        let bit = bit_mask(self, self.position)?;
        let current = read_register(env, self, self.register)?;
        let updated = if self.value == 0 {
            current & !bit
        } else {
            current | bit
        };
        write_register(env, self, self.register, updated)?;
        Ok(true)
    }
}

impl fmt::Display for I2cWriteBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "i2c_write_bit: {{ register: 0x{:02X}, position: {}, value: {} }}",
            self.register, self.position, self.value
        )
    }
}

/// Write a byte; with a mask other than 0xFF, bits outside it are preserved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cWriteByte {
    pub register: u8,
    pub value: u8,
    pub mask: Option<u8>,
}

impl I2cWriteByte {
    pub fn mask(&self) -> u8 {
        self.mask.unwrap_or(0xFF)
    }

    pub fn execute(&self, env: &mut ActionEnvironment<'_>) -> Result<bool> {
        let mask = self.mask();
        let value = if mask == 0xFF {
            self.value
        } else {
            let current = read_register(env, self, self.register)?;
            (self.value & mask) | (current & !mask)
        };
        write_register(env, self, self.register, value)?;
        Ok(true)
    }
}

impl fmt::Display for I2cWriteByte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "i2c_write_byte: {{ register: 0x{:02X}, value: 0x{:02X}, mask: 0x{:02X} }}",
            self.register,
            self.value,
            self.mask()
        )
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::error::format_error_chain;
    use crate::services::Services;
    use crate::system::System;
    use crate::topology::{Chassis, Device, I2cInterface};

    fn system() -> System {
        let device = Device::new(
            "reg1",
            true,
            "/system/chassis/motherboard/reg1",
            I2cInterface::new(1, 0x70),
            None,
            vec![],
        );
        System::new(vec![], vec![Chassis::new(1, None, vec![device])]).unwrap()
    }

    #[test]
    fn test_compare_byte_with_mask() {
        let system = system();
        let (services, access, _) = Services::in_memory();
        let mut env = ActionEnvironment::new(&system, &services, "reg1");
        access.set_byte("reg1", 0xA0, 0b1010_1111);

        let matching = I2cCompareByte {
            register: 0xA0,
            value: 0b1010_0000,
            mask: Some(0xF0),
        };
        let unmasked = I2cCompareByte {
            mask: None,
            ..matching
        };
        assert!(matching.execute(&mut env).unwrap());
        assert!(!unmasked.execute(&mut env).unwrap());
    }

    #[test]
    fn test_write_bit_preserves_other_bits() {
        let system = system();
        let (services, access, _) = Services::in_memory();
        let mut env = ActionEnvironment::new(&system, &services, "reg1");
        access.set_byte("reg1", 0x40, 0b1000_0001);

        I2cWriteBit {
            register: 0x40,
            position: 3,
            value: 1,
        }
        .execute(&mut env)
        .unwrap();
        assert_eq!(access.byte("reg1", 0x40), Some(0b1000_1001));

        I2cWriteBit {
            register: 0x40,
            position: 7,
            value: 0,
        }
        .execute(&mut env)
        .unwrap();
        assert_eq!(access.byte("reg1", 0x40), Some(0b0000_1001));
    }

    #[test]
    fn test_write_byte_with_mask() {
        let system = system();
        let (services, access, _) = Services::in_memory();
        let mut env = ActionEnvironment::new(&system, &services, "reg1");
        access.set_byte("reg1", 0x7C, 0xAB);

        I2cWriteByte {
            register: 0x7C,
            value: 0x05,
            mask: Some(0x0F),
        }
        .execute(&mut env)
        .unwrap();
        assert_eq!(access.byte("reg1", 0x7C), Some(0xA5));
    }

    #[test]
    fn test_device_error_names_action() {
        let system = system();
        let (services, access, _) = Services::in_memory();
        let mut env = ActionEnvironment::new(&system, &services, "reg1");
        access.fail_device("reg1");

        let err = I2cCompareBit {
            register: 0x10,
            position: 2,
            value: 1,
        }
        .execute(&mut env)
        .unwrap_err();
        assert_eq!(
            format_error_chain(&err),
            "Action failed: i2c_compare_bit: { register: 0x10, position: 2, value: 1 }: \
             Unable to read register 0x10 on device reg1: simulated I/O failure"
        );
    }

    #[test]
    fn test_bit_position_out_of_range() {
        let system = system();
        let (services, access, _) = Services::in_memory();
        let mut env = ActionEnvironment::new(&system, &services, "reg1");
        access.set_byte("reg1", 0x40, 0xFF);

        let compare = I2cCompareBit {
            register: 0x40,
            position: 8,
            value: 1,
        };
        let err = compare.execute(&mut env).unwrap_err();
        assert!(matches!(err, RegulatorsError::Validation(_)));
        assert!(err.to_string().ends_with("bit position must be 0-7"));

        let write = I2cWriteBit {
            register: 0x40,
            position: 200,
            value: 0,
        };
        assert!(matches!(
            write.execute(&mut env),
            Err(RegulatorsError::Validation(_))
        ));
        assert!(access.writes().is_empty());
        assert_eq!(access.byte("reg1", 0x40), Some(0xFF));
    }
}

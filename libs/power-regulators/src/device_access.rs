//! Register-level hardware access
//!
//! Actions never talk to a bus directly. They go through [`DeviceAccess`],
//! which addresses a device by its I2C interface and serialises conflicting
//! accesses to the same device itself.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use thiserror::Error;

use crate::topology::Device;

/// Hardware access failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceAccessError {
    #[error("Unable to read register 0x{register:02X} on device {device}: {reason}")]
    Read {
        device: String,
        register: u8,
        reason: String,
    },

    #[error("Unable to write register 0x{register:02X} on device {device}: {reason}")]
    Write {
        device: String,
        register: u8,
        reason: String,
    },

    #[error("Unable to open device {device}: {reason}")]
    Open { device: String, reason: String },

    #[error("Device access unavailable: {0}")]
    Unavailable(String),
}

/// Register primitives used by the I2C and PMBus actions
pub trait DeviceAccess: Send + Sync {
    fn read_byte(&self, device: &Device, register: u8) -> Result<u8, DeviceAccessError>;

    fn write_byte(&self, device: &Device, register: u8, value: u8)
        -> Result<(), DeviceAccessError>;

    fn read_word(&self, device: &Device, register: u8) -> Result<u16, DeviceAccessError>;

    fn write_word(
        &self,
        device: &Device,
        register: u8,
        value: u16,
    ) -> Result<(), DeviceAccessError>;
}

/// One register write observed by [`MemoryDeviceAccess`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterWrite {
    Byte { register: u8, value: u8 },
    Word { register: u8, value: u16 },
}

/// In-memory register file keyed by device ID
///
/// Used by tests and by the daemon's simulation mode. Unset registers read as
/// zero. Devices marked with [`fail_device`](Self::fail_device) return errors
/// for every access.
#[derive(Clone, Default)]
pub struct MemoryDeviceAccess {
    bytes: Arc<DashMap<(String, u8), u8>>,
    words: Arc<DashMap<(String, u8), u16>>,
    failing: Arc<DashSet<String>>,
    writes: Arc<Mutex<Vec<(String, RegisterWrite)>>>,
}

impl MemoryDeviceAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_byte(&self, device_id: &str, register: u8, value: u8) {
        self.bytes.insert((device_id.to_string(), register), value);
    }

    pub fn set_word(&self, device_id: &str, register: u8, value: u16) {
        self.words.insert((device_id.to_string(), register), value);
    }

    pub fn byte(&self, device_id: &str, register: u8) -> Option<u8> {
        self.bytes
            .get(&(device_id.to_string(), register))
            .map(|v| *v)
    }

    pub fn word(&self, device_id: &str, register: u8) -> Option<u16> {
        self.words
            .get(&(device_id.to_string(), register))
            .map(|v| *v)
    }

    /// Make every access to `device_id` fail
    pub fn fail_device(&self, device_id: &str) {
        self.failing.insert(device_id.to_string());
    }

    pub fn restore_device(&self, device_id: &str) {
        self.failing.remove(device_id);
    }

    /// Writes in the order they happened
    pub fn writes(&self) -> Vec<(String, RegisterWrite)> {
        self.writes.lock().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }

    fn check_read(&self, device: &Device, register: u8) -> Result<(), DeviceAccessError> {
        if self.failing.contains(device.id()) {
            return Err(DeviceAccessError::Read {
                device: device.id().to_string(),
                register,
                reason: "simulated I/O failure".to_string(),
            });
        }
        Ok(())
    }

    fn check_write(&self, device: &Device, register: u8) -> Result<(), DeviceAccessError> {
        if self.failing.contains(device.id()) {
            return Err(DeviceAccessError::Write {
                device: device.id().to_string(),
                register,
                reason: "simulated I/O failure".to_string(),
            });
        }
        Ok(())
    }
}

impl DeviceAccess for MemoryDeviceAccess {
    fn read_byte(&self, device: &Device, register: u8) -> Result<u8, DeviceAccessError> {
        self.check_read(device, register)?;
        Ok(self.byte(device.id(), register).unwrap_or(0))
    }

    fn write_byte(
        &self,
        device: &Device,
        register: u8,
        value: u8,
    ) -> Result<(), DeviceAccessError> {
        self.check_write(device, register)?;
        self.set_byte(device.id(), register, value);
        self.writes.lock().push((
            device.id().to_string(),
            RegisterWrite::Byte { register, value },
        ));
        Ok(())
    }

    fn read_word(&self, device: &Device, register: u8) -> Result<u16, DeviceAccessError> {
        self.check_read(device, register)?;
        Ok(self.word(device.id(), register).unwrap_or(0))
    }

    fn write_word(
        &self,
        device: &Device,
        register: u8,
        value: u16,
    ) -> Result<(), DeviceAccessError> {
        self.check_write(device, register)?;
        self.set_word(device.id(), register, value);
        self.writes.lock().push((
            device.id().to_string(),
            RegisterWrite::Word { register, value },
        ));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::topology::I2cInterface;

    fn device(id: &str) -> Device {
        Device::new(
            id,
            true,
            "/system/chassis/motherboard/reg1",
            I2cInterface::new(1, 0x70),
            None,
            vec![],
        )
    }

    #[test]
    fn test_unset_register_reads_zero() {
        let access = MemoryDeviceAccess::new();
        assert_eq!(access.read_byte(&device("reg1"), 0x10).unwrap(), 0);
        assert_eq!(access.read_word(&device("reg1"), 0x8B).unwrap(), 0);
    }

    #[test]
    fn test_write_then_read() {
        let access = MemoryDeviceAccess::new();
        let reg = device("reg1");
        access.write_byte(&reg, 0x10, 0xAB).unwrap();
        access.write_word(&reg, 0x21, 0x0D00).unwrap();

        assert_eq!(access.read_byte(&reg, 0x10).unwrap(), 0xAB);
        assert_eq!(access.read_word(&reg, 0x21).unwrap(), 0x0D00);
        assert_eq!(
            access.writes(),
            vec![
                (
                    "reg1".to_string(),
                    RegisterWrite::Byte {
                        register: 0x10,
                        value: 0xAB
                    }
                ),
                (
                    "reg1".to_string(),
                    RegisterWrite::Word {
                        register: 0x21,
                        value: 0x0D00
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_failing_device() {
        let access = MemoryDeviceAccess::new();
        let reg = device("reg1");
        access.fail_device("reg1");

        let err = access.read_byte(&reg, 0x7A).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unable to read register 0x7A on device reg1: simulated I/O failure"
        );
        assert!(access.write_byte(&reg, 0x7A, 1).is_err());
        assert!(access.writes().is_empty());

        access.restore_device("reg1");
        assert!(access.read_byte(&reg, 0x7A).is_ok());
    }
}

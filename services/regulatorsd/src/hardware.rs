//! Device access through Linux `/dev/i2c-*` character devices

use std::sync::Arc;

use dashmap::DashMap;
use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;
use parking_lot::Mutex;
use power_regulators::{Device, DeviceAccess, DeviceAccessError};
use tracing::debug;

/// SMBus register access; one open handle per device, locked per transfer
#[derive(Default)]
pub struct I2cDeviceAccess {
    handles: DashMap<String, Arc<Mutex<LinuxI2CDevice>>>,
}

impl I2cDeviceAccess {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, device: &Device) -> Result<Arc<Mutex<LinuxI2CDevice>>, DeviceAccessError> {
        if let Some(handle) = self.handles.get(device.id()) {
            return Ok(handle.clone());
        }

        let interface = device.i2c_interface();
        let path = format!("/dev/i2c-{}", interface.bus);
        let i2c = LinuxI2CDevice::new(&path, u16::from(interface.address)).map_err(|e| {
            DeviceAccessError::Open {
                device: device.id().to_string(),
                reason: format!("{}: {}", path, e),
            }
        })?;
        debug!(
            "Opened {} address 0x{:02X} for device {}",
            path,
            interface.address,
            device.id()
        );

        let handle = self
            .handles
            .entry(device.id().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(i2c)))
            .clone();
        Ok(handle)
    }

    fn read_error(device: &Device, register: u8, e: impl ToString) -> DeviceAccessError {
        DeviceAccessError::Read {
            device: device.id().to_string(),
            register,
            reason: e.to_string(),
        }
    }

    fn write_error(device: &Device, register: u8, e: impl ToString) -> DeviceAccessError {
        DeviceAccessError::Write {
            device: device.id().to_string(),
            register,
            reason: e.to_string(),
        }
    }
}

impl DeviceAccess for I2cDeviceAccess {
    fn read_byte(&self, device: &Device, register: u8) -> Result<u8, DeviceAccessError> {
        let handle = self.handle(device)?;
        let mut i2c = handle.lock();
        i2c.smbus_read_byte_data(register)
            .map_err(|e| Self::read_error(device, register, e))
    }

    fn write_byte(
        &self,
        device: &Device,
        register: u8,
        value: u8,
    ) -> Result<(), DeviceAccessError> {
        let handle = self.handle(device)?;
        let mut i2c = handle.lock();
        i2c.smbus_write_byte_data(register, value)
            .map_err(|e| Self::write_error(device, register, e))
    }

    fn read_word(&self, device: &Device, register: u8) -> Result<u16, DeviceAccessError> {
        let handle = self.handle(device)?;
        let mut i2c = handle.lock();
        i2c.smbus_read_word_data(register)
            .map_err(|e| Self::read_error(device, register, e))
    }

    fn write_word(
        &self,
        device: &Device,
        register: u8,
        value: u16,
    ) -> Result<(), DeviceAccessError> {
        let handle = self.handle(device)?;
        let mut i2c = handle.lock();
        i2c.smbus_write_word_data(register, value)
            .map_err(|e| Self::write_error(device, register, e))
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use power_regulators::I2cInterface;

    use super::*;

    #[test]
    fn test_missing_bus_reports_open_error() {
        let device = Device::new(
            "vdd_reg",
            true,
            "/system/chassis/motherboard/vdd_reg",
            I2cInterface::new(250, 0x70),
            None,
            vec![],
        );
        let access = I2cDeviceAccess::new();

        match access.read_byte(&device, 0x98) {
            Err(DeviceAccessError::Open { device, reason }) => {
                assert_eq!(device, "vdd_reg");
                assert!(reason.starts_with("/dev/i2c-250"));
            },
            other => panic!("expected open error, got {:?}", other),
        }
    }
}

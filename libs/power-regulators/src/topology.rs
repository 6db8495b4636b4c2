//! Hardware topology: chassis, devices and rails
//!
//! Everything here is built once by the parser, handed to
//! [`System::new`](crate::System::new) and never mutated afterwards.

use crate::configuration::Configuration;
use crate::sensor_monitoring::SensorMonitoring;
use crate::services::Services;
use crate::system::System;

// ============================================================================
// Chassis
// ============================================================================

/// Independently powered enclosure
#[derive(Debug, Clone, PartialEq)]
pub struct Chassis {
    number: u32,
    inventory_path: Option<String>,
    devices: Vec<Device>,
}

impl Chassis {
    pub fn new(number: u32, inventory_path: Option<String>, devices: Vec<Device>) -> Self {
        Self {
            number,
            inventory_path,
            devices,
        }
    }

    /// Chassis number, starting at 1
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn inventory_path(&self) -> Option<&str> {
        self.inventory_path.as_deref()
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn configure(&self, services: &Services, system: &System) {
        for device in &self.devices {
            device.configure(services, system, self);
        }
    }

    pub fn monitor_sensors(&self, services: &Services, system: &System) {
        for device in &self.devices {
            device.monitor_sensors(services, system, self);
        }
    }
}

// ============================================================================
// Device
// ============================================================================

/// Bus location of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cInterface {
    pub bus: u8,
    pub address: u8,
}

impl I2cInterface {
    pub fn new(bus: u8, address: u8) -> Self {
        Self { bus, address }
    }
}

/// Hardware component reachable through device access
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    id: String,
    is_regulator: bool,
    fru: String,
    i2c_interface: I2cInterface,
    configuration: Option<Configuration>,
    rails: Vec<Rail>,
}

impl Device {
    pub fn new(
        id: impl Into<String>,
        is_regulator: bool,
        fru: impl Into<String>,
        i2c_interface: I2cInterface,
        configuration: Option<Configuration>,
        rails: Vec<Rail>,
    ) -> Self {
        Self {
            id: id.into(),
            is_regulator,
            fru: fru.into(),
            i2c_interface,
            configuration,
            rails,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_regulator(&self) -> bool {
        self.is_regulator
    }

    /// Inventory path of the field-replaceable unit containing the device
    pub fn fru(&self) -> &str {
        &self.fru
    }

    pub fn i2c_interface(&self) -> I2cInterface {
        self.i2c_interface
    }

    pub fn configuration(&self) -> Option<&Configuration> {
        self.configuration.as_ref()
    }

    pub fn rails(&self) -> &[Rail] {
        &self.rails
    }

    /// Apply the device configuration, then each rail's
    pub fn configure(&self, services: &Services, system: &System, chassis: &Chassis) {
        if let Some(configuration) = &self.configuration {
            configuration.execute(services, system, chassis, self, &self.id);
        }
        for rail in &self.rails {
            rail.configure(services, system, chassis, self);
        }
    }

    pub fn monitor_sensors(&self, services: &Services, system: &System, chassis: &Chassis) {
        for rail in &self.rails {
            rail.monitor_sensors(services, system, chassis, self);
        }
    }
}

// ============================================================================
// Rail
// ============================================================================

/// Voltage rail produced by a device
#[derive(Debug, Clone, PartialEq)]
pub struct Rail {
    id: String,
    configuration: Option<Configuration>,
    sensor_monitoring: Option<SensorMonitoring>,
}

impl Rail {
    pub fn new(
        id: impl Into<String>,
        configuration: Option<Configuration>,
        sensor_monitoring: Option<SensorMonitoring>,
    ) -> Self {
        Self {
            id: id.into(),
            configuration,
            sensor_monitoring,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn configuration(&self) -> Option<&Configuration> {
        self.configuration.as_ref()
    }

    pub fn sensor_monitoring(&self) -> Option<&SensorMonitoring> {
        self.sensor_monitoring.as_ref()
    }

    pub fn configure(
        &self,
        services: &Services,
        system: &System,
        chassis: &Chassis,
        device: &Device,
    ) {
        if let Some(configuration) = &self.configuration {
            configuration.execute(services, system, chassis, device, &self.id);
        }
    }

    /// Rails without `sensor_monitoring` are skipped
    pub fn monitor_sensors(
        &self,
        services: &Services,
        system: &System,
        chassis: &Chassis,
        device: &Device,
    ) {
        if let Some(monitoring) = &self.sensor_monitoring {
            monitoring.execute(services, system, chassis, device, self);
        }
    }
}

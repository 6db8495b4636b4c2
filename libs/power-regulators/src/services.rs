//! Collaborators handed to every top-level invocation

use std::sync::Arc;

use crate::device_access::{DeviceAccess, MemoryDeviceAccess};
use crate::sensors::{MemorySensors, Sensors};

#[derive(Clone)]
pub struct Services {
    device_access: Arc<dyn DeviceAccess>,
    sensors: Arc<dyn Sensors>,
}

impl Services {
    pub fn new(device_access: Arc<dyn DeviceAccess>, sensors: Arc<dyn Sensors>) -> Self {
        Self {
            device_access,
            sensors,
        }
    }

    /// In-memory collaborators; returns the concrete handles for inspection
    pub fn in_memory() -> (Self, MemoryDeviceAccess, MemorySensors) {
        let access = MemoryDeviceAccess::new();
        let sensors = MemorySensors::new();
        let services = Self::new(Arc::new(access.clone()), Arc::new(sensors.clone()));
        (services, access, sensors)
    }

    pub fn device_access(&self) -> &dyn DeviceAccess {
        self.device_access.as_ref()
    }

    pub fn sensors(&self) -> &dyn Sensors {
        self.sensors.as_ref()
    }
}

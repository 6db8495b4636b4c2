//! Power sequencer fault reporting
//!
//! [`PowerSequencerMonitor`] turns a failed power-on into one critical error
//! record. When the sequencer device is known, [`StandardDevice`] narrows a
//! pgood fault down to the rail that failed first, reading the hardware
//! through [`SysfsPmbusDriver`].

mod device_type;
mod error;
mod monitor;
mod rail;
mod standard_device;
mod sysfs_driver;

pub use device_type::DeviceType;
pub use error::{Result, SequencerError};
pub use monitor::{PowerSequencerMonitor, POWER_ON_TIMEOUT_ERROR, SHUTDOWN_ERROR};
pub use rail::{GpioConfig, SequencerRail, STATUS_VOUT_FAULT_MASK};
pub use standard_device::{PmbusDriver, StandardDevice, VOLTAGE_FAULT_ERROR};
pub use sysfs_driver::{SysfsPaths, SysfsPmbusDriver};

//! Power Regulators - configuration driven regulator control
//!
//! Loads a JSON configuration describing chassis, devices, rails and rules,
//! builds an immutable [`System`], and executes rule actions against the
//! hardware through the [`DeviceAccess`] collaborator.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌───────────────────┐
//! │ config file  │────▶│    parser    │────▶│      System       │
//! │   (JSON)     │     │ (validation) │     │ rules + chassis   │
//! └──────────────┘     └──────────────┘     │ + IdMap           │
//!                                           └─────────┬─────────┘
//!                                                     │ configure / monitor
//!                                                     ▼
//!                      ┌──────────────┐     ┌───────────────────┐
//!                      │ DeviceAccess │◀────│ ActionEnvironment │
//!                      │   Sensors    │     │ (one per call)    │
//!                      └──────────────┘     └───────────────────┘
//! ```
//!
//! Execution errors stop at the configure/monitor boundary: they are logged
//! against the device or rail that failed and never reach the caller.

pub mod actions;
pub mod config_file_parser;
mod configuration;
pub mod device_access;
mod environment;
mod error;
mod id_map;
mod rule;
mod sensor_monitoring;
pub mod sensors;
mod services;
mod system;
mod topology;

// Re-export public API
pub use actions::{execute_actions, Action};
pub use configuration::Configuration;
pub use device_access::{DeviceAccess, DeviceAccessError, MemoryDeviceAccess};
pub use environment::{ActionEnvironment, MAX_RULE_DEPTH};
pub use error::{format_error_chain, IdKind, RegulatorsError, Result};
pub use id_map::{DeviceIndex, IdMap, RailIndex};
pub use rule::Rule;
pub use sensor_monitoring::SensorMonitoring;
pub use sensors::{MemorySensors, SensorReading, SensorType, Sensors};
pub use services::Services;
pub use system::System;
pub use topology::{Chassis, Device, I2cInterface, Rail};

//! regulatorsd - voltage regulator control daemon
//!
//! Finds and loads the regulators JSON configuration, configures the
//! regulator devices and monitors rail sensors on a fixed interval. Failed
//! power-ons are reported against the configured power sequencer.

pub mod config;
#[cfg(target_os = "linux")]
pub mod hardware;
pub mod manager;
pub mod power_failure;

pub use config::{SequencerConfig, ServiceConfig};
pub use manager::{find_config_file, Manager, CONFIG_FILE_ERROR};
pub use power_failure::report_power_on_failure;

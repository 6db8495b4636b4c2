//! Daemon settings
//!
//! Built-in defaults, then an optional YAML file, then `REGULATORSD_*`
//! environment variables. Nested keys use a double underscore, e.g.
//! `REGULATORSD_LOGGING__LEVEL=debug`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use power_sequencer::{
    DeviceType, GpioConfig, SequencerRail, StandardDevice, SysfsPaths, SysfsPmbusDriver,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "config/regulatorsd.yaml";
const ENV_PREFIX: &str = "REGULATORSD_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directories searched for the regulators JSON file, in order
    pub config_dirs: Vec<PathBuf>,
    /// Compatible system type names, most specific first
    pub compatible_system_types: Vec<String>,
    /// Skips discovery when set
    pub config_file: Option<PathBuf>,
    pub sensor_interval_ms: u64,
    pub error_log_dir: PathBuf,
    pub logging: LoggingConfig,
    /// Use in-memory registers instead of /dev/i2c-*
    pub simulate: bool,
    /// Power sequencer used to isolate pgood faults on a failed power-on
    pub sequencer: Option<SequencerConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            config_dirs: vec![
                PathBuf::from("/etc/phosphor-regulators"),
                PathBuf::from("/usr/share/phosphor-regulators"),
            ],
            compatible_system_types: Vec::new(),
            config_file: None,
            sensor_interval_ms: 1000,
            error_log_dir: PathBuf::from("/var/lib/regulatorsd/errors"),
            logging: LoggingConfig::default(),
            simulate: false,
            sequencer: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: Option<String>,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencerConfig {
    pub name: String,
    /// `standard`, `ucd90160` or `ucd90320`
    #[serde(default = "default_device_type")]
    pub device_type: String,
    pub bus: u8,
    pub address: u16,
    /// Prefix for the sysfs and debugfs paths
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,
    /// Power-on order
    #[serde(default)]
    pub rails: Vec<SequencerRailConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencerRailConfig {
    pub name: String,
    #[serde(default)]
    pub page: Option<u8>,
    #[serde(default)]
    pub is_power_supply_rail: bool,
    #[serde(default)]
    pub check_status_vout: bool,
    #[serde(default)]
    pub compare_voltage_to_limit: bool,
    #[serde(default)]
    pub gpio: Option<RailGpioConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RailGpioConfig {
    pub line: usize,
    #[serde(default)]
    pub active_low: bool,
}

fn default_device_type() -> String {
    DeviceType::Standard.to_string()
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/")
}

impl SequencerConfig {
    pub fn device(&self) -> anyhow::Result<StandardDevice> {
        let device_type: DeviceType = self.device_type.parse()?;
        let rails = self
            .rails
            .iter()
            .map(|rail| {
                SequencerRail::new(
                    rail.name.clone(),
                    rail.page,
                    rail.is_power_supply_rail,
                    rail.check_status_vout,
                    rail.compare_voltage_to_limit,
                    rail.gpio.map(|gpio| GpioConfig {
                        line: gpio.line,
                        active_low: gpio.active_low,
                    }),
                )
            })
            .collect::<power_sequencer::Result<Vec<_>>>()
            .with_context(|| format!("Invalid rail in power sequencer {}", self.name))?;
        Ok(StandardDevice::new(self.name.clone(), rails).with_device_type(device_type))
    }

    pub fn driver(&self) -> SysfsPmbusDriver {
        let paths = SysfsPaths::for_i2c_device(&self.sysfs_root, self.bus, self.address);
        SysfsPmbusDriver::new(self.name.clone(), paths)
    }
}

impl ServiceConfig {
    /// Load settings; a missing YAML file is not an error
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        Self::extract(path, ENV_PREFIX)
    }

    fn extract(path: &Path, env_prefix: &str) -> anyhow::Result<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(env_prefix).split("__"))
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sensor_interval_ms == 0 {
            anyhow::bail!("sensor_interval_ms must be greater than 0");
        }
        if self.config_file.is_none() && self.config_dirs.is_empty() {
            anyhow::bail!("config_dirs cannot be empty when no config_file is set");
        }
        if let Some(sequencer) = &self.sequencer {
            sequencer.device()?;
        }
        Ok(())
    }
}

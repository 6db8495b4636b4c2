//! Manager load / configure / monitor behavior against in-memory hardware

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::fs;
use std::path::Path;
use std::sync::Arc;

use common::{MemoryErrorLogging, Severity};
use power_regulators::actions::VOUT_COMMAND;
use power_regulators::{MemoryDeviceAccess, MemorySensors, SensorType, Services};
use regulatorsd::{Manager, ServiceConfig, CONFIG_FILE_ERROR};
use tempfile::TempDir;

const CONFIG: &str = r#"
{
  "rules": [
    {
      "id": "set_voltage_rule",
      "actions": [ { "pmbus_write_vout_command": { "format": "linear", "exponent": -8 } } ]
    }
  ],
  "chassis": [
    {
      "number": 1,
      "devices": [
        {
          "id": "vdd_reg",
          "is_regulator": true,
          "fru": "/system/chassis/motherboard/vdd_reg",
          "i2c_interface": { "bus": 1, "address": "0x70" },
          "rails": [
            {
              "id": "vdd",
              "configuration": { "volts": 1.0, "rule_id": "set_voltage_rule" },
              "sensor_monitoring": {
                "actions": [
                  { "pmbus_read_sensor": { "type": "vout", "command": "0x8B", "format": "linear_16", "exponent": -8 } }
                ]
              }
            }
          ]
        }
      ]
    }
  ]
}
"#;

struct Fixture {
    manager: Manager,
    access: MemoryDeviceAccess,
    sensors: MemorySensors,
    error_logging: Arc<MemoryErrorLogging>,
}

fn fixture(dir: &Path) -> Fixture {
    let config = ServiceConfig {
        config_dirs: vec![dir.to_path_buf()],
        compatible_system_types: vec!["com.acme.Hardware.Chassis.Model.MegaServer".to_string()],
        simulate: true,
        ..ServiceConfig::default()
    };
    let (services, access, sensors) = Services::in_memory();
    let error_logging = Arc::new(MemoryErrorLogging::new());
    Fixture {
        manager: Manager::new(config, services, error_logging.clone()),
        access,
        sensors,
        error_logging,
    }
}

#[test]
fn test_load_configure_and_monitor() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("MegaServer.json"), CONFIG).unwrap();
    let mut f = fixture(dir.path());

    assert!(f.manager.load_config_file());
    assert!(f.manager.is_config_file_loaded());

    f.manager.configure();
    assert_eq!(f.access.word("vdd_reg", VOUT_COMMAND), Some(256));

    f.access.set_word("vdd_reg", 0x8B, 0x0100);
    f.manager.monitor_sensors();
    assert_eq!(f.sensors.value("vdd", SensorType::Vout), Some(1.0));
    assert!(f.error_logging.records().is_empty());
}

#[test]
fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();
    let mut f = fixture(dir.path());

    assert!(!f.manager.load_config_file());
    assert!(!f.manager.is_config_file_loaded());
    // nothing to run against; must not panic
    f.manager.configure();
    f.manager.monitor_sensors();
    assert!(f.error_logging.records().is_empty());
}

#[test]
fn test_invalid_config_logs_record() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.json"), r#"{ "rules": [] }"#).unwrap();
    let mut f = fixture(dir.path());

    assert!(!f.manager.load_config_file());

    let records = f.error_logging.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].message, CONFIG_FILE_ERROR);
    assert_eq!(records[0].severity, Severity::Error);
    assert!(records[0].additional_data["CONFIG_FILE"].ends_with("config.json"));
    assert!(records[0].additional_data.contains_key("ERROR"));
}

#[test]
fn test_failed_reload_keeps_previous_system() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, CONFIG).unwrap();
    let mut f = fixture(dir.path());
    assert!(f.manager.load_config_file());

    fs::write(&path, "{ not json").unwrap();
    assert!(!f.manager.load_config_file());

    let system = f.manager.system().unwrap();
    assert!(system.find_rail("vdd").is_ok());
    assert_eq!(f.error_logging.records().len(), 1);
}

#[test]
fn test_explicit_config_file_skips_discovery() {
    let dir = TempDir::new().unwrap();
    let pinned = dir.path().join("pinned.json");
    fs::write(&pinned, CONFIG).unwrap();
    fs::write(dir.path().join("config.json"), "{ not json").unwrap();

    let mut f = fixture(dir.path());
    let config = ServiceConfig {
        config_file: Some(pinned.clone()),
        ..ServiceConfig::default()
    };
    let (services, _, _) = Services::in_memory();
    f.manager = Manager::new(config, services, f.error_logging.clone());

    assert_eq!(f.manager.config_file_path(), Some(pinned));
    assert!(f.manager.load_config_file());
}

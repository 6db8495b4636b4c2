//! Power-on failure records with and without a configured sequencer

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::fs;
use std::path::Path;
use std::sync::Arc;

use common::{MemoryErrorLogging, Severity};
use power_sequencer::{POWER_ON_TIMEOUT_ERROR, SHUTDOWN_ERROR, VOLTAGE_FAULT_ERROR};
use regulatorsd::config::{RailGpioConfig, SequencerConfig, SequencerRailConfig};
use regulatorsd::report_power_on_failure;
use tempfile::TempDir;

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// UCD90320 at 3-0072 with VDD on PAGE 5 and a PSU pgood GPIO on line 1
fn sysfs_root(vdd_millivolts: u32) -> TempDir {
    let root = TempDir::new().unwrap();
    let device = root.path().join("sys/bus/i2c/devices/3-0072");
    let hwmon = device.join("hwmon/hwmon2");
    let debug = root.path().join("sys/kernel/debug/pmbus/hwmon2");
    let gpio = root.path().join("sys/class/gpio");

    write(&device.join("name"), "ucd90320\n");
    write(&hwmon.join("in1_label"), "vout6\n");
    write(&hwmon.join("in1_input"), &format!("{}\n", vdd_millivolts));
    write(&hwmon.join("in1_lcrit"), "1000\n");
    write(&debug.join("status5"), "0x0800\n");
    write(&debug.join("ucd90320/mfr_status"), "0xc0000\n");
    write(&gpio.join("gpiochip480/label"), "ucd90320\n");
    write(&gpio.join("gpiochip480/base"), "480\n");
    write(&gpio.join("gpiochip480/ngpio"), "2\n");
    write(&gpio.join("gpio480/value"), "1\n");
    write(&gpio.join("gpio481/value"), "1\n");
    root
}

fn sequencer(root: &Path) -> SequencerConfig {
    SequencerConfig {
        name: "UCD90320".to_string(),
        device_type: "ucd90320".to_string(),
        bus: 3,
        address: 0x72,
        sysfs_root: root.to_path_buf(),
        rails: vec![
            SequencerRailConfig {
                name: "PSU".to_string(),
                page: None,
                is_power_supply_rail: true,
                check_status_vout: false,
                compare_voltage_to_limit: false,
                gpio: Some(RailGpioConfig {
                    line: 1,
                    active_low: false,
                }),
            },
            SequencerRailConfig {
                name: "VDD".to_string(),
                page: Some(5),
                is_power_supply_rail: false,
                check_status_vout: false,
                compare_voltage_to_limit: true,
                gpio: None,
            },
        ],
    }
}

#[test]
fn test_without_sequencer() {
    let logging = Arc::new(MemoryErrorLogging::new());
    report_power_on_failure(None, logging.clone(), true, "").unwrap();
    report_power_on_failure(None, logging.clone(), false, "").unwrap();

    let messages: Vec<String> = logging.records().into_iter().map(|r| r.message).collect();
    assert_eq!(messages, vec![POWER_ON_TIMEOUT_ERROR, SHUTDOWN_ERROR]);
}

#[test]
fn test_rail_isolated_from_sysfs() {
    let root = sysfs_root(950);
    let logging = Arc::new(MemoryErrorLogging::new());

    report_power_on_failure(Some(&sequencer(root.path())), logging.clone(), true, "").unwrap();

    let records = logging.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.message, VOLTAGE_FAULT_ERROR);
    assert_eq!(record.severity, Severity::Critical);
    assert_eq!(record.additional_data["DEVICE_NAME"], "UCD90320");
    assert_eq!(record.additional_data["RAIL_NAME"], "VDD");
    assert_eq!(record.additional_data["READ_VOUT"], "0.95");
    assert_eq!(record.additional_data["VOUT_UV_FAULT_LIMIT"], "1");
    assert_eq!(record.additional_data["STATUS_WORD"], "0x0800");
    assert_eq!(record.additional_data["MFR_STATUS"], "0xc0000");
    assert_eq!(record.additional_data["GPIO_VALUES"], "[1, 1]");
}

#[test]
fn test_healthy_rails_fall_back() {
    let root = sysfs_root(1100);
    let logging = Arc::new(MemoryErrorLogging::new());

    report_power_on_failure(Some(&sequencer(root.path())), logging.clone(), false, "").unwrap();

    let records = logging.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].message, SHUTDOWN_ERROR);
    assert!(!records[0].additional_data.contains_key("RAIL_NAME"));
}

#[test]
fn test_missing_sysfs_falls_back() {
    let root = TempDir::new().unwrap();
    let logging = Arc::new(MemoryErrorLogging::new());

    report_power_on_failure(Some(&sequencer(root.path())), logging.clone(), true, "").unwrap();

    let records = logging.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].message, POWER_ON_TIMEOUT_ERROR);
}

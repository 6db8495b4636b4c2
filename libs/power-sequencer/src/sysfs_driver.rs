//! PMBus driver backed by the kernel pmbus hwmon driver
//!
//! Voltages come from `inN_input` and `inN_lcrit` in the hwmon directory,
//! where `inN_label` holds `vout<PAGE + 1>`. Status registers come from the
//! pmbus debugfs directory. GPIO values are read through the sysfs GPIO class
//! from the chip whose label is the lowercase device name.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Result, SequencerError};
use crate::standard_device::PmbusDriver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysfsPaths {
    /// I2C device directory, e.g. `/sys/bus/i2c/devices/3-0072`
    pub device: PathBuf,
    pub debugfs: PathBuf,
    pub gpio_class: PathBuf,
}

impl SysfsPaths {
    /// Standard locations below `root`, normally `/`
    pub fn for_i2c_device(root: &Path, bus: u8, address: u16) -> Self {
        Self {
            device: root
                .join("sys/bus/i2c/devices")
                .join(format!("{}-{:04x}", bus, address)),
            debugfs: root.join("sys/kernel/debug"),
            gpio_class: root.join("sys/class/gpio"),
        }
    }
}

pub struct SysfsPmbusDriver {
    device_name: String,
    paths: SysfsPaths,
    page_to_file_number: Mutex<BTreeMap<u8, u32>>,
}

impl SysfsPmbusDriver {
    pub fn new(device_name: impl Into<String>, paths: SysfsPaths) -> Self {
        Self {
            device_name: device_name.into(),
            paths,
            page_to_file_number: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// `hwmonN` directory name below `<device>/hwmon`
    fn hwmon_name(&self) -> Result<String> {
        let parent = self.paths.device.join("hwmon");
        let mut names: Vec<String> = read_dir(&parent)?
            .into_iter()
            .filter(|path| path.is_dir())
            .filter_map(|path| Some(path.file_name()?.to_str()?.to_string()))
            .filter(|name| name.starts_with("hwmon"))
            .collect();
        names.sort();
        names.into_iter().next().ok_or_else(|| {
            SequencerError::driver(format!(
                "Unable to find hwmon directory in {}",
                parent.display()
            ))
        })
    }

    fn hwmon_dir(&self) -> Result<PathBuf> {
        Ok(self.paths.device.join("hwmon").join(self.hwmon_name()?))
    }

    fn debug_dir(&self) -> Result<PathBuf> {
        Ok(self.paths.debugfs.join("pmbus").join(self.hwmon_name()?))
    }

    /// PAGE to hwmon `inN` file number, from the voltage label files
    ///
    /// Labels that are not `vout<N>` are skipped.
    pub fn page_to_file_number_map(&self) -> Result<BTreeMap<u8, u32>> {
        let mut map = BTreeMap::new();
        for path in read_dir(&self.hwmon_dir()?)? {
            let Some(number) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(voltage_label_file_number)
            else {
                continue;
            };
            if let Some(page) = page_from_label(&read_string(&path)?) {
                map.insert(page, number);
            }
        }
        debug!(
            "Device {} PAGE to hwmon file number map: {:?}",
            self.device_name, map
        );
        Ok(map)
    }

    /// Cached; built on first use and rebuilt before each pgood fault search
    pub fn file_number(&self, page: u8) -> Result<u32> {
        let mut map = self.page_to_file_number.lock();
        if map.is_empty() {
            *map = self.page_to_file_number_map()?;
        }
        map.get(&page).copied().ok_or_else(|| {
            SequencerError::driver(format!(
                "Unable to find hwmon file number for PAGE {} of device {}",
                page, self.device_name
            ))
        })
    }

    /// Volts from a millivolt hwmon file
    fn read_voltage(&self, page: u8, suffix: &str) -> Result<f64> {
        let number = self.file_number(page)?;
        let path = self.hwmon_dir()?.join(format!("in{}_{}", number, suffix));
        let millivolts: f64 = read_number(&path)?;
        Ok(millivolts / 1000.0)
    }

    fn read_page<T>(
        &self,
        register: &'static str,
        page: u8,
        read: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        read().map_err(|e| SequencerError::DriverRead {
            register,
            target: format!("PAGE {} of device {}", page, self.device_name),
            source: Box::new(e),
        })
    }

    fn read_gpio_values(&self, label: &str) -> Result<Vec<i32>> {
        let mut chips: Vec<PathBuf> = read_dir(&self.paths.gpio_class)?
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("gpiochip"))
            })
            .collect();
        chips.sort();

        for chip in chips {
            if read_string(&chip.join("label"))? != label {
                continue;
            }
            let base: u32 = read_number(&chip.join("base"))?;
            let count: u32 = read_number(&chip.join("ngpio"))?;
            return (base..base + count)
                .map(|gpio| {
                    let path = self.paths.gpio_class.join(format!("gpio{}", gpio));
                    read_number(&path.join("value"))
                })
                .collect();
        }

        Err(SequencerError::driver(format!(
            "No GPIO chip with label {}",
            label
        )))
    }
}

impl PmbusDriver for SysfsPmbusDriver {
    fn prepare_for_pgood_fault_detection(&self) -> Result<()> {
        let map = self.page_to_file_number_map()?;
        *self.page_to_file_number.lock() = map;
        Ok(())
    }

    fn gpio_values(&self) -> Result<Vec<i32>> {
        let label = self.device_name.to_lowercase();
        self.read_gpio_values(&label).map_err(|e| {
            SequencerError::driver(format!(
                "Unable to read GPIO values from device {} using label {}: {}",
                self.device_name, label, e
            ))
        })
    }

    fn status_word(&self, page: u8) -> Result<u16> {
        self.read_page("STATUS_WORD", page, || {
            let path = self.debug_dir()?.join(format!("status{}", page));
            narrow(&path, read_hex(&path)?)
        })
    }

    fn status_vout(&self, page: u8) -> Result<u8> {
        self.read_page("STATUS_VOUT", page, || {
            let path = self.debug_dir()?.join(format!("status{}_vout", page));
            narrow(&path, read_hex(&path)?)
        })
    }

    fn read_vout(&self, page: u8) -> Result<f64> {
        self.read_page("READ_VOUT", page, || self.read_voltage(page, "input"))
    }

    fn vout_uv_fault_limit(&self, page: u8) -> Result<f64> {
        self.read_page("VOUT_UV_FAULT_LIMIT", page, || {
            self.read_voltage(page, "lcrit")
        })
    }

    /// `<debugfs>/pmbus/hwmonN/<client name>/mfr_status`
    fn mfr_status(&self) -> Result<u64> {
        let read = || {
            let client = read_string(&self.paths.device.join("name"))?;
            read_hex(&self.debug_dir()?.join(client).join("mfr_status"))
        };
        read().map_err(|e| SequencerError::DriverRead {
            register: "MFR_STATUS",
            target: format!("device {}", self.device_name),
            source: Box::new(e),
        })
    }
}

/// `N` from `inN_label`
fn voltage_label_file_number(file_name: &str) -> Option<u32> {
    let digits = file_name.strip_prefix("in")?.strip_suffix("_label")?;
    parse_digits(digits)
}

/// PAGE from a `vout<PAGE + 1>` label
fn page_from_label(label: &str) -> Option<u8> {
    let number = parse_digits(label.strip_prefix("vout")?)?;
    u8::try_from(number.checked_sub(1)?).ok()
}

fn parse_digits(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn io_error(path: &Path, source: std::io::Error) -> SequencerError {
    SequencerError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn read_dir(path: &Path) -> Result<Vec<PathBuf>> {
    fs::read_dir(path)
        .and_then(|entries| {
            entries
                .map(|entry| entry.map(|e| e.path()))
                .collect::<std::io::Result<Vec<_>>>()
        })
        .map_err(|e| io_error(path, e))
}

fn read_string(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map(|contents| contents.trim().to_string())
        .map_err(|e| io_error(path, e))
}

fn read_number<T: FromStr>(path: &Path) -> Result<T> {
    let contents = read_string(path)?;
    contents.parse().map_err(|_| {
        SequencerError::driver(format!(
            "Invalid value '{}' in {}",
            contents,
            path.display()
        ))
    })
}

/// debugfs status files hold hex, with or without a `0x` prefix
fn read_hex(path: &Path) -> Result<u64> {
    let contents = read_string(path)?;
    let digits = contents
        .strip_prefix("0x")
        .or_else(|| contents.strip_prefix("0X"))
        .unwrap_or(&contents);
    u64::from_str_radix(digits, 16).map_err(|_| {
        SequencerError::driver(format!(
            "Invalid value '{}' in {}",
            contents,
            path.display()
        ))
    })
}

fn narrow<T: TryFrom<u64>>(path: &Path, value: u64) -> Result<T> {
    T::try_from(value).map_err(|_| {
        SequencerError::driver(format!(
            "Value 0x{:x} in {} is out of range",
            value,
            path.display()
        ))
    })
}

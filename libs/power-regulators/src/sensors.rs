//! Rail sensor values and the sink they are published to

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Kind of value read by `pmbus_read_sensor`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Iout,
    IoutPeak,
    IoutValley,
    Pout,
    Temperature,
    TemperaturePeak,
    Vout,
    VoutPeak,
    VoutValley,
}

impl SensorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Iout => "iout",
            SensorType::IoutPeak => "iout_peak",
            SensorType::IoutValley => "iout_valley",
            SensorType::Pout => "pout",
            SensorType::Temperature => "temperature",
            SensorType::TemperaturePeak => "temperature_peak",
            SensorType::Vout => "vout",
            SensorType::VoutPeak => "vout_peak",
            SensorType::VoutValley => "vout_valley",
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iout" => Ok(SensorType::Iout),
            "iout_peak" => Ok(SensorType::IoutPeak),
            "iout_valley" => Ok(SensorType::IoutValley),
            "pout" => Ok(SensorType::Pout),
            "temperature" => Ok(SensorType::Temperature),
            "temperature_peak" => Ok(SensorType::TemperaturePeak),
            "vout" => Ok(SensorType::Vout),
            "vout_peak" => Ok(SensorType::VoutPeak),
            "vout_valley" => Ok(SensorType::VoutValley),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub sensor_type: SensorType,
    pub value: f64,
}

/// Receiver of per-rail sensor values
pub trait Sensors: Send + Sync {
    /// Replace the rail's current readings
    fn publish(&self, rail_id: &str, readings: &[SensorReading]);

    /// The rail could not be monitored; its last values are no longer current
    fn mark_stale(&self, rail_id: &str);
}

/// Last published state of one rail
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RailSensors {
    pub readings: Vec<SensorReading>,
    pub stale: bool,
}

/// In-memory sensor sink
#[derive(Clone, Default)]
pub struct MemorySensors {
    rails: Arc<DashMap<String, RailSensors>>,
}

impl MemorySensors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rail(&self, rail_id: &str) -> Option<RailSensors> {
        self.rails.get(rail_id).map(|entry| entry.clone())
    }

    /// Every rail seen so far, ordered by ID
    pub fn snapshot(&self) -> BTreeMap<String, RailSensors> {
        self.rails
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn is_stale(&self, rail_id: &str) -> bool {
        self.rails.get(rail_id).is_some_and(|entry| entry.stale)
    }

    pub fn value(&self, rail_id: &str, sensor_type: SensorType) -> Option<f64> {
        let entry = self.rails.get(rail_id)?;
        entry
            .readings
            .iter()
            .find(|r| r.sensor_type == sensor_type)
            .map(|r| r.value)
    }
}

impl Sensors for MemorySensors {
    fn publish(&self, rail_id: &str, readings: &[SensorReading]) {
        self.rails.insert(
            rail_id.to_string(),
            RailSensors {
                readings: readings.to_vec(),
                stale: false,
            },
        );
    }

    fn mark_stale(&self, rail_id: &str) {
        self.rails.entry(rail_id.to_string()).or_default().stale = true;
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_sensor_type_names() {
        for name in ["iout", "pout", "temperature_peak", "vout_valley"] {
            let t: SensorType = name.parse().unwrap();
            assert_eq!(t.as_str(), name);
        }
        assert!("voltage".parse::<SensorType>().is_err());
    }

    #[test]
    fn test_publish_clears_stale() {
        let sensors = MemorySensors::new();
        sensors.mark_stale("vdd0");
        assert!(sensors.is_stale("vdd0"));

        sensors.publish(
            "vdd0",
            &[SensorReading {
                sensor_type: SensorType::Vout,
                value: 1.1,
            }],
        );
        assert!(!sensors.is_stale("vdd0"));
        assert_eq!(sensors.value("vdd0", SensorType::Vout), Some(1.1));
        assert_eq!(sensors.value("vdd0", SensorType::Iout), None);
    }

    #[test]
    fn test_mark_stale_keeps_last_readings() {
        let sensors = MemorySensors::new();
        sensors.publish(
            "vdd0",
            &[SensorReading {
                sensor_type: SensorType::Iout,
                value: 12.5,
            }],
        );
        sensors.mark_stale("vdd0");

        let rail = sensors.rail("vdd0").unwrap();
        assert!(rail.stale);
        assert_eq!(rail.readings.len(), 1);
    }
}

//! Execution state shared by the actions of one top-level invocation
//!
//! A fresh [`ActionEnvironment`] is created for every configure or monitor
//! call and dropped afterwards. Nested `run_rule` actions reuse the caller's
//! environment, so a device selected or a value computed by an outer rule is
//! visible to the inner one and vice versa.

use std::collections::HashMap;

use crate::error::{RegulatorsError, Result};
use crate::rule::Rule;
use crate::sensors::SensorReading;
use crate::services::Services;
use crate::system::System;
use crate::topology::Device;

/// Maximum `run_rule` nesting before execution is aborted
pub const MAX_RULE_DEPTH: usize = 30;

pub struct ActionEnvironment<'a> {
    system: &'a System,
    services: &'a Services,
    device_id: String,
    volts: Option<f64>,
    rule_depth: usize,
    values: HashMap<String, f64>,
    sensor_readings: Vec<SensorReading>,
}

impl<'a> ActionEnvironment<'a> {
    pub fn new(system: &'a System, services: &'a Services, device_id: impl Into<String>) -> Self {
        Self {
            system,
            services,
            device_id: device_id.into(),
            volts: None,
            rule_depth: 0,
            values: HashMap::new(),
            sensor_readings: Vec::new(),
        }
    }

    pub fn services(&self) -> &'a Services {
        self.services
    }

    /// ID of the device actions currently operate on
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn set_device_id(&mut self, id: impl Into<String>) {
        self.device_id = id.into();
    }

    /// Resolve the current device through the registry
    pub fn device(&self) -> Result<&'a Device> {
        self.system.find_device(&self.device_id)
    }

    pub fn rule(&self, id: &str) -> Result<&'a Rule> {
        self.system.find_rule(id)
    }

    pub fn volts(&self) -> Option<f64> {
        self.volts
    }

    pub fn set_volts(&mut self, volts: f64) {
        self.volts = Some(volts);
    }

    pub fn rule_depth(&self) -> usize {
        self.rule_depth
    }

    /// Enter a nested rule; fails once the nesting limit is reached
    pub fn increment_rule_depth(&mut self, rule_id: &str) -> Result<()> {
        if self.rule_depth >= MAX_RULE_DEPTH {
            return Err(RegulatorsError::RuleDepthExceeded(rule_id.to_string()));
        }
        self.rule_depth += 1;
        Ok(())
    }

    pub fn decrement_rule_depth(&mut self) {
        self.rule_depth = self.rule_depth.saturating_sub(1);
    }

    /// Latest value recorded under `key` anywhere in this invocation tree
    ///
    /// `pmbus_read_sensor` records under the sensor type name; a later read
    /// of the same type, including one in a nested rule, overwrites it.
    pub fn value(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    pub fn add_sensor_reading(&mut self, reading: SensorReading) {
        self.sensor_readings.push(reading);
    }

    pub fn sensor_readings(&self) -> &[SensorReading] {
        &self.sensor_readings
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_rule_depth_limit() {
        let system = System::new(vec![], vec![]).unwrap();
        let (services, _, _) = Services::in_memory();
        let mut env = ActionEnvironment::new(&system, &services, "reg1");

        for _ in 0..MAX_RULE_DEPTH {
            env.increment_rule_depth("loop_rule").unwrap();
        }
        assert_eq!(env.rule_depth(), MAX_RULE_DEPTH);
        assert!(matches!(
            env.increment_rule_depth("loop_rule"),
            Err(RegulatorsError::RuleDepthExceeded(id)) if id == "loop_rule"
        ));

        env.decrement_rule_depth();
        assert!(env.increment_rule_depth("loop_rule").is_ok());
    }

    #[test]
    fn test_unknown_device() {
        let system = System::new(vec![], vec![]).unwrap();
        let (services, _, _) = Services::in_memory();
        let env = ActionEnvironment::new(&system, &services, "reg1");
        assert!(matches!(
            env.device(),
            Err(RegulatorsError::NotFound { .. })
        ));
    }

    #[test]
    fn test_values() {
        let system = System::new(vec![], vec![]).unwrap();
        let (services, _, _) = Services::in_memory();
        let mut env = ActionEnvironment::new(&system, &services, "reg1");

        assert_eq!(env.volts(), None);
        env.set_volts(1.25);
        assert_eq!(env.volts(), Some(1.25));

        env.set_value("vout", 1.2);
        env.set_value("vout", 1.21);
        assert_eq!(env.value("vout"), Some(1.21));
        assert_eq!(env.value("iout"), None);
    }
}

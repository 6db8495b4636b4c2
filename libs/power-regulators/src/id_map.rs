//! ID registry
//!
//! Maps device, rail and rule IDs to their positions inside the owning
//! [`System`](crate::System). The map never owns the objects; it only records
//! where they live so lookups stay read-only and `System` stays a plain value.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::error::{IdKind, RegulatorsError, Result};

/// Position of a device: `chassis[chassis].devices[device]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIndex {
    pub chassis: usize,
    pub device: usize,
}

/// Position of a rail: `chassis[chassis].devices[device].rails[rail]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RailIndex {
    pub chassis: usize,
    pub device: usize,
    pub rail: usize,
}

#[derive(Debug, Default)]
pub struct IdMap {
    devices: HashMap<String, DeviceIndex>,
    rails: HashMap<String, RailIndex>,
    rules: HashMap<String, usize>,
}

fn insert_unique<V>(
    map: &mut HashMap<String, V>,
    kind: IdKind,
    id: &str,
    value: V,
) -> Result<()> {
    match map.entry(id.to_string()) {
        Entry::Occupied(_) => Err(RegulatorsError::DuplicateId {
            kind,
            id: id.to_string(),
        }),
        Entry::Vacant(slot) => {
            slot.insert(value);
            Ok(())
        },
    }
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&mut self, id: &str, index: DeviceIndex) -> Result<()> {
        insert_unique(&mut self.devices, IdKind::Device, id, index)
    }

    pub fn add_rail(&mut self, id: &str, index: RailIndex) -> Result<()> {
        insert_unique(&mut self.rails, IdKind::Rail, id, index)
    }

    pub fn add_rule(&mut self, id: &str, index: usize) -> Result<()> {
        insert_unique(&mut self.rules, IdKind::Rule, id, index)
    }

    pub fn device(&self, id: &str) -> Result<DeviceIndex> {
        self.devices
            .get(id)
            .copied()
            .ok_or_else(|| RegulatorsError::not_found(IdKind::Device, id))
    }

    pub fn rail(&self, id: &str) -> Result<RailIndex> {
        self.rails
            .get(id)
            .copied()
            .ok_or_else(|| RegulatorsError::not_found(IdKind::Rail, id))
    }

    pub fn rule(&self, id: &str) -> Result<usize> {
        self.rules
            .get(id)
            .copied()
            .ok_or_else(|| RegulatorsError::not_found(IdKind::Rule, id))
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_lookup_registered_rails() {
        let mut map = IdMap::new();
        let rail0 = RailIndex {
            chassis: 0,
            device: 0,
            rail: 0,
        };
        let rail1 = RailIndex {
            chassis: 0,
            device: 0,
            rail: 1,
        };
        map.add_rail("rail0", rail0).unwrap();
        map.add_rail("rail1", rail1).unwrap();

        assert_eq!(map.rail("rail0").unwrap(), rail0);
        assert_eq!(map.rail("rail1").unwrap(), rail1);
        match map.rail("rail2") {
            Err(RegulatorsError::NotFound { kind, id }) => {
                assert_eq!(kind, IdKind::Rail);
                assert_eq!(id, "rail2");
            },
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_kinds_are_separate_namespaces() {
        let mut map = IdMap::new();
        map.add_rule("vdd", 0).unwrap();
        map.add_device(
            "vdd",
            DeviceIndex {
                chassis: 0,
                device: 0,
            },
        )
        .unwrap();

        assert!(map.rule("vdd").is_ok());
        assert!(map.device("vdd").is_ok());
        assert!(map.rail("vdd").is_err());
    }

    #[test]
    fn test_duplicate_rule_rejected() {
        let mut map = IdMap::new();
        map.add_rule("set_voltage_rule", 0).unwrap();
        let err = map.add_rule("set_voltage_rule", 1).unwrap_err();
        assert!(matches!(
            err,
            RegulatorsError::DuplicateId {
                kind: IdKind::Rule,
                ..
            }
        ));
        // first registration wins
        assert_eq!(map.rule("set_voltage_rule").unwrap(), 0);
    }
}

//! Root of the control model
//!
//! `System` owns every rule and chassis loaded from one configuration file
//! together with the ID registry built over them. It is immutable once
//! constructed and can be shared across threads.

use tracing::{debug, error, info};

use crate::error::{format_error_chain, IdKind, RegulatorsError, Result};
use crate::id_map::{DeviceIndex, IdMap, RailIndex};
use crate::rule::Rule;
use crate::services::Services;
use crate::topology::{Chassis, Device, Rail};

#[derive(Debug)]
pub struct System {
    rules: Vec<Rule>,
    chassis: Vec<Chassis>,
    id_map: IdMap,
}

impl System {
    /// Take ownership of the parsed model and register every ID once
    ///
    /// Fails on duplicate rule/device/rail IDs or duplicate chassis numbers.
    pub fn new(rules: Vec<Rule>, chassis: Vec<Chassis>) -> Result<Self> {
        let mut id_map = IdMap::new();

        for (index, rule) in rules.iter().enumerate() {
            id_map.add_rule(rule.id(), index)?;
        }

        for (c, chassis_item) in chassis.iter().enumerate() {
            if chassis[..c]
                .iter()
                .any(|other| other.number() == chassis_item.number())
            {
                return Err(RegulatorsError::DuplicateId {
                    kind: IdKind::Chassis,
                    id: chassis_item.number().to_string(),
                });
            }

            for (d, device) in chassis_item.devices().iter().enumerate() {
                id_map.add_device(
                    device.id(),
                    DeviceIndex {
                        chassis: c,
                        device: d,
                    },
                )?;
                for (r, rail) in device.rails().iter().enumerate() {
                    id_map.add_rail(
                        rail.id(),
                        RailIndex {
                            chassis: c,
                            device: d,
                            rail: r,
                        },
                    )?;
                }
            }
        }

        debug!(
            "System built: {} rules, {} chassis",
            rules.len(),
            chassis.len()
        );

        Ok(Self {
            rules,
            chassis,
            id_map,
        })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn chassis(&self) -> &[Chassis] {
        &self.chassis
    }

    pub fn find_rule(&self, id: &str) -> Result<&Rule> {
        let index = self.id_map.rule(id)?;
        self.rules
            .get(index)
            .ok_or_else(|| RegulatorsError::not_found(IdKind::Rule, id))
    }

    pub fn find_device(&self, id: &str) -> Result<&Device> {
        let index = self.id_map.device(id)?;
        self.chassis
            .get(index.chassis)
            .and_then(|c| c.devices().get(index.device))
            .ok_or_else(|| RegulatorsError::not_found(IdKind::Device, id))
    }

    pub fn find_rail(&self, id: &str) -> Result<&Rail> {
        self.locate_rail(id).map(|(_, _, rail)| rail)
    }

    pub fn find_chassis(&self, number: u32) -> Result<&Chassis> {
        self.chassis
            .iter()
            .find(|c| c.number() == number)
            .ok_or_else(|| RegulatorsError::not_found(IdKind::Chassis, number.to_string()))
    }

    fn locate_rail(&self, id: &str) -> Result<(&Chassis, &Device, &Rail)> {
        let index = self.id_map.rail(id)?;
        let chassis = self.chassis.get(index.chassis);
        let device = chassis.and_then(|c| c.devices().get(index.device));
        let rail = device.and_then(|d| d.rails().get(index.rail));
        match (chassis, device, rail) {
            (Some(c), Some(d), Some(r)) => Ok((c, d, r)),
            _ => Err(RegulatorsError::not_found(IdKind::Rail, id)),
        }
    }

    /// Resolve a rail by IDs, checking that it sits under the given chassis and device
    fn resolve_rail(
        &self,
        chassis_number: u32,
        device_id: &str,
        rail_id: &str,
    ) -> Result<(&Chassis, &Device, &Rail)> {
        self.find_chassis(chassis_number)?;
        self.find_device(device_id)?;
        let (chassis, device, rail) = self.locate_rail(rail_id)?;
        if chassis.number() != chassis_number || device.id() != device_id {
            return Err(RegulatorsError::validation(format!(
                "Rail {} is not on device {} in chassis {}",
                rail_id, device_id, chassis_number
            )));
        }
        Ok((chassis, device, rail))
    }

    /// Run every device and rail configuration block
    pub fn configure(&self, services: &Services) {
        info!("Configuring regulators");
        for chassis in &self.chassis {
            chassis.configure(services, self);
        }
    }

    /// One monitoring sweep over every rail of every chassis
    pub fn monitor_sensors(&self, services: &Services) {
        for chassis in &self.chassis {
            chassis.monitor_sensors(services, self);
        }
    }

    /// Monitor a single rail identified by IDs
    ///
    /// Unknown IDs are logged; nothing is propagated to the caller.
    pub fn monitor_rail(
        &self,
        services: &Services,
        chassis_number: u32,
        device_id: &str,
        rail_id: &str,
    ) {
        match self.resolve_rail(chassis_number, device_id, rail_id) {
            Ok((chassis, device, rail)) => rail.monitor_sensors(services, self, chassis, device),
            Err(e) => {
                error!(
                    "Unable to monitor rail {}: {}",
                    rail_id,
                    format_error_chain(&e)
                );
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::actions::Action;
    use crate::topology::I2cInterface;

    fn rail(id: &str) -> Rail {
        Rail::new(id, None, None)
    }

    fn device(id: &str, rails: Vec<Rail>) -> Device {
        Device::new(
            id,
            true,
            format!("/system/chassis/motherboard/{}", id),
            I2cInterface::new(1, 0x70),
            None,
            rails,
        )
    }

    fn sample_system() -> System {
        let rules = vec![Rule::new(
            "read_vout_rule",
            vec![Action::SetDevice("vdd_reg".to_string())],
        )];
        let chassis = vec![
            Chassis::new(
                1,
                Some("/system/chassis".to_string()),
                vec![device("vdd_reg", vec![rail("rail0"), rail("rail1")])],
            ),
            Chassis::new(2, None, vec![device("vio_reg", vec![rail("vio0")])]),
        ];
        System::new(rules, chassis).unwrap()
    }

    #[test]
    fn test_find_returns_owned_object() {
        let system = sample_system();

        let rail0 = system.find_rail("rail0").unwrap();
        assert!(std::ptr::eq(rail0, &system.chassis()[0].devices()[0].rails()[0]));

        let vio_reg = system.find_device("vio_reg").unwrap();
        assert!(std::ptr::eq(vio_reg, &system.chassis()[1].devices()[0]));

        let rule = system.find_rule("read_vout_rule").unwrap();
        assert!(std::ptr::eq(rule, &system.rules()[0]));
    }

    #[test]
    fn test_find_missing_rail() {
        let system = sample_system();
        let err = system.find_rail("rail2").unwrap_err();
        assert!(matches!(
            err,
            RegulatorsError::NotFound {
                kind: IdKind::Rail,
                ..
            }
        ));
        assert_eq!(err.to_string(), "Unable to find rail with ID \"rail2\"");
    }

    #[test]
    fn test_duplicate_rail_across_devices() {
        let chassis = vec![Chassis::new(
            1,
            None,
            vec![
                device("reg1", vec![rail("vdd")]),
                device("reg2", vec![rail("vdd")]),
            ],
        )];
        let err = System::new(vec![], chassis).unwrap_err();
        assert!(matches!(
            err,
            RegulatorsError::DuplicateId {
                kind: IdKind::Rail,
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_chassis_number() {
        let chassis = vec![Chassis::new(1, None, vec![]), Chassis::new(1, None, vec![])];
        let err = System::new(vec![], chassis).unwrap_err();
        assert_eq!(err.to_string(), "Duplicate chassis ID: 1");
    }

    #[test]
    fn test_resolve_rail_checks_ownership() {
        let system = sample_system();
        assert!(system.resolve_rail(1, "vdd_reg", "rail1").is_ok());
        assert!(system.resolve_rail(2, "vdd_reg", "rail1").is_err());
        assert!(system.resolve_rail(1, "vio_reg", "rail1").is_err());
        assert!(system.resolve_rail(3, "vdd_reg", "rail1").is_err());
    }

    #[test]
    fn test_monitor_rail_unknown_ids_do_not_panic() {
        let system = sample_system();
        let (services, _access, sensors) = Services::in_memory();
        system.monitor_rail(&services, 1, "vdd_reg", "missing");
        assert!(sensors.rail("missing").is_none());
    }

    #[test]
    fn test_system_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<System>();
    }
}

//! Device and rail configuration blocks

use tracing::{error, info};

use crate::actions::{execute_actions, Action};
use crate::environment::ActionEnvironment;
use crate::error::format_error_chain;
use crate::services::Services;
use crate::system::System;
use crate::topology::{Chassis, Device};

/// Actions that put a device or rail into its initial state
///
/// `volts`, when present, is made available to actions such as
/// `pmbus_write_vout_command` that have no value of their own.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    volts: Option<f64>,
    actions: Vec<Action>,
}

impl Configuration {
    pub fn new(volts: Option<f64>, actions: Vec<Action>) -> Self {
        Self { volts, actions }
    }

    pub fn volts(&self) -> Option<f64> {
        self.volts
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Run the actions for `target_id` (the device or rail being configured)
    ///
    /// Failures are logged and never returned.
    pub fn execute(
        &self,
        services: &Services,
        system: &System,
        chassis: &Chassis,
        device: &Device,
        target_id: &str,
    ) {
        match self.volts {
            Some(volts) => info!("Configuring {}: volts={}", target_id, volts),
            None => info!("Configuring {}", target_id),
        }

        let mut env = ActionEnvironment::new(system, services, device.id());
        if let Some(volts) = self.volts {
            env.set_volts(volts);
        }

        if let Err(e) = execute_actions(&self.actions, &mut env) {
            error!(
                chassis = chassis.number(),
                device = device.id(),
                "Unable to configure {}: {}",
                target_id,
                format_error_chain(&e)
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use tracing_test::traced_test;

    use super::*;
    use crate::actions::{PmbusWriteVoutCommand, VoutDataFormat, VOUT_COMMAND};
    use crate::rule::Rule;
    use crate::topology::{I2cInterface, Rail};

    fn system(device_configuration: Option<Configuration>) -> System {
        let set_voltage_rule = Rule::new(
            "set_voltage_rule",
            vec![Action::PmbusWriteVoutCommand(PmbusWriteVoutCommand {
                volts: None,
                format: VoutDataFormat::Linear,
                exponent: Some(-8),
                is_verified: false,
            })],
        );
        let rail = Rail::new(
            "vdd0",
            Some(Configuration::new(
                Some(1.3),
                vec![Action::RunRule("set_voltage_rule".to_string())],
            )),
            None,
        );
        let device = Device::new(
            "vdd_reg",
            true,
            "/system/chassis/motherboard/vdd_reg",
            I2cInterface::new(1, 0x70),
            device_configuration,
            vec![rail],
        );
        System::new(
            vec![set_voltage_rule],
            vec![Chassis::new(1, None, vec![device])],
        )
        .unwrap()
    }

    #[test]
    #[traced_test]
    fn test_configure_runs_rail_configuration() {
        let system = system(None);
        let (services, access, _) = Services::in_memory();

        system.configure(&services);

        assert_eq!(access.word("vdd_reg", VOUT_COMMAND), Some(333));
        assert!(logs_contain("Configuring vdd0: volts=1.3"));
    }

    #[test]
    #[traced_test]
    fn test_device_configuration_failure_is_isolated() {
        // no volts anywhere: the device block fails, the rail block still runs
        let device_configuration =
            Configuration::new(None, vec![Action::RunRule("set_voltage_rule".to_string())]);
        let system = system(Some(device_configuration));
        let (services, access, _) = Services::in_memory();

        system.configure(&services);

        assert!(logs_contain("Unable to configure vdd_reg"));
        assert!(logs_contain("no volts value defined"));
        assert_eq!(access.word("vdd_reg", VOUT_COMMAND), Some(333));
    }
}

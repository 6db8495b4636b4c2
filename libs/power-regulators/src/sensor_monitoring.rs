//! Per-rail sensor monitoring
//!
//! Each rail is its own failure domain: an error while monitoring one rail is
//! logged against that rail, its sensors go stale, and the sweep carries on.

use tracing::{debug, error};

use crate::actions::{execute_actions, Action};
use crate::environment::ActionEnvironment;
use crate::error::format_error_chain;
use crate::services::Services;
use crate::system::System;
use crate::topology::{Chassis, Device, Rail};

#[derive(Debug, Clone, PartialEq)]
pub struct SensorMonitoring {
    actions: Vec<Action>,
}

impl SensorMonitoring {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Run the monitoring actions for `rail` in a fresh environment scoped to `device`
    pub fn execute(
        &self,
        services: &Services,
        system: &System,
        chassis: &Chassis,
        device: &Device,
        rail: &Rail,
    ) {
        let mut env = ActionEnvironment::new(system, services, device.id());

        match execute_actions(&self.actions, &mut env) {
            Ok(_) => {
                debug!(
                    "Rail {}: {} sensor readings",
                    rail.id(),
                    env.sensor_readings().len()
                );
                services.sensors().publish(rail.id(), env.sensor_readings());
            },
            Err(e) => {
                // TODO: create an error record once a stable identifier exists for it
                error!(
                    chassis = chassis.number(),
                    device = device.id(),
                    "Unable to monitor sensors for rail {}: {}",
                    rail.id(),
                    format_error_chain(&e)
                );
                services.sensors().mark_stale(rail.id());
            },
        }
    }
}

//! Action instruction set
//!
//! [`Action`] is a closed enum. Each variant carries only its parameters;
//! all mutable state lives in the [`ActionEnvironment`]. Every action yields
//! a boolean result used by `and`, `or`, `not` and `if`. Actions that only
//! have side effects return `true`.
//!
//! Adding an action kind means one variant here plus one entry in the
//! parser's dispatch table.

mod i2c;
mod pmbus;

use std::fmt;

use crate::device_access::DeviceAccessError;
use crate::environment::ActionEnvironment;
use crate::error::{RegulatorsError, Result};

pub use i2c::{I2cCompareBit, I2cCompareByte, I2cWriteBit, I2cWriteByte};
pub use pmbus::{
    linear11_to_f64, linear16_from_volts, linear16_to_f64, parse_vout_mode, PmbusReadSensor,
    PmbusWriteVoutCommand, SensorDataFormat, VoutDataFormat, VoutMode, VOUT_COMMAND, VOUT_MODE,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// True if every action is true; all actions run regardless
    And(Vec<Action>),
    /// True if any action is true; all actions run regardless
    Or(Vec<Action>),
    Not(Box<Action>),
    If {
        condition: Box<Action>,
        then_actions: Vec<Action>,
        else_actions: Vec<Action>,
    },
    /// Execute another rule in the current environment
    RunRule(String),
    /// Change the device subsequent actions operate on
    SetDevice(String),
    I2cCompareBit(I2cCompareBit),
    I2cCompareByte(I2cCompareByte),
    I2cWriteBit(I2cWriteBit),
    I2cWriteByte(I2cWriteByte),
    PmbusReadSensor(PmbusReadSensor),
    PmbusWriteVoutCommand(PmbusWriteVoutCommand),
}

impl Action {
    pub fn execute(&self, env: &mut ActionEnvironment<'_>) -> Result<bool> {
        match self {
            Action::And(actions) => {
                let mut result = true;
                for action in actions {
                    if !action.execute(env)? {
                        result = false;
                    }
                }
                Ok(result)
            },
            Action::Or(actions) => {
                let mut result = false;
                for action in actions {
                    if action.execute(env)? {
                        result = true;
                    }
                }
                Ok(result)
            },
            Action::Not(action) => Ok(!action.execute(env)?),
            Action::If {
                condition,
                then_actions,
                else_actions,
            } => {
                if condition.execute(env)? {
                    execute_actions(then_actions, env)
                } else if else_actions.is_empty() {
                    Ok(false)
                } else {
                    execute_actions(else_actions, env)
                }
            },
            Action::RunRule(rule_id) => {
                let rule = env.rule(rule_id)?;
                env.increment_rule_depth(rule_id)?;
                let result = rule.execute(env);
                env.decrement_rule_depth();
                result
            },
            Action::SetDevice(device_id) => {
                env.set_device_id(device_id.as_str());
                Ok(true)
            },
            Action::I2cCompareBit(action) => action.execute(env),
            Action::I2cCompareByte(action) => action.execute(env),
            Action::I2cWriteBit(action) => action.execute(env),
            Action::I2cWriteByte(action) => action.execute(env),
            Action::PmbusReadSensor(action) => action.execute(env),
            Action::PmbusWriteVoutCommand(action) => action.execute(env),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::And(actions) => write!(f, "and: [ {} actions ]", actions.len()),
            Action::Or(actions) => write!(f, "or: [ {} actions ]", actions.len()),
            Action::Not(action) => write!(f, "not: {{ {} }}", action),
            Action::If {
                then_actions,
                else_actions,
                ..
            } => write!(
                f,
                "if: {{ then: {} actions, else: {} actions }}",
                then_actions.len(),
                else_actions.len()
            ),
            Action::RunRule(rule_id) => write!(f, "run_rule: {}", rule_id),
            Action::SetDevice(device_id) => write!(f, "set_device: {}", device_id),
            Action::I2cCompareBit(action) => action.fmt(f),
            Action::I2cCompareByte(action) => action.fmt(f),
            Action::I2cWriteBit(action) => action.fmt(f),
            Action::I2cWriteByte(action) => action.fmt(f),
            Action::PmbusReadSensor(action) => action.fmt(f),
            Action::PmbusWriteVoutCommand(action) => action.fmt(f),
        }
    }
}

/// Wrap a device access failure with the description of the failing action
fn action_error(action: &dyn fmt::Display, source: DeviceAccessError) -> RegulatorsError {
    RegulatorsError::DeviceAccess {
        action: action.to_string(),
        source,
    }
}

/// Run `actions` in order, stopping at the first error
///
/// Returns the result of the last action, or `true` for an empty list.
pub fn execute_actions(actions: &[Action], env: &mut ActionEnvironment<'_>) -> Result<bool> {
    let mut result = true;
    for action in actions {
        result = action.execute(env)?;
    }
    Ok(result)
}

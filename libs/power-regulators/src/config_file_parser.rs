//! JSON configuration file parser
//!
//! Builds the rule list and chassis list from a configuration document. Every
//! object is validated strictly: required properties must be present, types
//! must match, and an object may not carry properties the parser does not
//! recognise (checked by comparing the property count with the number of
//! properties consumed). `comments` is accepted on every object.
//!
//! Parsing never looks IDs up; references stay as strings until execution.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::actions::{
    Action, I2cCompareBit, I2cCompareByte, I2cWriteBit, I2cWriteByte, PmbusReadSensor,
    PmbusWriteVoutCommand, SensorDataFormat, VoutDataFormat,
};
use crate::configuration::Configuration;
use crate::error::{RegulatorsError, Result};
use crate::rule::Rule;
use crate::sensor_monitoring::SensorMonitoring;
use crate::sensors::SensorType;
use crate::topology::{Chassis, Device, I2cInterface, Rail};

/// Parse the configuration file at `path`
///
/// Any failure is reported as [`RegulatorsError::ConfigFile`] naming the file.
pub fn parse(path: &Path) -> Result<(Vec<Rule>, Vec<Chassis>)> {
    let config_error = |reason: String| RegulatorsError::ConfigFile {
        path: path.to_path_buf(),
        reason,
    };

    let content = fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
    let document: Value =
        serde_json::from_str(&content).map_err(|e| config_error(e.to_string()))?;
    let parsed = parse_root(&document).map_err(|e| config_error(e.to_string()))?;

    debug!(
        "Parsed {}: {} rules, {} chassis",
        path.display(),
        parsed.0.len(),
        parsed.1.len()
    );
    Ok(parsed)
}

/// Parse an already loaded configuration document
pub fn parse_root(element: &Value) -> Result<(Vec<Rule>, Vec<Chassis>)> {
    verify_is_object(element)?;
    let mut property_count = parse_comments(element)?;

    let mut rules = Vec::new();
    if let Some(rules_element) = element.get("rules") {
        rules = parse_array(rules_element, parse_rule)?;
        property_count += 1;
    }

    let chassis_element = get_required_property(element, "chassis")?;
    let chassis = parse_array(chassis_element, parse_chassis)?;
    property_count += 1;

    verify_property_count(element, property_count)?;
    Ok((rules, chassis))
}

// ============================================================================
// Validation helpers
// ============================================================================

fn invalid(msg: impl Into<String>) -> RegulatorsError {
    RegulatorsError::invalid_config(msg)
}

pub fn get_required_property<'v>(element: &'v Value, name: &str) -> Result<&'v Value> {
    element
        .get(name)
        .ok_or_else(|| invalid(format!("Required property missing: {}", name)))
}

pub fn verify_is_object(element: &Value) -> Result<()> {
    if !element.is_object() {
        return Err(invalid("Element is not an object"));
    }
    Ok(())
}

pub fn verify_is_array(element: &Value) -> Result<()> {
    if !element.is_array() {
        return Err(invalid("Element is not an array"));
    }
    Ok(())
}

/// Reject objects holding properties beyond the `expected` ones consumed
pub fn verify_property_count(element: &Value, expected: usize) -> Result<()> {
    let actual = element.as_object().map_or(0, |o| o.len());
    if actual != expected {
        return Err(invalid("Element contains an invalid property"));
    }
    Ok(())
}

/// Validate an optional `comments` array of strings; returns its property count
fn parse_comments(element: &Value) -> Result<usize> {
    match element.get("comments") {
        Some(comments) => {
            parse_array(comments, |line| parse_string(line, true))?;
            Ok(1)
        },
        None => Ok(0),
    }
}

fn parse_array<T>(element: &Value, parse_item: fn(&Value) -> Result<T>) -> Result<Vec<T>> {
    verify_is_array(element)?;
    element
        .as_array()
        .into_iter()
        .flatten()
        .map(parse_item)
        .collect()
}

pub fn parse_boolean(element: &Value) -> Result<bool> {
    element
        .as_bool()
        .ok_or_else(|| invalid("Element is not a boolean"))
}

pub fn parse_double(element: &Value) -> Result<f64> {
    element
        .as_f64()
        .ok_or_else(|| invalid("Element is not a number"))
}

pub fn parse_int8(element: &Value) -> Result<i8> {
    let value = element
        .as_i64()
        .ok_or_else(|| invalid("Element is not an integer"))?;
    i8::try_from(value).map_err(|_| invalid("Element is not an 8-bit signed integer"))
}

pub fn parse_uint8(element: &Value) -> Result<u8> {
    let value = element
        .as_i64()
        .ok_or_else(|| invalid("Element is not an integer"))?;
    u8::try_from(value).map_err(|_| invalid("Element is not an 8-bit unsigned integer"))
}

pub fn parse_unsigned_integer(element: &Value) -> Result<u32> {
    element
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| invalid("Element is not an unsigned integer"))
}

pub fn parse_string(element: &Value, is_empty_valid: bool) -> Result<String> {
    let value = element
        .as_str()
        .ok_or_else(|| invalid("Element is not a string"))?;
    if value.is_empty() && !is_empty_valid {
        return Err(invalid("Element contains an empty string"));
    }
    Ok(value.to_string())
}

/// `"0xN"` or `"0xNN"`
pub fn parse_hex_byte(element: &Value) -> Result<u8> {
    let value = parse_string(element, false)?;
    let digits = value
        .strip_prefix("0x")
        .filter(|d| (1..=2).contains(&d.len()) && d.chars().all(|c| c.is_ascii_hexdigit()))
        .ok_or_else(|| invalid("Element is not hexadecimal string"))?;
    u8::from_str_radix(digits, 16).map_err(|_| invalid("Element is not hexadecimal string"))
}

pub fn parse_bit_position(element: &Value) -> Result<u8> {
    element
        .as_u64()
        .filter(|v| *v <= 7)
        .map(|v| v as u8)
        .ok_or_else(|| invalid("Element is not a bit position"))
}

pub fn parse_bit_value(element: &Value) -> Result<u8> {
    element
        .as_u64()
        .filter(|v| *v <= 1)
        .map(|v| v as u8)
        .ok_or_else(|| invalid("Element is not a bit value"))
}

// ============================================================================
// Topology
// ============================================================================

fn parse_rule(element: &Value) -> Result<Rule> {
    verify_is_object(element)?;
    let mut property_count = parse_comments(element)?;

    let id = parse_string(get_required_property(element, "id")?, false)?;
    property_count += 1;

    let actions = parse_array(get_required_property(element, "actions")?, parse_action)?;
    property_count += 1;

    verify_property_count(element, property_count)?;
    Ok(Rule::new(id, actions))
}

fn parse_chassis(element: &Value) -> Result<Chassis> {
    verify_is_object(element)?;
    let mut property_count = parse_comments(element)?;

    let number = parse_unsigned_integer(get_required_property(element, "number")?)?;
    if number < 1 {
        return Err(invalid("Invalid chassis number: Must be > 0"));
    }
    property_count += 1;

    let mut inventory_path = None;
    if let Some(path) = element.get("inventory_path") {
        inventory_path = Some(parse_string(path, false)?);
        property_count += 1;
    }

    let mut devices = Vec::new();
    if let Some(devices_element) = element.get("devices") {
        devices = parse_array(devices_element, parse_device)?;
        property_count += 1;
    }

    verify_property_count(element, property_count)?;
    Ok(Chassis::new(number, inventory_path, devices))
}

fn parse_device(element: &Value) -> Result<Device> {
    verify_is_object(element)?;
    let mut property_count = parse_comments(element)?;

    let id = parse_string(get_required_property(element, "id")?, false)?;
    property_count += 1;

    let is_regulator = parse_boolean(get_required_property(element, "is_regulator")?)?;
    property_count += 1;

    let fru = parse_string(get_required_property(element, "fru")?, false)?;
    property_count += 1;

    let i2c_interface = parse_i2c_interface(get_required_property(element, "i2c_interface")?)?;
    property_count += 1;

    let mut configuration = None;
    if let Some(config_element) = element.get("configuration") {
        configuration = Some(parse_configuration(config_element)?);
        property_count += 1;
    }

    let mut rails = Vec::new();
    if let Some(rails_element) = element.get("rails") {
        if !is_regulator {
            return Err(invalid("Invalid rails property when is_regulator is false"));
        }
        rails = parse_array(rails_element, parse_rail)?;
        property_count += 1;
    }

    verify_property_count(element, property_count)?;
    Ok(Device::new(
        id,
        is_regulator,
        fru,
        i2c_interface,
        configuration,
        rails,
    ))
}

fn parse_i2c_interface(element: &Value) -> Result<I2cInterface> {
    verify_is_object(element)?;
    let mut property_count = parse_comments(element)?;

    let bus = parse_uint8(get_required_property(element, "bus")?)?;
    property_count += 1;

    let address = parse_hex_byte(get_required_property(element, "address")?)?;
    property_count += 1;

    verify_property_count(element, property_count)?;
    Ok(I2cInterface::new(bus, address))
}

fn parse_rail(element: &Value) -> Result<Rail> {
    verify_is_object(element)?;
    let mut property_count = parse_comments(element)?;

    let id = parse_string(get_required_property(element, "id")?, false)?;
    property_count += 1;

    let mut configuration = None;
    if let Some(config_element) = element.get("configuration") {
        configuration = Some(parse_configuration(config_element)?);
        property_count += 1;
    }

    let mut sensor_monitoring = None;
    if let Some(monitoring_element) = element.get("sensor_monitoring") {
        sensor_monitoring = Some(parse_sensor_monitoring(monitoring_element)?);
        property_count += 1;
    }

    verify_property_count(element, property_count)?;
    Ok(Rail::new(id, configuration, sensor_monitoring))
}

fn parse_configuration(element: &Value) -> Result<Configuration> {
    verify_is_object(element)?;
    let mut property_count = parse_comments(element)?;

    let mut volts = None;
    if let Some(volts_element) = element.get("volts") {
        volts = Some(parse_double(volts_element)?);
        property_count += 1;
    }

    let actions = parse_rule_id_or_actions(element)?;
    property_count += 1;

    verify_property_count(element, property_count)?;
    Ok(Configuration::new(volts, actions))
}

fn parse_sensor_monitoring(element: &Value) -> Result<SensorMonitoring> {
    verify_is_object(element)?;
    let mut property_count = parse_comments(element)?;

    let actions = parse_rule_id_or_actions(element)?;
    property_count += 1;

    verify_property_count(element, property_count)?;
    Ok(SensorMonitoring::new(actions))
}

/// Exactly one of `rule_id` or `actions`; a `rule_id` becomes one `run_rule`
fn parse_rule_id_or_actions(element: &Value) -> Result<Vec<Action>> {
    match (element.get("rule_id"), element.get("actions")) {
        (Some(rule_id), None) => Ok(vec![Action::RunRule(parse_string(rule_id, false)?)]),
        (None, Some(actions)) => parse_array(actions, parse_action),
        (Some(_), Some(_)) => Err(invalid(
            "Invalid property combination: Must contain either rule_id or actions",
        )),
        (None, None) => Err(invalid("Required property missing: rule_id or actions")),
    }
}

// ============================================================================
// Actions
// ============================================================================

type ActionParser = fn(&Value) -> Result<Action>;

/// Action kind (the discriminator property name) to its parser
const ACTION_PARSERS: &[(&str, ActionParser)] = &[
    ("and", parse_and),
    ("or", parse_or),
    ("not", parse_not),
    ("if", parse_if),
    ("run_rule", parse_run_rule),
    ("set_device", parse_set_device),
    ("i2c_compare_bit", parse_i2c_compare_bit),
    ("i2c_compare_byte", parse_i2c_compare_byte),
    ("i2c_write_bit", parse_i2c_write_bit),
    ("i2c_write_byte", parse_i2c_write_byte),
    ("pmbus_read_sensor", parse_pmbus_read_sensor),
    ("pmbus_write_vout_command", parse_pmbus_write_vout_command),
];

pub fn parse_action(element: &Value) -> Result<Action> {
    verify_is_object(element)?;
    let mut property_count = parse_comments(element)?;

    let (kind, parse_kind) = ACTION_PARSERS
        .iter()
        .find(|(kind, _)| element.get(*kind).is_some())
        .ok_or_else(|| invalid("Required action type property missing"))?;
    let action = parse_kind(get_required_property(element, kind)?)?;
    property_count += 1;

    verify_property_count(element, property_count)?;
    Ok(action)
}

fn parse_action_list(element: &Value) -> Result<Vec<Action>> {
    let actions = parse_array(element, parse_action)?;
    if actions.len() < 2 {
        return Err(invalid("Array must contain two or more actions"));
    }
    Ok(actions)
}

fn parse_and(element: &Value) -> Result<Action> {
    Ok(Action::And(parse_action_list(element)?))
}

fn parse_or(element: &Value) -> Result<Action> {
    Ok(Action::Or(parse_action_list(element)?))
}

fn parse_not(element: &Value) -> Result<Action> {
    Ok(Action::Not(Box::new(parse_action(element)?)))
}

fn parse_if(element: &Value) -> Result<Action> {
    verify_is_object(element)?;
    let mut property_count = 0;

    let condition = parse_action(get_required_property(element, "condition")?)?;
    property_count += 1;

    let then_actions = parse_array(get_required_property(element, "then")?, parse_action)?;
    property_count += 1;

    let mut else_actions = Vec::new();
    if let Some(else_element) = element.get("else") {
        else_actions = parse_array(else_element, parse_action)?;
        property_count += 1;
    }

    verify_property_count(element, property_count)?;
    Ok(Action::If {
        condition: Box::new(condition),
        then_actions,
        else_actions,
    })
}

fn parse_run_rule(element: &Value) -> Result<Action> {
    Ok(Action::RunRule(parse_string(element, false)?))
}

fn parse_set_device(element: &Value) -> Result<Action> {
    Ok(Action::SetDevice(parse_string(element, false)?))
}

/// `{register, position, value}` shared by the bit actions
fn parse_bit_operands(element: &Value) -> Result<(u8, u8, u8)> {
    verify_is_object(element)?;

    let register = parse_hex_byte(get_required_property(element, "register")?)?;
    let position = parse_bit_position(get_required_property(element, "position")?)?;
    let value = parse_bit_value(get_required_property(element, "value")?)?;

    verify_property_count(element, 3)?;
    Ok((register, position, value))
}

/// `{register, value, mask?}` shared by the byte actions
fn parse_byte_operands(element: &Value) -> Result<(u8, u8, Option<u8>)> {
    verify_is_object(element)?;
    let mut property_count = 0;

    let register = parse_hex_byte(get_required_property(element, "register")?)?;
    property_count += 1;

    let value = parse_hex_byte(get_required_property(element, "value")?)?;
    property_count += 1;

    let mut mask = None;
    if let Some(mask_element) = element.get("mask") {
        mask = Some(parse_hex_byte(mask_element)?);
        property_count += 1;
    }

    verify_property_count(element, property_count)?;
    Ok((register, value, mask))
}

fn parse_i2c_compare_bit(element: &Value) -> Result<Action> {
    let (register, position, value) = parse_bit_operands(element)?;
    Ok(Action::I2cCompareBit(I2cCompareBit {
        register,
        position,
        value,
    }))
}

fn parse_i2c_write_bit(element: &Value) -> Result<Action> {
    let (register, position, value) = parse_bit_operands(element)?;
    Ok(Action::I2cWriteBit(I2cWriteBit {
        register,
        position,
        value,
    }))
}

fn parse_i2c_compare_byte(element: &Value) -> Result<Action> {
    let (register, value, mask) = parse_byte_operands(element)?;
    Ok(Action::I2cCompareByte(I2cCompareByte {
        register,
        value,
        mask,
    }))
}

fn parse_i2c_write_byte(element: &Value) -> Result<Action> {
    let (register, value, mask) = parse_byte_operands(element)?;
    Ok(Action::I2cWriteByte(I2cWriteByte {
        register,
        value,
        mask,
    }))
}

fn parse_sensor_type(element: &Value) -> Result<SensorType> {
    let value = parse_string(element, false)?;
    value
        .parse()
        .map_err(|_| invalid("Element is not a sensor type"))
}

fn parse_sensor_data_format(element: &Value) -> Result<SensorDataFormat> {
    match parse_string(element, false)?.as_str() {
        "linear_11" => Ok(SensorDataFormat::Linear11),
        "linear_16" => Ok(SensorDataFormat::Linear16),
        _ => Err(invalid("Element is not a sensor data format")),
    }
}

fn parse_pmbus_read_sensor(element: &Value) -> Result<Action> {
    verify_is_object(element)?;
    let mut property_count = 0;

    let sensor_type = parse_sensor_type(get_required_property(element, "type")?)?;
    property_count += 1;

    let command = parse_hex_byte(get_required_property(element, "command")?)?;
    property_count += 1;

    let format = parse_sensor_data_format(get_required_property(element, "format")?)?;
    property_count += 1;

    let mut exponent = None;
    if let Some(exponent_element) = element.get("exponent") {
        exponent = Some(parse_int8(exponent_element)?);
        property_count += 1;
    }

    verify_property_count(element, property_count)?;
    Ok(Action::PmbusReadSensor(PmbusReadSensor {
        sensor_type,
        command,
        format,
        exponent,
    }))
}

fn parse_pmbus_write_vout_command(element: &Value) -> Result<Action> {
    verify_is_object(element)?;
    let mut property_count = 0;

    let mut volts = None;
    if let Some(volts_element) = element.get("volts") {
        volts = Some(parse_double(volts_element)?);
        property_count += 1;
    }

    let format = match parse_string(get_required_property(element, "format")?, false)?.as_str() {
        "linear" => VoutDataFormat::Linear,
        other => return Err(invalid(format!("Invalid format value: {}", other))),
    };
    property_count += 1;

    let mut exponent = None;
    if let Some(exponent_element) = element.get("exponent") {
        exponent = Some(parse_int8(exponent_element)?);
        property_count += 1;
    }

    let mut is_verified = false;
    if let Some(verified_element) = element.get("is_verified") {
        is_verified = parse_boolean(verified_element)?;
        property_count += 1;
    }

    verify_property_count(element, property_count)?;
    Ok(Action::PmbusWriteVoutCommand(PmbusWriteVoutCommand {
        volts,
        format,
        exponent,
        is_verified,
    }))
}

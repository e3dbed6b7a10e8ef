//! Point schema of the charger on the device bus
//!
//! Every published point has a name (its bus path), a value kind that decides
//! how the value is rendered as text and, for data points, the charger field
//! it is read from.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

pub mod service;

pub use service::{ExternalWrite, PointChange, PointService};

pub mod paths {
    pub const CHARGE_STATE: &str = "/ChargeState";
    pub const CHARGE_POWER: &str = "/ChargePower";
    pub const INTENSITY: &str = "/Intensity";
    pub const MAX_INTENSITY: &str = "/MaxIntensity";
    pub const START_STOP: &str = "/StartStop";
    pub const UPDATE_INDEX: &str = "/UpdateIndex";
    pub const CONNECTED: &str = "/Connected";
    pub const WRITE_FAULT: &str = "/WriteFault";
}

/// A value as stored on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum PointValue {
    #[default]
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
}

impl PointValue {
    /// Take a value written by a bus client. Objects and arrays are not point values.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(PointValue::Empty),
            Value::Bool(b) => Some(PointValue::Int(*b as i64)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return Some(PointValue::Int(i));
                }
                n.as_f64().map(PointValue::Float)
            },
            Value::String(s) => Some(PointValue::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        return serde_json::to_value(self).unwrap_or(Value::Null);
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PointValue::Int(i) => Some(*i as f64),
            PointValue::Float(f) => Some(*f),
            PointValue::Text(s) => s.trim().parse::<f64>().ok(),
            PointValue::Empty => None,
        }
    }
}

/// Plain text of the value, as it goes onto the wire in control calls
impl fmt::Display for PointValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointValue::Empty => Ok(()),
            PointValue::Int(i) => write!(f, "{i}"),
            PointValue::Float(v) => write!(f, "{v}"),
            PointValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// How a point renders its value as text
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueKind {
    /// The value as is, no unit
    Raw,
    /// Fixed number of decimals followed by a unit
    Float { decimals: usize, unit: &'static str },
    /// Rounded to a whole number followed by a unit
    Int { unit: &'static str },
}

impl ValueKind {
    pub fn format(&self, value: &PointValue) -> String {
        if *value == PointValue::Empty {
            return "".to_string();
        }

        match self {
            ValueKind::Raw => value.to_string(),
            ValueKind::Float { decimals, unit } => match value.as_f64() {
                Some(v) => format!("{v:.prec$}{unit}", prec = *decimals),
                None => value.to_string(),
            },
            ValueKind::Int { unit } => match value.as_f64() {
                Some(v) => format!("{}{unit}", v.round() as i64),
                None => value.to_string(),
            },
        }
    }
}

/// Declared type a charger field is coerced into
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldType {
    Float,
    Integer,
}

/// One data point of the charger
#[derive(Debug, Clone, Copy)]
pub struct PointDef {
    pub path: &'static str,
    /// Charger field it is read from, `None` for derived points
    pub field: Option<&'static str>,
    pub field_type: FieldType,
    pub kind: ValueKind,
    pub writable: bool,
}

const WATT: ValueKind = ValueKind::Float { decimals: 1, unit: "W" };
const WATT_INT: ValueKind = ValueKind::Int { unit: "W" };
const AMPERE: ValueKind = ValueKind::Int { unit: "A" };
const KWH: ValueKind = ValueKind::Float { decimals: 2, unit: "kWh" };
const SECONDS: ValueKind = ValueKind::Int { unit: "s" };

const fn field(path: &'static str, name: &'static str, field_type: FieldType, kind: ValueKind) -> PointDef {
    PointDef { path, field: Some(name), field_type, kind, writable: true }
}

const fn derived(path: &'static str) -> PointDef {
    PointDef { path, field: None, field_type: FieldType::Integer, kind: ValueKind::Raw, writable: true }
}

/// All data points, refreshed together on every successful poll
pub static DATA_POINTS: [PointDef; 18] = [
    derived(paths::CHARGE_STATE),
    field(paths::CHARGE_POWER, "ChargePower", FieldType::Float, WATT),
    field("/ChargeEnergy", "ChargeEnergy", FieldType::Float, KWH),
    field("/SlaveError", "SlaveError", FieldType::Integer, ValueKind::Raw),
    field("/ChargeTime", "ChargeTime", FieldType::Integer, SECONDS),
    field("/HousePower", "HousePower", FieldType::Integer, WATT_INT),
    field("/FVPower", "FVPower", FieldType::Float, WATT),
    field("/Paused", "Paused", FieldType::Integer, ValueKind::Raw),
    field("/Locked", "Locked", FieldType::Integer, ValueKind::Raw),
    field("/Timer", "Timer", FieldType::Integer, ValueKind::Raw),
    field(paths::INTENSITY, "Intensity", FieldType::Integer, AMPERE),
    field("/Dynamic", "Dynamic", FieldType::Integer, ValueKind::Raw),
    field("/MinIntensity", "MinIntensity", FieldType::Integer, AMPERE),
    field(paths::MAX_INTENSITY, "MaxIntensity", FieldType::Integer, AMPERE),
    field("/PauseDynamic", "PauseDynamic", FieldType::Integer, ValueKind::Raw),
    field("/DynamicPowerMode", "DynamicPowerMode", FieldType::Integer, ValueKind::Raw),
    field("/ContractedPower", "ContractedPower", FieldType::Integer, WATT_INT),
    derived(paths::START_STOP),
];

pub fn find(path: &str) -> Option<&'static PointDef> {
    return DATA_POINTS.iter().find(|p| p.path == path);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatting() {
        assert_eq!(WATT.format(&PointValue::Float(1234.56)), "1234.6W");
        assert_eq!(KWH.format(&PointValue::Float(3.14159)), "3.14kWh");
        assert_eq!(AMPERE.format(&PointValue::Int(16)), "16A");
        assert_eq!(SECONDS.format(&PointValue::Float(59.6)), "60s");
        assert_eq!(ValueKind::Raw.format(&PointValue::Int(2)), "2");
        assert_eq!(WATT.format(&PointValue::Empty), "");
    }

    #[test]
    fn test_schema_covers_every_field_once() {
        let fields: Vec<&str> = DATA_POINTS.iter().filter_map(|p| p.field).collect();
        assert_eq!(fields.len(), 16);
        for (i, f) in fields.iter().enumerate() {
            assert!(!fields[i + 1..].contains(f), "{f} listed twice");
        }
        assert!(find("/StartStop").unwrap().field.is_none());
        assert!(find("/Nope").is_none());
    }

    #[test]
    fn test_values_from_bus_json() {
        assert_eq!(PointValue::from_json(&serde_json::json!(7)), Some(PointValue::Int(7)));
        assert_eq!(PointValue::from_json(&serde_json::json!(7.5)), Some(PointValue::Float(7.5)));
        assert_eq!(PointValue::from_json(&serde_json::json!(true)), Some(PointValue::Int(1)));
        assert_eq!(PointValue::from_json(&serde_json::json!("16")), Some(PointValue::Text("16".to_string())));
        assert_eq!(PointValue::from_json(&serde_json::json!([1])), None);
        assert_eq!(PointValue::Int(7).to_string(), "7");
        assert_eq!(PointValue::Empty.to_json(), Value::Null);
    }
}

use log::warn;
use serde_json::Value;
use std::collections::BTreeMap;
use crate::error::{BridgeError, Result};
use crate::points::{paths, FieldType, PointValue, DATA_POINTS};
use crate::trydan::TelemetryDocument;

/// Charging state as shown on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeState {
    Waiting = 0,
    Connected = 1,
    Charging = 2,
}

impl ChargeState {
    /// Codes the charger should never send end up as `Waiting`
    pub fn from_raw(code: i64) -> Self {
        match code {
            0 => ChargeState::Waiting,
            1 => ChargeState::Connected,
            2 => ChargeState::Charging,
            _ => {
                warn!("Unknown charge state {code}, reporting Waiting");
                ChargeState::Waiting
            }
        }
    }

    /// A vehicle is plugged in, charging or not
    pub fn is_active(&self) -> bool {
        return *self == ChargeState::Connected || *self == ChargeState::Charging;
    }
}

pub type PointValues = BTreeMap<&'static str, PointValue>;

fn translation_error(field: &str, value: &Value, wanted: &str) -> BridgeError {
    return BridgeError::Translation {
        field: field.to_string(),
        reason: format!("{value} is not {wanted}"),
    };
}

pub fn to_float(field: &str, value: &Value) -> Result<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(*b as i64 as f64),
        _ => None,
    };

    match v {
        Some(f) if f.is_finite() => Ok(f),
        _ => Err(translation_error(field, value, "a number")),
    }
}

/// Whole numbers pass as they are, fractional ones are truncated
pub fn to_int(field: &str, value: &Value) -> Result<i64> {
    if let Value::Number(n) = value {
        if let Some(i) = n.as_i64() {
            return Ok(i);
        }
    }
    if let Value::String(s) = value {
        if let Ok(i) = s.trim().parse::<i64>() {
            return Ok(i);
        }
    }

    let f = to_float(field, value).map_err(|_| translation_error(field, value, "an integer"))?;
    return Ok(f.trunc() as i64);
}

/// Map one snapshot onto all data points.
///
/// Either every point gets a value or the whole snapshot fails, so a bad
/// field never leaves the bus with a mix of old and new values.
pub fn translate(doc: &TelemetryDocument) -> Result<PointValues> {
    let mut values = PointValues::new();

    for def in DATA_POINTS.iter() {
        let field = match def.field {
            Some(f) => f,
            None => continue,
        };

        let raw = doc.get(field).ok_or_else(|| BridgeError::Translation {
            field: field.to_string(),
            reason: "missing".to_string(),
        })?;

        let value = match def.field_type {
            FieldType::Float => PointValue::Float(to_float(field, raw)?),
            FieldType::Integer => PointValue::Int(to_int(field, raw)?),
        };
        values.insert(def.path, value);
    }

    let raw_state = doc.get("ChargeState").ok_or_else(|| BridgeError::Translation {
        field: "ChargeState".to_string(),
        reason: "missing".to_string(),
    })?;
    let state = ChargeState::from_raw(to_int("ChargeState", raw_state)?);

    values.insert(paths::CHARGE_STATE, PointValue::Int(state as i64));
    values.insert(paths::START_STOP, PointValue::Int(state.is_active() as i64));

    return Ok(values);
}

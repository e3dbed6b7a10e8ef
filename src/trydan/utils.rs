use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    /* A numeric value wrapped in quotes, the closing quote is sometimes missing */
    static ref QUOTED_NUMBER: Regex = Regex::new(r#":\s*"(-?\d+(?:\.\d+)?)(?:"|(\s*[,}]))"#).unwrap();
}

/// Unquote numeric values so the body parses into numbers.
/// Real strings like `"IP":"10.0.0.2"` do not look like a single number and stay as they are.
pub fn normalize_body(body: &str) -> String {
    return QUOTED_NUMBER.replace_all(body, ":${1}${2}").into_owned();
}

pub fn realtime_url(base: &str) -> String {
    return format!("{base}/RealTimeData");
}

pub fn control_url(base: &str, parameter: &str, value: &str) -> String {
    return format!("{base}/r?json=1&rapi=${parameter}{value}");
}

/// True if the charger answered with exactly the value that was sent
pub fn echoes(response: &Value, parameter: &str, value: &str) -> bool {
    match response.get(parameter) {
        Some(Value::String(s)) => s == value,
        Some(Value::Number(n)) => n.to_string() == value,
        Some(Value::Bool(b)) => (*b as u8).to_string() == value,
        _ => false,
    }
}

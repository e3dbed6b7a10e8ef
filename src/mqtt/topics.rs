use serde_json::{json, Value};
use crate::points::{ExternalWrite, PointChange};

/// Venus OS MQTT topic layout for one charger service:
/// `N/<portal>/evcharger/<instance>/<path>` carries values,
/// `W/<portal>/evcharger/<instance>/<path>` carries writes.
#[derive(Debug, Clone)]
pub struct Topics {
    portal_id: String,
    instance: u32,
}

impl Topics {
    pub fn new(portal_id: &str, instance: u32) -> Self {
        return Topics { portal_id: portal_id.to_string(), instance };
    }

    pub fn notify(&self, path: &str) -> String {
        return format!("N/{}/evcharger/{}{}", self.portal_id, self.instance, path);
    }

    fn write_prefix(&self) -> String {
        return format!("W/{}/evcharger/{}", self.portal_id, self.instance);
    }

    pub fn write_filter(&self) -> String {
        return format!("{}/#", self.write_prefix());
    }

    /// Turn a `W/` message into a write. Payloads are `{"value": ...}`,
    /// a bare JSON value is taken as well.
    pub fn parse_write(&self, topic: &str, payload: &[u8]) -> Option<ExternalWrite> {
        let prefix = self.write_prefix();
        let path = topic.strip_prefix(prefix.as_str())?;
        if !path.starts_with('/') || path.len() < 2 {
            return None;
        }

        let doc: Value = serde_json::from_slice(payload).ok()?;
        let value = match doc {
            Value::Object(mut m) => m.remove("value")?,
            other => other,
        };

        return Some(ExternalWrite { path: path.to_string(), value });
    }
}

pub fn value_payload(change: &PointChange) -> String {
    return json!({ "value": change.value.to_json() }).to_string();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points::PointValue;

    #[test]
    fn test_notify_topic() {
        let t = Topics::new("c0619ab12345", 43);
        assert_eq!(t.notify("/ChargePower"), "N/c0619ab12345/evcharger/43/ChargePower");
        assert_eq!(t.notify("/Mgmt/ProcessName"), "N/c0619ab12345/evcharger/43/Mgmt/ProcessName");
        assert_eq!(t.write_filter(), "W/c0619ab12345/evcharger/43/#");
    }

    #[test]
    fn test_parse_write() {
        let t = Topics::new("abc", 43);
        let w = t.parse_write("W/abc/evcharger/43/Intensity", br#"{"value": 7}"#).unwrap();
        assert_eq!(w.path, "/Intensity");
        assert_eq!(w.value, serde_json::json!(7));

        let w = t.parse_write("W/abc/evcharger/43/StartStop", b"1").unwrap();
        assert_eq!(w.value, serde_json::json!(1));
    }

    #[test]
    fn test_parse_write_ignores_foreign_topics() {
        let t = Topics::new("abc", 43);
        assert!(t.parse_write("W/abc/evcharger/430/Intensity", br#"{"value": 7}"#).is_none());
        assert!(t.parse_write("W/abc/evcharger/44/Intensity", br#"{"value": 7}"#).is_none());
        assert!(t.parse_write("W/abc/evcharger/43/", br#"{"value": 7}"#).is_none());
        assert!(t.parse_write("W/abc/evcharger/43/Intensity", b"not json").is_none());
        assert!(t.parse_write("W/abc/evcharger/43/Intensity", br#"{"other": 7}"#).is_none());
    }

    #[test]
    fn test_value_payload() {
        let c = PointChange { path: "/Status".to_string(), value: PointValue::Empty, text: "".to_string() };
        assert_eq!(value_payload(&c), r#"{"value":null}"#);
        let c = PointChange { path: "/ChargePower".to_string(), value: PointValue::Float(1.5), text: "1.5W".to_string() };
        assert_eq!(value_payload(&c), r#"{"value":1.5}"#);
    }
}

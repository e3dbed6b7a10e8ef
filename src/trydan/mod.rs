//! HTTP side of the V2C Trydan charger
//!
//! The charger exposes its live data on `/RealTimeData` and takes control
//! commands as `/r?json=1&rapi=$<parameter><value>`, answering with the
//! parameter it applied.

use log::{debug, warn};
use reqwest::StatusCode;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use crate::config::ConfigProvider;
use crate::error::{BridgeError, Result};

pub mod utils;

/// Fields every `/RealTimeData` answer has to carry
pub const EXPECTED_FIELDS: [&str; 17] = [
    "ChargeState",
    "ChargePower",
    "ChargeEnergy",
    "SlaveError",
    "ChargeTime",
    "HousePower",
    "FVPower",
    "Paused",
    "Locked",
    "Timer",
    "Intensity",
    "Dynamic",
    "MinIntensity",
    "MaxIntensity",
    "PauseDynamic",
    "DynamicPowerMode",
    "ContractedPower",
];

/// One snapshot of the charger, validated against `EXPECTED_FIELDS`
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryDocument {
    fields: Map<String, Value>,
}

impl TelemetryDocument {
    pub fn parse(body: &str) -> Result<Self> {
        let normalized = utils::normalize_body(body);
        let doc: Value = serde_json::from_str(&normalized)?;

        let fields = match doc {
            Value::Object(m) => m,
            other => {
                return Err(BridgeError::Parse(format!("expected a JSON object, got {other}")));
            }
        };

        if fields.is_empty() {
            return Err(BridgeError::Parse("Converting response to JSON failed".to_string()));
        }

        return TelemetryDocument::from_map(fields);
    }

    pub fn from_map(fields: Map<String, Value>) -> Result<Self> {
        if fields.len() != EXPECTED_FIELDS.len() {
            return Err(BridgeError::Schema(format!(
                "Data len is not correct, expected response len={}, len obtained {}",
                EXPECTED_FIELDS.len(),
                fields.len()
            )));
        }

        for name in EXPECTED_FIELDS {
            if !fields.contains_key(name) {
                return Err(BridgeError::Schema(format!("field {name} is missing")));
            }
        }

        return Ok(TelemetryDocument { fields });
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        return self.fields.get(name);
    }

    pub fn len(&self) -> usize {
        return self.fields.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.fields.is_empty();
    }
}

/// Talks to the charger. The device address is looked up in the config on
/// every request; there is no retry, the caller decides what to do next.
#[derive(Clone)]
pub struct TrydanClient {
    http: reqwest::Client,
    config: Arc<dyn ConfigProvider>,
}

impl TrydanClient {
    pub fn new(config: Arc<dyn ConfigProvider>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Config(format!("Unable to create HTTP client: {e}")))?;

        return Ok(TrydanClient { http, config });
    }

    fn base_url(&self) -> Result<String> {
        return self.config.get()?.device.base_url();
    }

    /// Read the current snapshot from `/RealTimeData`
    pub async fn fetch(&self) -> Result<TelemetryDocument> {
        let url = utils::realtime_url(&self.base_url()?);
        debug!("Fetching {url}");

        let response = self.http.get(&url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(BridgeError::Transport(format!("{url} answered {}", response.status())));
        }

        let body = response.text().await?;
        return TelemetryDocument::parse(&body);
    }

    /// Send one control command and check the charger applied it.
    /// A charger that answers but does not echo the value is a `WriteRejected`.
    pub async fn control(&self, parameter: &str, value: &str) -> Result<()> {
        let url = utils::control_url(&self.base_url()?, parameter, value);
        debug!("Sending control request {url}");

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(BridgeError::Transport(format!("No response from charger - {url} ({})", response.status())));
        }

        let body = response.text().await?;
        let answer: Value = serde_json::from_str(&body)?;
        if !answer.is_object() {
            return Err(BridgeError::Parse(format!("Converting response to JSON failed: {body}")));
        }

        if utils::echoes(&answer, parameter, value) {
            return Ok(());
        }

        warn!("Charger parameter {parameter} not set to {value}, answer was {answer}");
        return Err(BridgeError::WriteRejected {
            parameter: parameter.to_string(),
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{Config, StaticConfig};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub fn sample_json(charge_state: i64) -> Value {
        return json!({
            "ChargeState": charge_state,
            "ChargePower": 7360.4,
            "ChargeEnergy": 12.345,
            "SlaveError": 0,
            "ChargeTime": 3600,
            "HousePower": 1500,
            "FVPower": 2100.0,
            "Paused": 0,
            "Locked": 0,
            "Timer": 0,
            "Intensity": 32,
            "Dynamic": 1,
            "MinIntensity": 6,
            "MaxIntensity": 32,
            "PauseDynamic": 0,
            "DynamicPowerMode": 2,
            "ContractedPower": 5750
        });
    }

    pub fn provider_for(server: &MockServer) -> Arc<dyn ConfigProvider> {
        let host = server.address().to_string();
        let config = Config::from_yaml(&format!("device:\n  host: \"{host}\"\n")).unwrap();
        return Arc::new(StaticConfig::new(config));
    }

    fn client_for(server: &MockServer) -> TrydanClient {
        return TrydanClient::new(provider_for(server), Duration::from_secs(2)).unwrap();
    }

    #[test]
    fn test_parse_valid_document() {
        let doc = TelemetryDocument::parse(&sample_json(2).to_string()).unwrap();
        assert_eq!(doc.len(), 17);
        assert_eq!(doc.get("Intensity"), Some(&json!(32)));
    }

    #[test]
    fn test_parse_quoted_values() {
        let mut body = sample_json(1).to_string();
        body = body.replace(":7360.4", ":\"7360.4\"");
        let doc = TelemetryDocument::parse(&body).unwrap();
        assert_eq!(doc.get("ChargePower"), Some(&json!(7360.4)));
    }

    #[test]
    fn test_parse_rejects_garbage_and_empty() {
        assert!(matches!(TelemetryDocument::parse("<html>"), Err(BridgeError::Parse(_))));
        assert!(matches!(TelemetryDocument::parse("{}"), Err(BridgeError::Parse(_))));
        assert!(matches!(TelemetryDocument::parse("[1,2]"), Err(BridgeError::Parse(_))));
    }

    #[test]
    fn test_schema_rejects_wrong_field_count() {
        let mut v = sample_json(0);
        v.as_object_mut().unwrap().insert("NewField".to_string(), json!(1));
        assert!(matches!(TelemetryDocument::parse(&v.to_string()), Err(BridgeError::Schema(_))));

        let mut v = sample_json(0);
        v.as_object_mut().unwrap().remove("Timer");
        assert!(matches!(TelemetryDocument::parse(&v.to_string()), Err(BridgeError::Schema(_))));
    }

    #[test]
    fn test_schema_rejects_renamed_field() {
        let mut v = sample_json(0);
        let m = v.as_object_mut().unwrap();
        m.remove("Timer");
        m.insert("Timers".to_string(), json!(0));
        match TelemetryDocument::parse(&v.to_string()) {
            Err(BridgeError::Schema(msg)) => assert!(msg.contains("Timer")),
            _ => panic!("expected a schema error"),
        }
    }

    #[tokio::test]
    async fn test_fetch_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/RealTimeData"))
            .respond_with(ResponseTemplate::new(200).set_body_string(sample_json(2).to_string()))
            .expect(1)
            .mount(&server)
            .await;

        let doc = client_for(&server).fetch().await.unwrap();
        assert_eq!(doc.get("ChargeState"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_fetch_http_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/RealTimeData"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(matches!(client_for(&server).fetch().await, Err(BridgeError::Transport(_))));
    }

    #[tokio::test]
    async fn test_control_accepts_echo() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/r"))
            .and(query_param("json", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"SC+": "7"})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).control("SC+", "7").await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[0].url.query(), Some("json=1&rapi=$SC+7"));
    }

    #[tokio::test]
    async fn test_control_mismatch_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/r"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"MaxIntensity": "15"})))
            .mount(&server)
            .await;

        match client_for(&server).control("MaxIntensity", "16").await {
            Err(BridgeError::WriteRejected { parameter, value }) => {
                assert_eq!(parameter, "MaxIntensity");
                assert_eq!(value, "16");
            },
            other => panic!("expected a rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_control_garbage_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/r"))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .mount(&server)
            .await;

        assert!(matches!(client_for(&server).control("F", "1").await, Err(BridgeError::Parse(_))));
    }

    #[tokio::test]
    async fn test_unsupported_access_type_is_config_error() {
        let config = Config::from_yaml("device:\n  host: h\n  access_type: Cloud\n").unwrap();
        let client = TrydanClient::new(Arc::new(StaticConfig::new(config)), Duration::from_secs(1)).unwrap();
        assert!(matches!(client.control("F", "1").await, Err(BridgeError::Config(_))));
        assert!(matches!(client.fetch().await, Err(BridgeError::Config(_))));
    }
}

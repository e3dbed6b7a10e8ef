use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use crate::error::{BridgeError, Result};

/// How the charger's network address is turned into request URLs.
/// Only `OnPremise` is supported, anything else is kept verbatim so the
/// error can name it when a request is built.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(from = "String", into = "String")]
pub enum AccessType {
    OnPremise,
    Other(String),
}

impl From<String> for AccessType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "OnPremise" => AccessType::OnPremise,
            _ => AccessType::Other(s),
        }
    }
}

impl From<AccessType> for String {
    fn from(a: AccessType) -> Self {
        match a {
            AccessType::OnPremise => "OnPremise".to_string(),
            AccessType::Other(s) => s,
        }
    }
}

/// What a bus write to `/StartStop` sends to the charger.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StartStopPolicy {
    /// Always send `F1`, whatever value was written
    #[default]
    AlwaysStart,
    /// Send the written value (`F0` / `F1`)
    FollowValue,
}

fn device_instance_default() -> u32 { return 43 }
fn device_access_type_default() -> AccessType { return AccessType::OnPremise }
fn device_product_name_default() -> String { return "v2c_trydan".to_string() }
fn device_firmware_version_default() -> String { return "1.6.8".to_string() }
fn device_hardware_version_default() -> u32 { return 2 }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct DeviceConfig {
    #[serde(default="device_instance_default")]
    pub instance: u32,
    #[serde(default="device_access_type_default")]
    pub access_type: AccessType,
    pub host: String,
    #[serde(default="device_product_name_default")]
    pub product_name: String,
    #[serde(default="device_firmware_version_default")]
    pub firmware_version: String,
    #[serde(default="device_hardware_version_default")]
    pub hardware_version: u32,
    #[serde(default)]
    pub serial: String,
    #[serde(default)]
    pub start_stop: StartStopPolicy,
}

impl DeviceConfig {
    /// Base URL of the charger's HTTP API for the configured access type
    pub fn base_url(&self) -> Result<String> {
        match &self.access_type {
            AccessType::OnPremise => {
                let host = self.host.trim().trim_end_matches('/');
                if host.is_empty() {
                    return Err(BridgeError::Config("device.host is empty".to_string()));
                }
                return Ok(format!("http://{host}"));
            },
            AccessType::Other(name) => {
                return Err(BridgeError::Config(format!("AccessType {name} is not supported")));
            }
        }
    }
}

fn bridge_poll_interval_default() -> u64 { return 2000 }
fn bridge_sign_of_life_default() -> u64 { return 5 }
fn bridge_http_timeout_default() -> u64 { return 5 }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct BridgeConfig {
    #[serde(default="bridge_poll_interval_default")]
    pub poll_interval_ms: u64,
    /* 0 disables the sign of life log */
    #[serde(default="bridge_sign_of_life_default")]
    pub sign_of_life_minutes: u64,
    #[serde(default="bridge_http_timeout_default")]
    pub http_timeout_secs: u64,
}

fn mqtt_enabled_default() -> bool { return true }
fn mqtt_host_default() -> String { return "localhost".to_string() }
fn mqtt_port_default() -> u16 { return 1883 }
fn mqtt_client_name_default() -> String { return "trydan2mqtt".to_string() }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct MqttConfig {
    #[serde(default="mqtt_enabled_default")]
    pub enabled: bool,
    #[serde(default="mqtt_host_default")]
    pub host: String,
    #[serde(default="mqtt_port_default")]
    pub port: u16,
    #[serde(default)]
    pub portal_id: String,
    #[serde(default="mqtt_client_name_default")]
    pub client_name: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
}

fn bridge_default() -> BridgeConfig {
    return BridgeConfig {
        poll_interval_ms: bridge_poll_interval_default(),
        sign_of_life_minutes: bridge_sign_of_life_default(),
        http_timeout_secs: bridge_http_timeout_default(),
    }
}

fn mqtt_default() -> MqttConfig {
    return MqttConfig {
        enabled: false,
        host: mqtt_host_default(),
        port: mqtt_port_default(),
        portal_id: "".to_string(),
        client_name: mqtt_client_name_default(),
        user: "".to_string(),
        pass: "".to_string(),
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    pub device: DeviceConfig,
    #[serde(default="bridge_default")]
    pub bridge: BridgeConfig,
    #[serde(default="mqtt_default")]
    pub mqtt: MqttConfig,
}

impl Config {
    pub fn from_yaml(contents: &str) -> Result<Self> {
        return serde_yml::from_str(contents)
            .map_err(|e| BridgeError::Config(format!("Unable to parse config: {e}")));
    }

    /// Service name the charger is announced under on the device bus
    pub fn service_name(&self) -> String {
        return format!("com.victronenergy.evcharger.http_{:02}", self.device.instance);
    }
}

/// Source of the static settings. Callers ask again for every operation,
/// so edits to the backing store apply without a restart.
pub trait ConfigProvider: Send + Sync {
    fn get(&self) -> Result<Config>;
}

/// Reads the YAML file on every call
pub struct FileConfig {
    path: PathBuf,
}

impl FileConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        return FileConfig { path: path.as_ref().to_path_buf() }
    }

    /// Look for `config/trydan.yaml` first, then `trydan.yaml`
    pub fn locate() -> Result<Self> {
        for candidate in ["config/trydan.yaml", "trydan.yaml"] {
            if Path::new(candidate).is_file() {
                debug!("Using config file {candidate}");
                return Ok(FileConfig::new(candidate));
            }
        }

        Err(BridgeError::Config("Unable to find the config on config/trydan.yaml or trydan.yaml".to_string()))
    }

    pub fn path(&self) -> &Path {
        return &self.path;
    }
}

impl ConfigProvider for FileConfig {
    fn get(&self) -> Result<Config> {
        let contents = fs::read_to_string(&self.path)
            .map_err(|e| BridgeError::Config(format!("Unable to read {}: {e}", self.path.display())))?;
        return Config::from_yaml(&contents);
    }
}

/// Fixed settings, handy when the config does not come from disk
pub struct StaticConfig {
    config: Config,
}

impl StaticConfig {
    pub fn new(config: Config) -> Self {
        return StaticConfig { config }
    }
}

impl ConfigProvider for StaticConfig {
    fn get(&self) -> Result<Config> {
        return Ok(self.config.clone());
    }
}

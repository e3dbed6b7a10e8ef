use thiserror::Error;

/// Everything that can go wrong between the charger and the bus.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// HTTP or network failure, including non-success status codes
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body is not usable structured data
    #[error("parse error: {0}")]
    Parse(String),

    /// Structurally valid data with the wrong shape
    #[error("schema error: {0}")]
    Schema(String),

    #[error("translation error on field {field}: {reason}")]
    Translation { field: String, reason: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("charger did not accept {parameter}={value}")]
    WriteRejected { parameter: String, value: String },
}

impl From<reqwest::Error> for BridgeError {
    fn from(e: reqwest::Error) -> Self {
        return BridgeError::Transport(e.to_string());
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        return BridgeError::Parse(e.to_string());
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

//! Bus writes to charger control commands
//!
//! | Point           | Parameter      | Value sent                        |
//! |-----------------|----------------|-----------------------------------|
//! | `/Intensity`    | `SC+`          | written value                     |
//! | `/StartStop`    | `F`            | `1`, or the written value with `follow_value` |
//! | `/MaxIntensity` | `MaxIntensity` | written value                     |
//!
//! Every other point is refused without talking to the charger, and so is any
//! value that is not a whole number.

use log::{error, info, warn};
use std::sync::Arc;
use crate::config::{ConfigProvider, StartStopPolicy};
use crate::error::BridgeError;
use crate::points::{paths, PointValue};
use crate::trydan::TrydanClient;

#[derive(Debug, Clone, PartialEq)]
pub struct ControlRequest {
    pub parameter: &'static str,
    pub value: String,
}

/// Whole, non-negative number of a written value. Anything else never
/// reaches the charger's query string.
fn whole_number(value: &PointValue) -> Option<i64> {
    let v = value.as_f64()?;
    if !v.is_finite() || v.fract() != 0.0 || !(0.0..=u32::MAX as f64).contains(&v) {
        return None;
    }
    return Some(v as i64);
}

/// Find the control command for a write
pub fn route(path: &str, value: &PointValue, policy: StartStopPolicy) -> std::result::Result<ControlRequest, WriteOutcome> {
    let parameter = match path {
        paths::INTENSITY => "SC+",
        paths::START_STOP => "F",
        paths::MAX_INTENSITY => "MaxIntensity",
        _ => return Err(WriteOutcome::Unrouted),
    };

    let number = whole_number(value).ok_or(WriteOutcome::InvalidValue)?;
    let value = match (parameter, policy) {
        ("F", StartStopPolicy::AlwaysStart) => 1,
        ("F", StartStopPolicy::FollowValue) => (number != 0) as i64,
        _ => number,
    };

    return Ok(ControlRequest { parameter, value: value.to_string() });
}

/// Value a point holds once the charger accepted a write to it. `/StartStop`
/// is left to the next refresh, it follows the charge state.
pub fn accepted_value(path: &str, value: &PointValue) -> Option<PointValue> {
    match path {
        paths::INTENSITY | paths::MAX_INTENSITY => whole_number(value).map(PointValue::Int),
        _ => None,
    }
}

/// Result of one bus write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Accepted,
    /// The charger answered without echoing the value
    Rejected,
    /// No usable answer from the charger
    TransportFailed,
    ConfigFailed,
    Unrouted,
    /// Not a whole number, nothing was sent
    InvalidValue,
}

impl WriteOutcome {
    pub fn is_accepted(&self) -> bool {
        return *self == WriteOutcome::Accepted;
    }

    /// Value shown on `/WriteFault`
    pub fn fault_code(&self) -> i64 {
        match self {
            WriteOutcome::Accepted => 0,
            WriteOutcome::Rejected => 1,
            WriteOutcome::TransportFailed => 2,
            WriteOutcome::ConfigFailed => 3,
            WriteOutcome::Unrouted => 4,
            WriteOutcome::InvalidValue => 5,
        }
    }
}

pub struct CommandDispatcher {
    client: TrydanClient,
    config: Arc<dyn ConfigProvider>,
}

impl CommandDispatcher {
    pub fn new(client: TrydanClient, config: Arc<dyn ConfigProvider>) -> Self {
        return CommandDispatcher { client, config };
    }

    /// Turn a write into a control call. Never fails: every problem is
    /// logged and reported through the outcome.
    pub async fn handle_write(&self, path: &str, value: &PointValue) -> WriteOutcome {
        info!("someone else updated {path} to {value}");

        let policy = match self.config.get() {
            Ok(c) => c.device.start_stop,
            Err(e) => {
                error!("Write to {path} dropped: {e}");
                return WriteOutcome::ConfigFailed;
            }
        };

        let request = match route(path, value, policy) {
            Ok(r) => r,
            Err(WriteOutcome::Unrouted) => {
                info!("mapping for evcharger path {path} does not exist");
                return WriteOutcome::Unrouted;
            },
            Err(outcome) => {
                warn!("Write of {value:?} to {path} is not a whole number, not sent");
                return outcome;
            }
        };

        match self.client.control(request.parameter, &request.value).await {
            Ok(()) => {
                info!("Charger accepted {}{} for {path}", request.parameter, request.value);
                WriteOutcome::Accepted
            },
            Err(BridgeError::WriteRejected { .. }) => WriteOutcome::Rejected,
            Err(BridgeError::Config(e)) => {
                error!("Write to {path} failed: {e}");
                WriteOutcome::ConfigFailed
            },
            Err(e) => {
                error!("Write to {path} failed: {e}");
                WriteOutcome::TransportFailed
            }
        }
    }
}

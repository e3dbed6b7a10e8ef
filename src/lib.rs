//! V2C Trydan charger bridge for the Venus OS device bus
//!
//! Polls the charger's HTTP API, publishes its state as bus points and turns
//! bus writes back into charger control commands.

pub mod bridge;
pub mod command;
pub mod config;
pub mod error;
#[cfg(feature = "mqtt")]
pub mod mqtt;
pub mod points;
pub mod translate;
pub mod trydan;

// Re-export common types for easier access
pub use bridge::ChargerBridge;
pub use command::{CommandDispatcher, WriteOutcome};
pub use config::{Config, ConfigProvider, FileConfig};
pub use error::{BridgeError, Result};
pub use points::{ExternalWrite, PointService, PointValue};
pub use trydan::{TelemetryDocument, TrydanClient};

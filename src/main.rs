use log::{error, info};
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use trydan2mqtt::{ChargerBridge, Config, ConfigProvider, ExternalWrite, FileConfig};

#[cfg(feature = "mqtt")]
fn attach_bus(bridge: ChargerBridge, config: &Config, writes: Sender<ExternalWrite>) -> trydan2mqtt::Result<ChargerBridge> {
    if !config.mqtt.enabled {
        info!("MQTT is disabled, points are only kept locally");
        return Ok(bridge);
    }

    let (mut mqtt, tx) = trydan2mqtt::mqtt::MqttBus::new(&config.mqtt, config.device.instance, writes)?;
    tokio::spawn(async move {
        mqtt.start_thread().await;
    });
    return Ok(bridge.with_publisher(tx));
}

#[cfg(not(feature = "mqtt"))]
fn attach_bus(bridge: ChargerBridge, _config: &Config, _writes: Sender<ExternalWrite>) -> trydan2mqtt::Result<ChargerBridge> {
    info!("Built without MQTT, points are only kept locally");
    return Ok(bridge);
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let default_filter = std::env::var("T2M_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    info!("Start");

    let provider = FileConfig::locate()?;
    info!("Reading config from {}", provider.path().display());
    let config = provider.get()?;
    let provider: Arc<dyn ConfigProvider> = Arc::new(provider);

    /* Writes coming from the bus end up in the same task as the polling */
    let (writes_tx, writes_rx) = tokio::sync::mpsc::channel(32);
    let bridge = attach_bus(ChargerBridge::new(provider)?, &config, writes_tx)?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for the shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
    };

    bridge.run(writes_rx, shutdown).await;
    info!("Exiting");
    Ok(())
}

//! Device bus transport over the Venus OS MQTT broker

pub mod topics;

use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc::{Receiver, Sender};
use crate::config::MqttConfig;
use crate::error::{BridgeError, Result};
use crate::points::{ExternalWrite, PointChange};
use topics::{value_payload, Topics};

pub struct MqttBus {
    rx: Receiver<Vec<PointChange>>,
    client: AsyncClient,
    topics: Topics,
    exit_thread: bool,
}

impl MqttBus {
    /// Connect to the broker. Writes from other clients are forwarded to
    /// `writes`; changed points are taken from the returned sender.
    pub fn new(config: &MqttConfig, instance: u32, writes: Sender<ExternalWrite>) -> Result<(Self, Sender<Vec<PointChange>>)> {
        if config.portal_id.is_empty() {
            return Err(BridgeError::Config("mqtt.portal_id is required when mqtt is enabled".to_string()));
        }

        let (mtx, mrx) = tokio::sync::mpsc::channel(32);
        let topics = Topics::new(&config.portal_id, instance);

        info!("MQTT connection to {}:{} starting up", config.host, config.port);
        let mut mqttoptions = MqttOptions::new(config.client_name.clone(), config.host.clone(), config.port);
        mqttoptions.set_keep_alive(Duration::from_secs(5));
        if !config.user.is_empty() {
            mqttoptions.set_credentials(config.user.clone(), config.pass.clone());
        }

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, 10);

        let reconnect_c = client.clone();
        let loop_topics = topics.clone();
        tokio::spawn(async move {
            info!("MQTT Eventloop started");
            let mut last_error = String::new();
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(p))) => {
                        match loop_topics.parse_write(&p.topic, &p.payload) {
                            Some(write) => {
                                debug!("Received write {} -> {}", write.path, write.value);
                                if writes.send(write).await.is_err() {
                                    info!("Nobody is taking writes anymore, stopping the event loop");
                                    return;
                                }
                            },
                            None => { debug!("Ignoring message on {}", p.topic); }
                        }
                    },
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected, subscribing to {}", loop_topics.write_filter());
                        if let Err(e) = reconnect_c.subscribe(loop_topics.write_filter(), QoS::AtLeastOnce).await {
                            warn!("Unable to subscribe to {}, bus writes will not arrive: {e}", loop_topics.write_filter());
                        }
                    },
                    Ok(_) => {},
                    Err(e) => {
                        /* Only log an error once until it changes */
                        if e.to_string() != last_error {
                            error!("Error in MQTT {:?}, reconnecting", e);
                            last_error = e.to_string();
                        }
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        return Ok((MqttBus {
            rx: mrx,
            client,
            topics,
            exit_thread: false,
        }, mtx));
    }

    /// Publish changed points until the bridge goes away
    pub async fn start_thread(&mut self) {
        while !self.exit_thread {
            let changes = match self.rx.recv().await {
                Some(c) => c,
                None => {
                    debug!("Reading returned none, we exit now");
                    self.exit_thread = true;
                    continue;
                }
            };

            for change in changes {
                let topic = self.topics.notify(&change.path);
                debug!("{} = {}", change.path, change.text);
                if let Err(e) = self.client.publish(topic, QoS::AtLeastOnce, true, value_payload(&change)).await {
                    warn!("Error publishing {}: {}", change.path, e);
                }
            }
        }

        info!("MQTT publishing stopped");
    }
}

//! Broker transport. A thin wrapper over the rumqttc async client: the
//! background event loop owns reconnection and drives the broker-linked
//! flag; publishes are QoS 0, matching the legacy uplink.

use std::time::Duration;

use async_trait::async_trait;
use probenode_foundation::{AppError, ConnectivityState};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::uplink::BatchPublisher;

pub struct MqttUplink {
    client: AsyncClient,
    topic: String,
    event_loop: JoinHandle<()>,
}

impl MqttUplink {
    /// Build the client and spawn its event loop. The loop keeps polling
    /// (rumqttc reconnects on its own); link state is reported through
    /// `connectivity`.
    pub fn connect(cfg: &Config, connectivity: ConnectivityState) -> Self {
        let mut options = MqttOptions::new(&cfg.device_id, &cfg.broker.host, cfg.broker.port);
        options.set_keep_alive(Duration::from_secs(120));

        tracing::info!(
            host = %cfg.broker.host,
            port = cfg.broker.port,
            "Connecting to MQTT broker"
        );
        let (client, mut event_loop) = AsyncClient::new(options, 10);

        let event_loop = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        tracing::info!("Broker connected");
                        connectivity.set_broker(true);
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        tracing::warn!("Broker disconnected");
                        connectivity.set_broker(false);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Broker connection error: {e}");
                        connectivity.set_broker(false);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Self {
            client,
            topic: cfg.topic(),
            event_loop,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn shutdown(&self) {
        let _ = self.client.disconnect().await;
        self.event_loop.abort();
    }
}

#[async_trait]
impl BatchPublisher for MqttUplink {
    async fn publish(&self, payload: String) -> Result<(), AppError> {
        self.client
            .publish(&self.topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(|e| AppError::Uplink(format!("publish to {} failed: {e}", self.topic)))
    }
}

//! MQTT transport wiring.
//!
//! Wraps a rumqttc async client and its event loop: connects with the
//! configured options, subscribes the router's topic filters whenever the
//! broker acknowledges a connection (so they come back after a
//! reconnect), and forwards every publish to the router. Poll errors get
//! a delay and the loop keeps going; the broker is expected to be flaky.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tracing::{error, info};

use crate::config::MqttConfig;
use crate::error::MqttError;
use crate::router::Router;

pub struct MqttHandler {
    client: AsyncClient,
    eventloop: EventLoop,
    router: Arc<Router>,
    qos: QoS,
    reconnect_delay: Duration,
}

impl MqttHandler {
    /// Creates a new MQTT handler with the given configuration
    pub fn new(
        config: &MqttConfig,
        reconnect_delay: Duration,
        router: Arc<Router>,
    ) -> Result<Self, MqttError> {
        let qos = parse_qos(config.qos)?;

        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_session(config.clean_session);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(options, 64);
        Ok(Self {
            client,
            eventloop,
            router,
            qos,
            reconnect_delay,
        })
    }

    /// Drive the event loop forever, dispatching inbound messages.
    pub async fn run(mut self) {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("connected to MQTT broker");
                    self.subscribe().await;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.router.handle_message(&publish.topic, &publish.payload);
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "MQTT connection error, retrying");
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    async fn subscribe(&self) {
        for filter in self.router.subscriptions() {
            match self.client.subscribe(filter.as_str(), self.qos).await {
                Ok(()) => info!(filter = %filter, "subscribed"),
                Err(e) => error!(filter = %filter, error = %e, "subscribe failed"),
            }
        }
    }
}

fn parse_qos(level: i32) -> Result<QoS, MqttError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(MqttError::ConfigError(format!(
            "invalid QoS level {other}, must be 0, 1, or 2"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_qos() {
        assert_eq!(parse_qos(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(parse_qos(1).unwrap(), QoS::AtLeastOnce);
        assert_eq!(parse_qos(2).unwrap(), QoS::ExactlyOnce);
        assert!(parse_qos(3).is_err());
        assert!(parse_qos(-1).is_err());
    }
}

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use tracing::{debug, info, warn};

use thermostat_common::{
    sensor_name_from_topic, NetworkConfig, SensorReadingPayload, ThermostatController,
    TOPIC_DAEMON_STATE, TOPIC_SENSOR_READING_FILTER,
};

pub const MAX_MQTT_PAYLOAD_BYTES: usize = 512;

pub fn connect(network: &NetworkConfig) -> (AsyncClient, EventLoop) {
    let mut mqtt_options = MqttOptions::new(
        "thermostat-daemon-rust",
        network.mqtt_host.clone(),
        network.mqtt_port,
    );
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    if !network.mqtt_user.is_empty() {
        mqtt_options.set_credentials(network.mqtt_user.clone(), network.mqtt_pass.clone());
    }

    AsyncClient::new(mqtt_options, 64)
}

/// Feeds sensor readings from the broker into the controller. Subscriptions
/// are renewed on every ConnAck since sessions are not persisted.
pub fn spawn_ingest_loop(
    controller: Arc<ThermostatController>,
    mqtt: AsyncClient,
    mut eventloop: EventLoop,
) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_sensor_message(&controller, &message.topic, &message.payload)
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    if let Err(err) = mqtt.try_subscribe(TOPIC_SENSOR_READING_FILTER, QoS::AtMostOnce)
                    {
                        warn!("mqtt subscribe failed: {err}");
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

pub fn spawn_state_publish_loop(
    controller: Arc<ThermostatController>,
    mqtt: AsyncClient,
    interval_ms: u64,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1_000)));
        loop {
            interval.tick().await;

            let payload = match serde_json::to_vec(&controller.snapshot()) {
                Ok(body) => body,
                Err(err) => {
                    warn!("daemon state serialization failed: {err}");
                    continue;
                }
            };

            if let Err(err) = mqtt
                .publish(TOPIC_DAEMON_STATE, QoS::AtLeastOnce, true, payload)
                .await
            {
                warn!("daemon state publish failed: {err}");
            }
        }
    });
}

/// Handles one `thermostat/sensor/{name}/reading` message. Readings the
/// controller rejects are logged there and otherwise ignored.
pub fn handle_sensor_message(
    controller: &ThermostatController,
    topic: &str,
    payload: &[u8],
) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }

    let Some(name) = sensor_name_from_topic(topic) else {
        debug!("ignoring message on unexpected topic {topic}");
        return Ok(());
    };

    let reading: SensorReadingPayload = serde_json::from_slice(payload)
        .with_context(|| format!("malformed reading from sensor '{name}'"))?;

    // Rejected readings are already logged by the controller.
    let _ = controller.report_reading(name, reading.temperature, reading.humidity);
    Ok(())
}

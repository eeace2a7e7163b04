use std::time::Duration;

use anyhow::Context;
use rumqttc::{AsyncClient, LastWill, MqttOptions, QoS};
use tracing::{info, warn};

use thermostat_common::{
    sensor_reading_topic, sensor_status_topic, SensorConfig, SensorKind, SensorReadingPayload,
};

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let sensor = sensor_config_from_env(|key| std::env::var(key).ok());
    let reading_topic = sensor_reading_topic(&sensor.name);
    let status_topic = sensor_status_topic(&sensor.name);

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(1883);

    let mut mqtt_options = MqttOptions::new(
        format!("thermostat-sensor-{}", sensor.name),
        mqtt_host,
        mqtt_port,
    );
    mqtt_options.set_last_will(LastWill::new(
        status_topic.clone(),
        "offline",
        QoS::AtLeastOnce,
        true,
    ));

    if let Ok(user) = std::env::var("MQTT_USER") {
        let pass = std::env::var("MQTT_PASS").unwrap_or_default();
        mqtt_options.set_credentials(user, pass);
    }

    let (mqtt, mut eventloop) = AsyncClient::new(mqtt_options, 32);

    mqtt.publish(status_topic.as_str(), QoS::AtLeastOnce, true, "online")
        .await
        .context("failed to publish sensor online status")?;

    tokio::spawn(async move {
        loop {
            if let Err(err) = eventloop.poll().await {
                warn!("sensor mqtt poll error: {err}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    });

    info!(
        sensor = sensor.name.as_str(),
        kind = ?sensor.kind,
        "sensor publisher started"
    );

    let mut tick: u64 = 0;
    let mut interval = tokio::time::interval(Duration::from_millis(sensor.interval_ms));

    loop {
        interval.tick().await;
        tick = tick.saturating_add(1);

        // Hardware integration point:
        // replace these simulated readings with the AHT20/DHT22/DS18B20 driver on the board.
        let reading = simulated_reading(sensor.kind, tick);
        let payload = serde_json::to_vec(&reading).context("failed to encode sensor reading")?;

        mqtt.publish(reading_topic.as_str(), QoS::AtLeastOnce, false, payload)
            .await
            .context("failed to publish sensor reading")?;
    }
}

fn sensor_config_from_env(lookup: impl Fn(&str) -> Option<String>) -> SensorConfig {
    let defaults = SensorConfig::default();

    let kind = match lookup("SENSOR_KIND") {
        Some(value) => SensorKind::parse(&value).unwrap_or_else(|| {
            warn!("unknown SENSOR_KIND '{value}', using {:?}", defaults.kind);
            defaults.kind
        }),
        None => defaults.kind,
    };

    SensorConfig {
        name: lookup("SENSOR_NAME")
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty() && !name.contains('/'))
            .unwrap_or(defaults.name),
        kind,
        interval_ms: lookup("SENSOR_INTERVAL_MS")
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|interval| *interval >= 1_000)
            .unwrap_or(defaults.interval_ms),
    }
}

fn simulated_reading(kind: SensorKind, tick: u64) -> SensorReadingPayload {
    let temperature = 68.0 + ((tick % 8) as f32 * 0.2);
    let humidity = kind
        .reports_humidity()
        .then(|| 42.0 + ((tick % 6) as f32 * 0.5));

    SensorReadingPayload {
        temperature,
        humidity,
    }
}

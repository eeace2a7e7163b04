pub const TOPIC_SENSOR_PREFIX: &str = "thermostat/sensor";
pub const TOPIC_SENSOR_READING_FILTER: &str = "thermostat/sensor/+/reading";

pub const TOPIC_DAEMON_STATE: &str = "thermostat/daemon/state";

pub fn sensor_reading_topic(name: &str) -> String {
    format!("{TOPIC_SENSOR_PREFIX}/{name}/reading")
}

pub fn sensor_status_topic(name: &str) -> String {
    format!("{TOPIC_SENSOR_PREFIX}/{name}/status")
}

/// Extracts the sensor name from a `thermostat/sensor/{name}/reading` topic.
pub fn sensor_name_from_topic(topic: &str) -> Option<&str> {
    let name = topic
        .strip_prefix(TOPIC_SENSOR_PREFIX)?
        .strip_prefix('/')?
        .strip_suffix("/reading")?;
    (!name.is_empty() && !name.contains('/')).then_some(name)
}

use serde::{Deserialize, Serialize};

/// How fresh readings from several sensors are folded into one temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Average,
    MostRecent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermostatConfig {
    pub sensor_stale_timeout_ms: u64,
    pub deadband: f32,
    pub min_target: f32,
    pub max_target: f32,
    pub default_target: f32,
    pub min_valid_temp: f32,
    pub max_valid_temp: f32,
    pub min_cycle_ms: u64,
    pub aggregation: Aggregation,
    pub control_interval_ms: u64,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            sensor_stale_timeout_ms: 60_000,
            deadband: 1.0,
            min_target: 50.0,
            max_target: 90.0,
            default_target: 72.0,
            min_valid_temp: -40.0,
            max_valid_temp: 150.0,
            min_cycle_ms: 0,
            aggregation: Aggregation::Average,
            control_interval_ms: 1_000,
        }
    }
}

impl ThermostatConfig {
    pub fn sanitize(&mut self) {
        let defaults = Self::default();

        if !self.deadband.is_finite() || self.deadband < 0.0 {
            self.deadband = defaults.deadband;
        }
        self.deadband = self.deadband.min(10.0);

        if !self.min_target.is_finite()
            || !self.max_target.is_finite()
            || self.min_target > self.max_target
        {
            self.min_target = defaults.min_target;
            self.max_target = defaults.max_target;
        }

        if !self.min_valid_temp.is_finite()
            || !self.max_valid_temp.is_finite()
            || self.min_valid_temp >= self.max_valid_temp
        {
            self.min_valid_temp = defaults.min_valid_temp;
            self.max_valid_temp = defaults.max_valid_temp;
        }

        if !self.default_target.is_finite() {
            self.default_target = defaults.default_target;
        }
        self.default_target = self.default_target.clamp(self.min_target, self.max_target);

        if self.sensor_stale_timeout_ms == 0 {
            self.sensor_stale_timeout_ms = defaults.sensor_stale_timeout_ms;
        }
        self.sensor_stale_timeout_ms = self.sensor_stale_timeout_ms.min(86_400_000);
        self.min_cycle_ms = self.min_cycle_ms.min(3_600_000);
        self.control_interval_ms = self.control_interval_ms.clamp(100, 60_000);
    }

    pub fn is_valid_target(&self, temp: f32) -> bool {
        temp.is_finite() && (self.min_target..=self.max_target).contains(&temp)
    }

    pub fn is_valid_temperature(&self, temp: f32) -> bool {
        temp.is_finite() && (self.min_valid_temp..=self.max_valid_temp).contains(&temp)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub http_bind: String,
    pub mqtt_enabled: bool,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub state_publish_interval_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            http_bind: "0.0.0.0:18080".to_string(),
            mqtt_enabled: true,
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            state_publish_interval_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Aht20,
    Dht22,
    Ds18b20,
}

impl SensorKind {
    pub fn reports_humidity(self) -> bool {
        !matches!(self, Self::Ds18b20)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "aht20" => Some(Self::Aht20),
            "dht22" => Some(Self::Dht22),
            "ds18b20" => Some(Self::Ds18b20),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub name: String,
    pub kind: SensorKind,
    pub interval_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            name: "living_room".to_string(),
            kind: SensorKind::Aht20,
            interval_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub thermostat: ThermostatConfig,
    pub network: NetworkConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sanitize_restores_inverted_target_bounds() {
        let mut config = ThermostatConfig {
            min_target: 80.0,
            max_target: 60.0,
            ..ThermostatConfig::default()
        };
        config.sanitize();

        assert_eq!(config.min_target, 50.0);
        assert_eq!(config.max_target, 90.0);
    }

    #[test]
    fn sanitize_clamps_default_target_into_bounds() {
        let mut config = ThermostatConfig {
            min_target: 60.0,
            max_target: 70.0,
            default_target: 75.0,
            ..ThermostatConfig::default()
        };
        config.sanitize();

        assert_eq!(config.default_target, 70.0);
    }

    #[test]
    fn sanitize_rejects_negative_deadband() {
        let mut config = ThermostatConfig {
            deadband: -2.0,
            ..ThermostatConfig::default()
        };
        config.sanitize();

        assert_eq!(config.deadband, 1.0);
    }

    #[test]
    fn sanitize_caps_timing_windows() {
        let mut config = ThermostatConfig {
            min_cycle_ms: u64::MAX,
            sensor_stale_timeout_ms: u64::MAX,
            ..ThermostatConfig::default()
        };
        config.sanitize();

        assert_eq!(config.min_cycle_ms, 3_600_000);
        assert_eq!(config.sensor_stale_timeout_ms, 86_400_000);
    }

    #[test]
    fn target_validation_rejects_non_finite_and_out_of_range() {
        let config = ThermostatConfig::default();

        assert!(config.is_valid_target(72.0));
        assert!(!config.is_valid_target(f32::NAN));
        assert!(!config.is_valid_target(f32::INFINITY));
        assert!(!config.is_valid_target(-1000.0));
    }

    #[test]
    fn partial_runtime_config_fills_defaults() {
        let raw = r#"{ "thermostat": { "deadband": 0.5 }, "network": { "mqtt_enabled": false } }"#;
        let config: RuntimeConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.thermostat.deadband, 0.5);
        assert_eq!(config.thermostat.sensor_stale_timeout_ms, 60_000);
        assert!(!config.network.mqtt_enabled);
        assert_eq!(config.network.http_bind, "0.0.0.0:18080");
    }

    #[test]
    fn ds18b20_has_no_humidity_channel() {
        assert!(SensorKind::Aht20.reports_humidity());
        assert!(SensorKind::Dht22.reports_humidity());
        assert!(!SensorKind::Ds18b20.reports_humidity());
        assert_eq!(SensorKind::parse("DHT22"), Some(SensorKind::Dht22));
        assert_eq!(SensorKind::parse("bme280"), None);
    }
}

//! Sensor reading store.
//!
//! Plain data holder for the latest reading per sensor plus the aggregate
//! thermostat state. It has no synchronization of its own; the
//! [`ThermostatController`](crate::controller::ThermostatController) owns it
//! behind a single lock.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    clock::Timestamp,
    config::ThermostatConfig,
    error::{ControllerError, Result},
    policy::Evaluation,
    types::{Pin, PinStatus, SensorStatus},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermostatState {
    target: f32,
    pins: PinStatus,
    usable: PinStatus,
    sensors: BTreeMap<String, SensorStatus>,
    degraded: bool,
    effective_temperature: Option<f32>,
    last_transition_ms: Option<u64>,
}

impl ThermostatState {
    /// Fresh state: default target, every actuator off but usable, no
    /// sensors and therefore degraded until the first reading arrives.
    pub fn new(config: &ThermostatConfig) -> Self {
        Self {
            target: config.default_target,
            pins: PinStatus::ALL_OFF,
            usable: PinStatus::ALL_ENABLED,
            sensors: BTreeMap::new(),
            degraded: true,
            effective_temperature: None,
            last_transition_ms: None,
        }
    }

    pub fn upsert_sensor(
        &mut self,
        name: &str,
        temperature: f32,
        humidity: Option<f32>,
        at: Timestamp,
        config: &ThermostatConfig,
    ) -> Result<()> {
        let name = normalize_name(name);
        if name.is_empty() {
            return Err(invalid_reading(name, "sensor name is empty"));
        }
        if !config.is_valid_temperature(temperature) {
            return Err(invalid_reading(
                name,
                format!(
                    "temperature {temperature} outside {}..={}",
                    config.min_valid_temp, config.max_valid_temp
                ),
            ));
        }
        if let Some(humidity) = humidity {
            if !humidity.is_finite() || !(0.0..=100.0).contains(&humidity) {
                return Err(invalid_reading(
                    name,
                    format!("humidity {humidity} outside 0..=100"),
                ));
            }
        }

        self.sensors.insert(
            name.to_string(),
            SensorStatus {
                name: name.to_string(),
                temperature,
                humidity,
                last_update_ms: at.wall_ms,
                received_ms: at.monotonic_ms,
            },
        );
        Ok(())
    }

    pub fn sensor(&self, name: &str) -> Result<&SensorStatus> {
        let name = normalize_name(name);
        self.sensors
            .get(name)
            .ok_or_else(|| ControllerError::NotFound(name.to_string()))
    }

    /// Sensors ordered by name.
    pub fn sensors(&self) -> impl Iterator<Item = &SensorStatus> {
        self.sensors.values()
    }

    pub fn list_sensors(&self) -> Vec<SensorStatus> {
        self.sensors.values().cloned().collect()
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    pub fn pin_status(&self) -> PinStatus {
        self.pins
    }

    pub fn set_pin_status(&mut self, pins: PinStatus) {
        self.pins = pins;
    }

    pub fn usable(&self) -> PinStatus {
        self.usable
    }

    pub fn set_usable(&mut self, usable: PinStatus) {
        self.usable = usable;
    }

    pub fn set_pin_usable(&mut self, pin: Pin, enabled: bool) {
        self.usable.set(pin, enabled);
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn effective_temperature(&self) -> Option<f32> {
        self.effective_temperature
    }

    pub fn last_transition_ms(&self) -> Option<u64> {
        self.last_transition_ms
    }

    /// Applies the outcome of a policy evaluation.
    pub fn commit(&mut self, evaluation: &Evaluation, now_ms: u64) {
        if evaluation.pins != self.pins {
            self.last_transition_ms = Some(now_ms);
        }
        self.pins = evaluation.pins;
        self.degraded = evaluation.degraded;
        self.effective_temperature = evaluation.effective_temperature;
    }

    /// Drops any restored pin combination that violates mutual exclusion.
    pub(crate) fn enforce_exclusive_pins(&mut self) {
        if self.pins.heating && self.pins.cooling {
            self.pins = PinStatus::ALL_OFF;
        }
    }
}

/// Sensor names are stored and looked up without surrounding whitespace.
fn normalize_name(name: &str) -> &str {
    name.trim()
}

fn invalid_reading(name: &str, reason: impl Into<String>) -> ControllerError {
    ControllerError::InvalidReading {
        name: name.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at(ms: u64) -> Timestamp {
        Timestamp::new(ms, 1_700_000_000_000 + ms as i64)
    }

    fn state() -> (ThermostatState, ThermostatConfig) {
        let config = ThermostatConfig::default();
        (ThermostatState::new(&config), config)
    }

    #[test]
    fn starts_with_default_target_and_everything_off() {
        let (state, config) = state();

        assert_eq!(state.target(), config.default_target);
        assert_eq!(state.pin_status(), PinStatus::ALL_OFF);
        assert_eq!(state.usable(), PinStatus::ALL_ENABLED);
        assert!(state.is_degraded());
        assert_eq!(state.sensor_count(), 0);
    }

    #[test]
    fn upsert_replaces_existing_entry() {
        let (mut state, config) = state();

        state
            .upsert_sensor("kitchen", 70.0, Some(30.0), at(1_000), &config)
            .unwrap();
        state
            .upsert_sensor("kitchen", 75.0, Some(35.0), at(2_000), &config)
            .unwrap();

        assert_eq!(state.sensor_count(), 1);
        let kitchen = state.sensor("kitchen").unwrap();
        assert_eq!(kitchen.temperature, 75.0);
        assert_eq!(kitchen.humidity, Some(35.0));
        assert_eq!(kitchen.received_ms, 2_000);
        assert_eq!(kitchen.last_update_ms, at(2_000).wall_ms);
    }

    #[test]
    fn sensors_are_listed_by_name() {
        let (mut state, config) = state();
        for name in ["porch", "attic", "kitchen"] {
            state.upsert_sensor(name, 70.0, None, at(0), &config).unwrap();
        }

        let names: Vec<_> = state.sensors().map(|sensor| sensor.name.as_str()).collect();
        assert_eq!(names, vec!["attic", "kitchen", "porch"]);
    }

    #[test]
    fn rejects_empty_name() {
        let (mut state, config) = state();

        let err = state.upsert_sensor("  ", 70.0, None, at(0), &config).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidReading { .. }));
        assert_eq!(state.sensor_count(), 0);
    }

    #[test]
    fn rejects_out_of_range_temperature_without_touching_prior_entry() {
        let (mut state, config) = state();
        state
            .upsert_sensor("kitchen", 70.0, None, at(1_000), &config)
            .unwrap();

        for bad in [-500.0, 1_000.0, f32::NAN, f32::INFINITY] {
            let err = state
                .upsert_sensor("kitchen", bad, None, at(2_000), &config)
                .unwrap_err();
            assert!(matches!(err, ControllerError::InvalidReading { .. }));
        }

        let kitchen = state.sensor("kitchen").unwrap();
        assert_eq!(kitchen.temperature, 70.0);
        assert_eq!(kitchen.received_ms, 1_000);
    }

    #[test]
    fn rejects_impossible_humidity() {
        let (mut state, config) = state();

        let err = state
            .upsert_sensor("bath", 70.0, Some(140.0), at(0), &config)
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidReading { .. }));
    }

    #[test]
    fn pin_status_and_usable_are_independent() {
        let (mut state, _) = state();
        let cooling = PinStatus {
            heating: false,
            cooling: true,
        };

        state.set_pin_status(cooling);
        state.set_pin_usable(Pin::Heating, false);

        assert_eq!(state.pin_status(), cooling);
        assert!(!state.usable().get(Pin::Heating));
        assert!(state.usable().get(Pin::Cooling));
    }

    #[test]
    fn lookup_ignores_surrounding_whitespace() {
        let (mut state, config) = state();
        state
            .upsert_sensor(" hall", 70.0, None, at(0), &config)
            .unwrap();

        assert_eq!(state.sensor(" hall").unwrap().name, "hall");
        assert_eq!(state.sensor("hall ").unwrap().name, "hall");
        assert_eq!(state.sensor_count(), 1);
    }

    #[test]
    fn unknown_sensor_is_not_found() {
        let (state, _) = state();

        assert_eq!(
            state.sensor("garage").unwrap_err(),
            ControllerError::NotFound("garage".to_string())
        );
    }

    #[test]
    fn commit_records_transition_time_only_on_change() {
        let (mut state, _) = state();
        let unchanged = Evaluation {
            pins: PinStatus::ALL_OFF,
            degraded: false,
            effective_temperature: Some(70.0),
        };
        state.commit(&unchanged, 100);
        assert_eq!(state.last_transition_ms(), None);

        let heating = Evaluation {
            pins: PinStatus {
                heating: true,
                cooling: false,
            },
            ..unchanged
        };
        state.commit(&heating, 200);
        assert_eq!(state.last_transition_ms(), Some(200));
        assert!(!state.is_degraded());
    }
}

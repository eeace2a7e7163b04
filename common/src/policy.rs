use crate::{
    config::{Aggregation, ThermostatConfig},
    store::ThermostatState,
    types::{PinStatus, SensorStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorAction {
    HeatingOn,
    HeatingOff,
    CoolingOn,
    CoolingOff,
}

/// Result of one pass of the control policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub pins: PinStatus,
    pub degraded: bool,
    pub effective_temperature: Option<f32>,
}

/// Folds every fresh reading into one temperature. `None` when no sensor
/// reported within the staleness window.
pub fn effective_temperature<'a>(
    sensors: impl Iterator<Item = &'a SensorStatus>,
    config: &ThermostatConfig,
    now_ms: u64,
) -> Option<f32> {
    let mut fresh =
        sensors.filter(|sensor| sensor.is_fresh(now_ms, config.sensor_stale_timeout_ms));

    match config.aggregation {
        Aggregation::Average => {
            let (sum, count) = fresh.fold((0.0_f32, 0_u32), |(sum, count), sensor| {
                (sum + sensor.temperature, count + 1)
            });
            (count > 0).then(|| sum / count as f32)
        }
        Aggregation::MostRecent => {
            let first = fresh.next()?;
            let newest = fresh.fold(first, |newest, sensor| {
                if sensor.received_ms > newest.received_ms {
                    sensor
                } else {
                    newest
                }
            });
            Some(newest.temperature)
        }
    }
}

pub fn evaluate(state: &ThermostatState, config: &ThermostatConfig, now_ms: u64) -> Evaluation {
    let Some(current) = effective_temperature(state.sensors(), config, now_ms) else {
        // Fail-safe: never guess a temperature.
        return Evaluation {
            pins: PinStatus::ALL_OFF,
            degraded: true,
            effective_temperature: None,
        };
    };

    let previous = state.pin_status();
    let mut next = hysteresis(previous, current, state.target(), config.deadband);

    if next != previous && !can_transition(state, config, now_ms) {
        next = previous;
    }

    let usable = state.usable();
    next.heating &= usable.heating;
    next.cooling &= usable.cooling;

    Evaluation {
        pins: exclusive(previous, next),
        degraded: false,
        effective_temperature: Some(current),
    }
}

/// Heating turns on below `target - deadband` and off above `target`;
/// cooling mirrors it around `target + deadband`.
fn hysteresis(previous: PinStatus, current: f32, target: f32, deadband: f32) -> PinStatus {
    let heating = if previous.heating {
        current <= target
    } else {
        current < target - deadband
    };
    let cooling = if previous.cooling {
        current >= target
    } else {
        current > target + deadband
    };

    PinStatus { heating, cooling }
}

fn can_transition(state: &ThermostatState, config: &ThermostatConfig, now_ms: u64) -> bool {
    if config.min_cycle_ms == 0 {
        return true;
    }
    state
        .last_transition_ms()
        .map(|last| now_ms.saturating_sub(last) >= config.min_cycle_ms)
        .unwrap_or(true)
}

/// The actuator that is activating wins; the one already running yields.
fn exclusive(previous: PinStatus, next: PinStatus) -> PinStatus {
    if !(next.heating && next.cooling) {
        return next;
    }
    match (previous.heating, previous.cooling) {
        (true, false) => PinStatus {
            heating: false,
            cooling: true,
        },
        (false, true) => PinStatus {
            heating: true,
            cooling: false,
        },
        _ => PinStatus::ALL_OFF,
    }
}

/// Relay commands needed to move from `previous` to `next`, offs first so
/// both relays are never closed at once.
pub fn transition_actions(previous: PinStatus, next: PinStatus) -> Vec<ActuatorAction> {
    let mut actions = Vec::new();

    if previous.heating && !next.heating {
        actions.push(ActuatorAction::HeatingOff);
    }
    if previous.cooling && !next.cooling {
        actions.push(ActuatorAction::CoolingOff);
    }
    if !previous.heating && next.heating {
        actions.push(ActuatorAction::HeatingOn);
    }
    if !previous.cooling && next.cooling {
        actions.push(ActuatorAction::CoolingOn);
    }

    actions
}

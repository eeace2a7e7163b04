use std::{
    fmt,
    sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use tracing::{debug, info, warn};

use crate::{
    clock::{monotonic_ms, Timestamp},
    config::ThermostatConfig,
    error::{ControllerError, Result},
    policy::{self, ActuatorAction},
    store::ThermostatState,
    types::{HvacState, Pin, PinStatus, SensorStatus, SensorView, ThermostatSnapshot},
};

static GLOBAL: OnceLock<Arc<ThermostatController>> = OnceLock::new();

/// Receives every committed pin change while the controller lock is still
/// held, so commits arrive in the order they happened. Implementations must
/// not block and must not call back into the controller.
pub trait PinObserver: Send + Sync + fmt::Debug {
    fn pins_committed(&self, pins: PinStatus);
}

/// Process-wide coordination point between sensor ingestion and HTTP
/// handlers.
///
/// Every read and write of [`ThermostatState`] goes through one lock. Writes
/// re-run the control policy before releasing it, so no reader ever sees a
/// reading without the actuator decision derived from it. The controller is
/// not `Clone`; use [`export_state`](Self::export_state) and
/// [`restore_state`](Self::restore_state) to move state between instances.
///
/// All `*_at` variants take monotonic milliseconds from
/// [`monotonic_ms`](crate::clock::monotonic_ms).
#[derive(Debug)]
pub struct ThermostatController {
    config: ThermostatConfig,
    state: RwLock<ThermostatState>,
    observer: OnceLock<Box<dyn PinObserver>>,
}

impl ThermostatController {
    pub fn new(mut config: ThermostatConfig) -> Self {
        config.sanitize();
        let state = ThermostatState::new(&config);
        Self {
            config,
            state: RwLock::new(state),
            observer: OnceLock::new(),
        }
    }

    /// Installs the process-wide controller with the given thresholds. The
    /// first caller wins; later calls get the existing instance.
    pub fn init_global(config: ThermostatConfig) -> Arc<Self> {
        let mut installed = false;
        let controller = GLOBAL.get_or_init(|| {
            installed = true;
            Arc::new(Self::new(config))
        });
        if !installed {
            warn!("thermostat controller already initialized; keeping existing configuration");
        }
        Arc::clone(controller)
    }

    /// The process-wide controller, created with default configuration if
    /// nothing was installed yet.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new(ThermostatConfig::default()))))
    }

    pub fn config(&self) -> &ThermostatConfig {
        &self.config
    }

    /// Attaches the relay side. The observer is told the current pins right
    /// away and then every change. Returns `false` if one was already set.
    pub fn set_pin_observer(&self, observer: Box<dyn PinObserver>) -> bool {
        let state = self.write();
        if self.observer.set(observer).is_err() {
            warn!("pin observer already installed; ignoring");
            return false;
        }
        if let Some(observer) = self.observer.get() {
            observer.pins_committed(state.pin_status());
        }
        true
    }

    pub fn report_reading(
        &self,
        name: &str,
        temperature: f32,
        humidity: Option<f32>,
    ) -> Result<Vec<ActuatorAction>> {
        self.report_reading_at(name, temperature, humidity, Timestamp::now())
    }

    pub fn report_reading_at(
        &self,
        name: &str,
        temperature: f32,
        humidity: Option<f32>,
        at: Timestamp,
    ) -> Result<Vec<ActuatorAction>> {
        let mut state = self.write();
        if let Err(err) = state.upsert_sensor(name, temperature, humidity, at, &self.config) {
            warn!(sensor = name, "dropping reading: {err}");
            return Err(err);
        }
        debug!(sensor = name, temperature, ?humidity, "sensor reading accepted");
        let previous = state.pin_status();
        Ok(self.evaluate_locked(&mut state, previous, at.monotonic_ms))
    }

    pub fn snapshot(&self) -> ThermostatSnapshot {
        self.snapshot_at(monotonic_ms())
    }

    /// Copies the whole state out under the read lock. `now_ms` is only used
    /// to flag individual sensors as stale.
    pub fn snapshot_at(&self, now_ms: u64) -> ThermostatSnapshot {
        let state = self.read();
        let stale_timeout_ms = self.config.sensor_stale_timeout_ms;

        ThermostatSnapshot {
            target: state.target(),
            pin_status: state.pin_status(),
            usable: state.usable(),
            sensors: state
                .sensors()
                .map(|sensor| SensorView {
                    status: sensor.clone(),
                    stale: !sensor.is_fresh(now_ms, stale_timeout_ms),
                })
                .collect(),
            degraded: state.is_degraded(),
            current_temperature: state.effective_temperature(),
            state: HvacState::from_pins(state.pin_status(), state.is_degraded()).as_str(),
        }
    }

    pub fn sensor(&self, name: &str) -> Result<SensorStatus> {
        self.read().sensor(name).cloned()
    }

    pub fn list_sensors(&self) -> Vec<SensorStatus> {
        self.read().list_sensors()
    }

    pub fn target(&self) -> f32 {
        self.read().target()
    }

    pub fn pin_status(&self) -> PinStatus {
        self.read().pin_status()
    }

    pub fn set_target_temperature(&self, target: f32) -> Result<Vec<ActuatorAction>> {
        self.set_target_temperature_at(target, monotonic_ms())
    }

    pub fn set_target_temperature_at(
        &self,
        target: f32,
        now_ms: u64,
    ) -> Result<Vec<ActuatorAction>> {
        if !self.config.is_valid_target(target) {
            return Err(ControllerError::InvalidTarget(target));
        }

        let mut state = self.write();
        state.set_target(target);
        info!(target_temperature = target, "target temperature updated");
        let previous = state.pin_status();
        Ok(self.evaluate_locked(&mut state, previous, now_ms))
    }

    /// `enabled = false` forces `pin` off and keeps automatic control from
    /// switching it on until it is enabled again.
    pub fn set_manual_override(&self, pin: Pin, enabled: bool) -> Vec<ActuatorAction> {
        self.set_manual_override_at(pin, enabled, monotonic_ms())
    }

    pub fn set_manual_override_at(
        &self,
        pin: Pin,
        enabled: bool,
        now_ms: u64,
    ) -> Vec<ActuatorAction> {
        let mut state = self.write();
        state.set_pin_usable(pin, enabled);
        info!(pin = pin.as_str(), enabled, "actuator usable flag updated");
        let previous = state.pin_status();
        self.evaluate_locked(&mut state, previous, now_ms)
    }

    pub fn set_usable(&self, usable: PinStatus) -> Vec<ActuatorAction> {
        self.set_usable_at(usable, monotonic_ms())
    }

    pub fn set_usable_at(&self, usable: PinStatus, now_ms: u64) -> Vec<ActuatorAction> {
        let mut state = self.write();
        state.set_usable(usable);
        info!(
            heating = usable.heating,
            cooling = usable.cooling,
            "actuator usable mask updated"
        );
        let previous = state.pin_status();
        self.evaluate_locked(&mut state, previous, now_ms)
    }

    /// Re-runs the control policy without new input, so sensor dropout is
    /// noticed even when nothing is being written.
    pub fn evaluate(&self) -> Vec<ActuatorAction> {
        self.evaluate_at(monotonic_ms())
    }

    pub fn evaluate_at(&self, now_ms: u64) -> Vec<ActuatorAction> {
        let mut state = self.write();
        let previous = state.pin_status();
        self.evaluate_locked(&mut state, previous, now_ms)
    }

    pub fn export_state(&self) -> ThermostatState {
        self.read().clone()
    }

    pub fn restore_state(&self, restored: ThermostatState) -> Result<Vec<ActuatorAction>> {
        self.restore_state_at(restored, monotonic_ms())
    }

    /// Replaces the state wholesale and re-evaluates it against this
    /// controller's configuration. Only this controller's lock is taken.
    /// Returned actions move the relays from the pins held before the
    /// restore.
    pub fn restore_state_at(
        &self,
        mut restored: ThermostatState,
        now_ms: u64,
    ) -> Result<Vec<ActuatorAction>> {
        let target = restored.target();
        if !target.is_finite() {
            return Err(ControllerError::InvalidTarget(target));
        }
        restored.set_target(target.clamp(self.config.min_target, self.config.max_target));
        restored.enforce_exclusive_pins();

        let mut state = self.write();
        let previous = state.pin_status();
        *state = restored;
        Ok(self.evaluate_locked(&mut state, previous, now_ms))
    }

    /// `previous` is the pin state the relays were last told about.
    fn evaluate_locked(
        &self,
        state: &mut ThermostatState,
        previous: PinStatus,
        now_ms: u64,
    ) -> Vec<ActuatorAction> {
        let was_degraded = state.is_degraded();

        let evaluation = policy::evaluate(state, &self.config, now_ms);
        state.commit(&evaluation, now_ms);

        match (was_degraded, evaluation.degraded) {
            (false, true) => warn!("no fresh sensor readings; actuators forced off"),
            (true, false) => info!(
                temperature = ?evaluation.effective_temperature,
                "fresh sensor data available; automatic control resumed"
            ),
            _ => {}
        }

        let actions = policy::transition_actions(previous, evaluation.pins);
        if !actions.is_empty() {
            for action in &actions {
                debug!(?action, "actuator transition");
            }
            if let Some(observer) = self.observer.get() {
                observer.pins_committed(evaluation.pins);
            }
        }
        actions
    }

    fn read(&self) -> RwLockReadGuard<'_, ThermostatState> {
        self.state.read().unwrap_or_else(|poisoned| {
            warn!("thermostat state lock poisoned; recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, ThermostatState> {
        self.state.write().unwrap_or_else(|poisoned| {
            warn!("thermostat state lock poisoned; recovering");
            PoisonError::into_inner(poisoned)
        })
    }
}

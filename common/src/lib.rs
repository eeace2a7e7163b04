pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod policy;
pub mod store;
pub mod topics;
pub mod types;

pub use config::{Aggregation, NetworkConfig, RuntimeConfig, SensorConfig, SensorKind, ThermostatConfig};
pub use clock::{monotonic_ms, wall_ms, Timestamp};
pub use controller::{PinObserver, ThermostatController};
pub use error::{ControllerError, Result};
pub use policy::{ActuatorAction, Evaluation};
pub use store::ThermostatState;
pub use topics::*;
pub use types::{
    HvacState, Pin, PinStatus, SensorReadingPayload, SensorStatus, SensorView, ThermostatSnapshot,
};

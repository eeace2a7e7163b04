use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pin {
    #[serde(alias = "furnace")]
    Heating,
    #[serde(alias = "ac", alias = "cooler")]
    Cooling,
}

impl Pin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heating => "heating",
            Self::Cooling => "cooling",
        }
    }
}

/// On/off state for the two relays. Also used as the usable mask, where
/// `true` means the actuator may run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinStatus {
    pub heating: bool,
    pub cooling: bool,
}

impl PinStatus {
    pub const ALL_OFF: Self = Self {
        heating: false,
        cooling: false,
    };

    pub const ALL_ENABLED: Self = Self {
        heating: true,
        cooling: true,
    };

    pub fn get(&self, pin: Pin) -> bool {
        match pin {
            Pin::Heating => self.heating,
            Pin::Cooling => self.cooling,
        }
    }

    pub fn set(&mut self, pin: Pin, enabled: bool) {
        match pin {
            Pin::Heating => self.heating = enabled,
            Pin::Cooling => self.cooling = enabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HvacState {
    Idle,
    Heating,
    Cooling,
    Degraded,
}

impl HvacState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Heating => "HEATING",
            Self::Cooling => "COOLING",
            Self::Degraded => "DEGRADED",
        }
    }

    pub fn from_pins(pins: PinStatus, degraded: bool) -> Self {
        if degraded {
            Self::Degraded
        } else if pins.heating {
            Self::Heating
        } else if pins.cooling {
            Self::Cooling
        } else {
            Self::Idle
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorStatus {
    pub name: String,
    pub temperature: f32,
    pub humidity: Option<f32>,
    /// Epoch milliseconds of the reading. Display only.
    #[serde(rename = "lastUpdate")]
    pub last_update_ms: i64,
    /// Monotonic milliseconds when the reading was accepted.
    #[serde(skip)]
    pub received_ms: u64,
}

impl SensorStatus {
    /// `None` when the reading claims to be newer than `now_ms`.
    pub fn age_ms(&self, now_ms: u64) -> Option<u64> {
        now_ms.checked_sub(self.received_ms)
    }

    /// A reading from the future is never fresh.
    pub fn is_fresh(&self, now_ms: u64, stale_timeout_ms: u64) -> bool {
        self.age_ms(now_ms).is_some_and(|age| age < stale_timeout_ms)
    }
}

/// Payload published by sensors on their reading topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReadingPayload {
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorView {
    #[serde(flatten)]
    pub status: SensorStatus,
    pub stale: bool,
}

/// Copy of the controller state handed out to readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThermostatSnapshot {
    pub target: f32,
    #[serde(rename = "pinStatus")]
    pub pin_status: PinStatus,
    pub usable: PinStatus,
    pub sensors: Vec<SensorView>,
    pub degraded: bool,
    #[serde(rename = "currentTemperature")]
    pub current_temperature: Option<f32>,
    pub state: &'static str,
}

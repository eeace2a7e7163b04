use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    /// Out-of-range or malformed sensor data. The reading is dropped.
    #[error("invalid reading from sensor '{name}': {reason}")]
    InvalidReading { name: String, reason: String },

    /// Target outside the configured bounds or not finite. The prior target is kept.
    #[error("invalid target temperature: {0}")]
    InvalidTarget(f32),

    #[error("sensor not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, ControllerError>;

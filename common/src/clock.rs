use std::{sync::OnceLock, time::Instant};

/// Milliseconds since the first call in this process. Never goes backwards,
/// so freshness and cycle timing survive wall-clock steps.
pub fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Wall-clock epoch milliseconds.
pub fn wall_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// When a reading arrived. The monotonic stamp drives every control
/// decision; the wall stamp is only reported back as `lastUpdate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub monotonic_ms: u64,
    pub wall_ms: i64,
}

impl Timestamp {
    pub fn new(monotonic_ms: u64, wall_ms: i64) -> Self {
        Self {
            monotonic_ms,
            wall_ms,
        }
    }

    pub fn now() -> Self {
        Self::new(monotonic_ms(), wall_ms())
    }
}

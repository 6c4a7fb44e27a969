pub mod codec;
pub mod config;
pub mod exporter;
pub mod logging;
pub mod sampler;
pub mod source;

use std::time::{SystemTime, UNIX_EPOCH};

/// Unix time in milliseconds.
pub type Time = u64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time: Time,
    pub value: f64,
}
impl Sample {
    pub fn now(value: f64) -> Self {
        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(Time::MAX));
        Self { time, value }
    }
}

//! Measurement data types shared between the sampler and the sinks.
//!
//! A tick produces one [`RawSample`] per configured channel, which never leaves
//! the sampler, and at most one [`PhysicalReading`], which is copied to every
//! registered sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ADC channel wired to the battery voltage divider (R1/R2).
pub const BATTERY_CHANNEL: u8 = 0;

/// ADC channel wired to the current-sensor voltage divider (R3/R4).
pub const CURRENT_CHANNEL: u8 = 1;

/// One ADC conversion result.
///
/// # Fields
/// * `channel` - ADC input the code was read from
/// * `code` - Raw converter output, `0..full_scale_code`
/// * `captured_at` - Wall-clock time of the transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawSample {
    /// ADC input index
    pub channel: u8,
    /// Raw converter code
    pub code: u16,
    /// Capture time
    pub captured_at: DateTime<Utc>,
}

/// Smoothed battery state emitted once per successful tick.
///
/// `current` is `0.0` in single-channel deployments, which only wire up the
/// battery divider.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicalReading {
    /// Battery voltage in volts
    pub voltage: f64,
    /// Motor current in amps
    pub current: f64,
    /// Tick timestamp (UTC)
    pub timestamp: DateTime<Utc>,
}

impl PhysicalReading {
    /// Create a reading stamped with the current time.
    pub fn now(voltage: f64, current: f64) -> Self {
        Self {
            voltage,
            current,
            timestamp: Utc::now(),
        }
    }

    /// Timestamp as milliseconds since the UNIX epoch.
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reading_is_copied_not_moved() {
        let reading = PhysicalReading::now(12.6, 3.2);
        let copy = reading;
        assert_eq!(reading, copy);
    }

    #[test]
    fn timestamp_millis_keeps_millisecond_precision() {
        let timestamp = Utc
            .timestamp_millis_opt(1_700_000_000_123)
            .single()
            .expect("valid timestamp");
        let reading = PhysicalReading {
            voltage: 0.0,
            current: 0.0,
            timestamp,
        };
        assert_eq!(reading.timestamp_millis(), 1_700_000_000_123);
    }
}

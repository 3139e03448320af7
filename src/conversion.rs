//! Raw ADC code to physical quantity conversion.
//!
//! The battery voltage and the hall-effect current sensor output are both too
//! large for the converter input, so each passes through a resistive divider
//! before reaching the ADC:
//!
//! ```text
//! code --raw_to_voltage--> V(adc pin) --divider_scale--> V(source) [+ offset]
//! ```
//!
//! The current sensor outputs `reference_voltage` at zero current and moves
//! `SENSOR_SENSITIVITY_VOLTS` for every `AMPS_PER_SENSITIVITY_UNIT` amps.
//!
//! Every function here is total over `f64`: NaN and infinities propagate, a
//! zero denominator yields an infinity or NaN, nothing panics.

use crate::error::MonitorError;

/// Sensor output swing (volts) corresponding to [`AMPS_PER_SENSITIVITY_UNIT`].
pub const SENSOR_SENSITIVITY_VOLTS: f64 = 0.625;

/// Amps represented by one [`SENSOR_SENSITIVITY_VOLTS`] swing of the sensor.
pub const AMPS_PER_SENSITIVITY_UNIT: f64 = 50.0;

/// Full-scale code of a 12-bit converter such as the MCP3204.
pub const FULL_SCALE_12_BIT: u32 = 4096;

/// Voltage at the ADC pin for `code`.
pub fn raw_to_voltage(code: f64, reference_voltage: f64, full_scale_code: f64) -> f64 {
    code / full_scale_code * reference_voltage
}

/// Voltage at the source node of a divider with `r1` on top and `r2` to ground.
pub fn divider_scale(measured_voltage: f64, r1: f64, r2: f64) -> f64 {
    measured_voltage * (r1 + r2) / r2
}

/// Current through a hall sensor whose output is `sensor_voltage`.
///
/// Positive when the sensor output is above its zero-current level.
pub fn current_from_sensor_voltage(
    sensor_voltage: f64,
    reference_voltage: f64,
    sensitivity_volts: f64,
) -> f64 {
    scaled_current(
        sensor_voltage,
        reference_voltage,
        sensitivity_volts,
        AMPS_PER_SENSITIVITY_UNIT,
    )
}

fn scaled_current(
    sensor_voltage: f64,
    reference_voltage: f64,
    sensitivity_volts: f64,
    amps_per_unit: f64,
) -> f64 {
    (sensor_voltage - reference_voltage) / sensitivity_volts * amps_per_unit
}

/// Per-deployment calibration constants.
///
/// Offsets are added after divider scaling. For the current channel this means
/// the sensor offset corrects the reconstructed sensor output, before the
/// zero-current reference is subtracted.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    /// Battery divider, upper resistor (ohms)
    pub r1: f64,
    /// Battery divider, lower resistor (ohms)
    pub r2: f64,
    /// Current-sensor divider, upper resistor (ohms)
    pub r3: f64,
    /// Current-sensor divider, lower resistor (ohms)
    pub r4: f64,
    /// ADC reference voltage, also the sensor's zero-current output
    pub reference_voltage: f64,
    /// Number of distinct ADC codes
    pub full_scale_code: u32,
    /// Added to the reconstructed battery voltage
    pub voltage_offset: f64,
    /// Added to the reconstructed sensor output voltage
    pub current_sensor_voltage_offset: f64,
    /// Sensor swing per `amps_per_sensitivity_unit`
    pub sensitivity_volts: f64,
    /// Amps represented by one `sensitivity_volts` swing
    pub amps_per_sensitivity_unit: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            r1: 100_000.0,
            r2: 22_000.0,
            r3: 10_000.0,
            r4: 3_600.0,
            reference_voltage: 2.5,
            full_scale_code: FULL_SCALE_12_BIT,
            voltage_offset: 0.0,
            current_sensor_voltage_offset: 0.0,
            sensitivity_volts: SENSOR_SENSITIVITY_VOLTS,
            amps_per_sensitivity_unit: AMPS_PER_SENSITIVITY_UNIT,
        }
    }
}

impl Calibration {
    /// Voltage at the ADC pin for `code`.
    pub fn pin_voltage(&self, code: u16) -> f64 {
        raw_to_voltage(
            f64::from(code),
            self.reference_voltage,
            f64::from(self.full_scale_code),
        )
    }

    /// Battery voltage for a code read from the battery channel.
    pub fn battery_voltage(&self, code: u16) -> f64 {
        divider_scale(self.pin_voltage(code), self.r1, self.r2) + self.voltage_offset
    }

    /// Reconstructed current-sensor output for a code read from the current channel.
    pub fn sensor_voltage(&self, code: u16) -> f64 {
        divider_scale(self.pin_voltage(code), self.r3, self.r4)
            + self.current_sensor_voltage_offset
    }

    /// Motor current for a code read from the current channel.
    pub fn motor_current(&self, code: u16) -> f64 {
        scaled_current(
            self.sensor_voltage(code),
            self.reference_voltage,
            self.sensitivity_volts,
            self.amps_per_sensitivity_unit,
        )
    }

    /// Whether `code` can be produced by the converter.
    pub fn accepts_code(&self, code: u16) -> bool {
        u32::from(code) < self.full_scale_code
    }

    /// Reject constants that would make every conversion meaningless.
    pub fn validate(&self) -> Result<(), MonitorError> {
        let resistors = [
            ("resistance1", self.r1),
            ("resistance2", self.r2),
            ("resistance3", self.r3),
            ("resistance4", self.r4),
        ];
        for (name, ohms) in resistors {
            if !ohms.is_finite() || ohms <= 0.0 {
                return Err(MonitorError::Configuration(format!(
                    "{name} must be a positive resistance, got {ohms}"
                )));
            }
        }

        if !self.reference_voltage.is_finite() || self.reference_voltage <= 0.0 {
            return Err(MonitorError::Configuration(format!(
                "reference_voltage must be positive, got {}",
                self.reference_voltage
            )));
        }

        if self.full_scale_code == 0 || self.full_scale_code > u32::from(u16::MAX) + 1 {
            return Err(MonitorError::Configuration(format!(
                "full_scale_code must be in 1..=65536, got {}",
                self.full_scale_code
            )));
        }

        if !self.sensitivity_volts.is_finite() || self.sensitivity_volts == 0.0 {
            return Err(MonitorError::Configuration(format!(
                "sensor_sensitivity_volts must be non-zero, got {}",
                self.sensitivity_volts
            )));
        }

        let offsets = [
            ("voltage_offset", self.voltage_offset),
            (
                "current_sensor_voltage_offset",
                self.current_sensor_voltage_offset,
            ),
            ("amps_per_sensitivity_unit", self.amps_per_sensitivity_unit),
        ];
        for (name, value) in offsets {
            if !value.is_finite() {
                return Err(MonitorError::Configuration(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }

        Ok(())
    }
}

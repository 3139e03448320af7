//! Configuration loading using Figment
//!
//! This module provides strongly-typed configuration for the monitor.
//! Configuration is layered from:
//! 1. Built-in defaults (every value has one)
//! 2. A TOML file (`batmon.toml` unless another path is given)
//! 3. Environment variables prefixed with `BATMON_`, using `__` between
//!    nesting levels
//!
//! # Example
//! ```no_run
//! use batmon::config::Settings;
//!
//! // BATMON_SENSOR__ROLLING_AVERAGE_SAMPLES=10 overrides the file value
//! let settings = Settings::load_from("batmon.toml")?;
//! settings.validate()?;
//! println!("Sampling every {} ms", settings.sensor.sample_interval_ms);
//! # Ok::<(), batmon::error::MonitorError>(())
//! ```

use crate::conversion::{
    Calibration, AMPS_PER_SENSITIVITY_UNIT, FULL_SCALE_12_BIT, SENSOR_SENSITIVITY_VOLTS,
};
use crate::error::MonitorError;
use crate::sinks::SinkKind;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "batmon.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "BATMON_";

/// Largest accepted `rolling_average_samples`.
pub const MAX_ROLLING_AVERAGE_SAMPLES: i64 = 100_000;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
    /// ADC wiring and calibration
    pub sensor: SensorSettings,
    /// Sinks receiving every reading, in invocation order
    pub sinks: Vec<SinkKind>,
    /// CSV sink settings
    pub csv: CsvSettings,
    /// InfluxDB sink settings
    pub influx: InfluxSettings,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, colored output for interactive use
    Pretty,
    /// Single-line output for service managers
    Compact,
    /// JSON lines for log aggregation
    Json,
}

/// ADC wiring, timing and calibration constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    /// Battery divider, upper resistor (ohms)
    pub resistance1: f64,
    /// Battery divider, lower resistor (ohms)
    pub resistance2: f64,
    /// Current-sensor divider, upper resistor (ohms)
    pub resistance3: f64,
    /// Current-sensor divider, lower resistor (ohms)
    pub resistance4: f64,
    /// ADC reference voltage (volts)
    pub reference_voltage: f64,
    /// Added to the battery voltage after divider scaling (volts)
    pub voltage_offset: f64,
    /// Added to the sensor output after divider scaling (volts)
    pub current_sensor_voltage_offset: f64,
    /// Number of distinct ADC codes (4096 for 12 bits)
    pub full_scale_code: u32,
    /// Sensor output swing per `amps_per_sensitivity_unit` (volts)
    pub sensor_sensitivity_volts: f64,
    /// Amps represented by one sensitivity swing
    pub amps_per_sensitivity_unit: f64,
    /// Rolling average length; zero or negative disables smoothing
    pub rolling_average_samples: i64,
    /// Tick period in milliseconds
    pub sample_interval_ms: u64,
    /// Number of wired channels: 1 (battery only) or 2 (battery and current)
    pub channels: u8,
    /// SPI clock frequency (Hz)
    pub clock_frequency_hz: u32,
    /// SPI bus number (`/dev/spidev<bus>.<cs>`)
    pub spi_bus: u8,
    /// SPI chip-select line
    pub spi_slave_select: u8,
}

/// CSV sink settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvSettings {
    /// File rows are appended to; created with a header if missing
    pub log_file: PathBuf,
}

/// InfluxDB (1.x write API) sink settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxSettings {
    /// Server base URL
    pub url: String,
    /// Target database
    pub database: String,
    /// Target retention policy
    pub retention_policy: String,
    /// Measurement name for every point
    pub measurement: String,
    /// Optional user name
    pub username: Option<String>,
    /// Optional password
    pub password: Option<String>,
    /// Points buffered before a write request; 1 writes every reading
    pub batch_size: usize,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            sensor: SensorSettings::default(),
            sinks: vec![SinkKind::Console],
            csv: CsvSettings::default(),
            influx: InfluxSettings::default(),
        }
    }
}

impl Default for SensorSettings {
    fn default() -> Self {
        let calibration = Calibration::default();
        Self {
            resistance1: calibration.r1,
            resistance2: calibration.r2,
            resistance3: calibration.r3,
            resistance4: calibration.r4,
            reference_voltage: calibration.reference_voltage,
            voltage_offset: 0.0,
            current_sensor_voltage_offset: 0.0,
            full_scale_code: FULL_SCALE_12_BIT,
            sensor_sensitivity_volts: SENSOR_SENSITIVITY_VOLTS,
            amps_per_sensitivity_unit: AMPS_PER_SENSITIVITY_UNIT,
            rolling_average_samples: 1,
            sample_interval_ms: 200,
            channels: 2,
            clock_frequency_hz: 500_000,
            spi_bus: 0,
            spi_slave_select: 0,
        }
    }
}

impl Default for CsvSettings {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("log.csv"),
        }
    }
}

impl Default for InfluxSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            database: "tests".to_string(),
            retention_policy: "autogen".to_string(),
            measurement: "battery_state".to_string(),
            username: None,
            password: None,
            batch_size: 1,
            timeout_ms: 2000,
        }
    }
}

impl SensorSettings {
    /// Calibration constants for the unit converter.
    pub fn calibration(&self) -> Calibration {
        Calibration {
            r1: self.resistance1,
            r2: self.resistance2,
            r3: self.resistance3,
            r4: self.resistance4,
            reference_voltage: self.reference_voltage,
            full_scale_code: self.full_scale_code,
            voltage_offset: self.voltage_offset,
            current_sensor_voltage_offset: self.current_sensor_voltage_offset,
            sensitivity_volts: self.sensor_sensitivity_volts,
            amps_per_sensitivity_unit: self.amps_per_sensitivity_unit,
        }
    }

    /// Tick period.
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    /// Rolling window capacity, never below one.
    pub fn window_capacity(&self) -> usize {
        usize::try_from(self.rolling_average_samples)
            .unwrap_or(1)
            .max(1)
    }
}

impl Settings {
    /// Load configuration from `batmon.toml` and environment variables
    pub fn load() -> Result<Self, MonitorError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, MonitorError> {
        let settings = Self::figment()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(settings)
    }

    /// Parse configuration from a TOML document layered over the defaults
    pub fn from_toml_str(toml: &str) -> Result<Self, MonitorError> {
        let settings = Self::figment().merge(Toml::string(toml)).extract()?;
        Ok(settings)
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), MonitorError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(MonitorError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        self.sensor.calibration().validate()?;

        if !(1..=2).contains(&self.sensor.channels) {
            return Err(MonitorError::Configuration(format!(
                "Invalid channels {}. Must be 1 or 2",
                self.sensor.channels
            )));
        }

        if self.sensor.rolling_average_samples > MAX_ROLLING_AVERAGE_SAMPLES {
            return Err(MonitorError::Configuration(format!(
                "rolling_average_samples {} exceeds the maximum of {}",
                self.sensor.rolling_average_samples, MAX_ROLLING_AVERAGE_SAMPLES
            )));
        }

        if self.sensor.sample_interval_ms == 0 {
            return Err(MonitorError::Configuration(
                "sample_interval_ms must be greater than zero".to_string(),
            ));
        }

        if self.sinks.contains(&SinkKind::Csv) && self.csv.log_file.as_os_str().is_empty() {
            return Err(MonitorError::Configuration(
                "csv.log_file must not be empty when the csv sink is enabled".to_string(),
            ));
        }

        if self.sinks.contains(&SinkKind::Influx) && self.influx.url.trim().is_empty() {
            return Err(MonitorError::Configuration(
                "influx.url must not be empty when the influx sink is enabled".to_string(),
            ));
        }

        if self.sinks.contains(&SinkKind::Influx) && self.influx.timeout_ms == 0 {
            return Err(MonitorError::Configuration(
                "influx.timeout_ms must be greater than zero when the influx sink is enabled"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

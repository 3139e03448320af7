//! # batmon
//!
//! Battery monitor for SPI-attached ADCs. A fixed-period sampler reads a
//! battery voltage divider (and optionally a Hall-effect current sensor
//! divider) from an MCP3204, converts the codes into volts and amps, smooths
//! them with a rolling average and hands every reading to an ordered list of
//! sinks.
//!
//! ## Crate Structure
//!
//! - **`config`**: layered configuration (defaults, TOML file, `BATMON_`
//!   environment) via `figment`. See `config::Settings`.
//! - **`conversion`**: pure code → voltage → physical-unit arithmetic and the
//!   `Calibration` constants.
//! - **`core`**: the `AdcBus` and `Sink` traits the sampler is written against.
//! - **`data`**: the rolling-average window.
//! - **`dispatch`**: ordered, failure-isolated fan-out of readings to sinks.
//! - **`error`**: the error taxonomy (`BusError`, `SinkError`, `MonitorError`).
//! - **`hardware`**: the MCP3204 driver (feature `hardware_spi`) and a mock ADC.
//! - **`logging`**: `tracing-subscriber` initialisation.
//! - **`measurement_types`**: raw samples and physical readings.
//! - **`sampler`**: the per-tick pipeline and the periodic sampling loop.
//! - **`sinks`**: console, CSV, InfluxDB and null sinks plus their registry.

pub mod config;
pub mod conversion;
pub mod core;
pub mod data;
pub mod dispatch;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod measurement_types;
pub mod sampler;
pub mod sinks;

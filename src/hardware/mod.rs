//! ADC hardware access.
//!
//! - [`mcp3204`] talks to a Microchip MCP3204 over the Raspberry Pi SPI
//!   controller (feature `hardware_spi`); its frame encoding and error
//!   classification are always compiled so they can be tested off-target.
//! - [`mock`] is a simulated converter for running without hardware and for
//!   scripting bus failures in tests.

pub mod mcp3204;
pub mod mock;

pub use crate::core::AdcBus;
#[cfg(feature = "hardware_spi")]
pub use mcp3204::Mcp3204;
pub use mock::{MockAdc, MockAdcHandle};

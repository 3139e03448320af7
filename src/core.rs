//! Core traits for the monitor.
//!
//! The sampler talks to exactly two kinds of collaborators: the converter it
//! reads codes from and the sinks it hands readings to.
use crate::error::{BusError, SinkError};
use crate::measurement_types::PhysicalReading;
use async_trait::async_trait;

/// Trait for an analog-to-digital converter reachable over a serial bus.
///
/// Calls are short blocking transfers made from the sampling task only; the
/// handle is never shared.
pub trait AdcBus: Send {
    /// Returns a short description of the device, used in logs.
    fn name(&self) -> String;

    /// Acquires the bus. Called once before the first tick.
    fn open(&mut self) -> Result<(), BusError>;

    /// Performs one single-ended conversion on `channel`.
    fn read_channel(&mut self, channel: u8) -> Result<u16, BusError>;

    /// Releases the bus. Must tolerate being called on a closed bus.
    fn close(&mut self) -> Result<(), BusError>;
}

/// Trait for a persistence or display target for readings.
#[async_trait]
pub trait Sink: Send {
    /// Returns the name of the sink, used in logs.
    fn name(&self) -> &str;

    /// Stores or displays one reading.
    async fn accept(&mut self, reading: PhysicalReading) -> Result<(), SinkError>;

    /// Flushes and closes whatever the sink holds (file, client, buffer).
    async fn release(&mut self) -> Result<(), SinkError>;
}

impl<B: AdcBus + ?Sized> AdcBus for Box<B> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn open(&mut self) -> Result<(), BusError> {
        (**self).open()
    }

    fn read_channel(&mut self, channel: u8) -> Result<u16, BusError> {
        (**self).read_channel(channel)
    }

    fn close(&mut self) -> Result<(), BusError> {
        (**self).close()
    }
}

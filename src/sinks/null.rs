//! Sink that discards every reading.
use crate::core::Sink;
use crate::error::SinkError;
use crate::measurement_types::PhysicalReading;
use async_trait::async_trait;

/// Accepts and drops readings. Useful for dry runs where only the sampler's
/// own log output is wanted.
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl Sink for NullSink {
    fn name(&self) -> &str {
        "null"
    }

    async fn accept(&mut self, _reading: PhysicalReading) -> Result<(), SinkError> {
        Ok(())
    }

    async fn release(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

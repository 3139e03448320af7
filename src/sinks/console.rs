//! Console sink: one human-readable line per reading.
use crate::core::Sink;
use crate::error::SinkError;
use crate::measurement_types::PhysicalReading;
use async_trait::async_trait;
use chrono::SecondsFormat;
use std::io::{self, Stdout, Write};

/// Prints readings to stdout, or to any writer for testing.
pub struct ConsoleSink<W: Write + Send = Stdout> {
    out: W,
}

impl ConsoleSink<Stdout> {
    /// Console sink writing to standard output.
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for ConsoleSink<Stdout> {
    fn default() -> Self {
        Self::stdout()
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    /// Console sink writing to `out`.
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Render a reading the way the console sink prints it.
pub fn format_reading(reading: &PhysicalReading) -> String {
    format!(
        "{}  {:>8.3} V  {:>9.3} A",
        reading
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        reading.voltage,
        reading.current
    )
}

#[async_trait]
impl<W: Write + Send> Sink for ConsoleSink<W> {
    fn name(&self) -> &str {
        "console"
    }

    async fn accept(&mut self, reading: PhysicalReading) -> Result<(), SinkError> {
        writeln!(self.out, "{}", format_reading(&reading))?;
        self.out.flush()?;
        Ok(())
    }

    async fn release(&mut self) -> Result<(), SinkError> {
        self.out.flush()?;
        Ok(())
    }
}

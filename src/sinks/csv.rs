//! CSV file sink.
//!
//! Rows are `Time,Voltage,Current` with the timestamp in RFC 3339. The file is
//! opened in append mode so restarts keep extending the same log; the header
//! row is only written when the file is created (or found empty).
use crate::core::Sink;
use crate::error::SinkError;
use crate::measurement_types::PhysicalReading;
use async_trait::async_trait;
use chrono::SecondsFormat;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::info;

/// Header row of a newly created log file.
pub const HEADER: [&str; 3] = ["Time", "Voltage", "Current"];

/// A writer appending readings to a CSV file.
pub struct CsvSink {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
}

impl CsvSink {
    /// Open (or create) `path` for appending.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();
        let new_file = std::fs::metadata(&path)
            .map(|meta| meta.len() == 0)
            .unwrap_or(true);

        if new_file {
            info!(path = %path.display(), "Data log file not found. Creating new one...");
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if new_file {
            writer.write_record(HEADER)?;
            writer.flush()?;
        }

        info!(path = %path.display(), "Using CSV file.");
        Ok(Self {
            path,
            writer: Some(writer),
        })
    }

    /// File being appended to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Sink for CsvSink {
    fn name(&self) -> &str {
        "csv"
    }

    async fn accept(&mut self, reading: PhysicalReading) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::Released)?;
        writer.write_record(&[
            reading
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Micros, true),
            reading.voltage.to_string(),
            reading.current.to_string(),
        ])?;
        // Flush per row so a power cut loses at most the reading in flight.
        writer.flush()?;
        Ok(())
    }

    async fn release(&mut self) -> Result<(), SinkError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            info!(path = %self.path.display(), "CSV sink closed.");
        }
        Ok(())
    }
}

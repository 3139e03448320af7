//! Reading sinks.
//!
//! Every sink implements the [`Sink`] trait and owns the resource it writes to.
//! Which sinks run is decided by configuration through the [`SinkRegistry`];
//! the dispatcher only ever sees `Box<dyn Sink>`.
//!
//! | Kind      | Writes to                         | Feature          |
//! |-----------|-----------------------------------|------------------|
//! | `console` | stdout, one line per reading      | always           |
//! | `csv`     | appended CSV file                 | `storage_csv`    |
//! | `influx`  | InfluxDB 1.x `/write` endpoint    | `storage_influx` |
//! | `null`    | nothing                           | always           |

pub mod console;
#[cfg(feature = "storage_csv")]
pub mod csv;
#[cfg(feature = "storage_influx")]
pub mod influx;
pub mod null;
pub mod registry;

pub use crate::core::Sink;
pub use console::ConsoleSink;
#[cfg(feature = "storage_csv")]
pub use self::csv::CsvSink;
#[cfg(feature = "storage_influx")]
pub use influx::InfluxSink;
pub use null::NullSink;
pub use registry::SinkRegistry;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sink variants selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Human-readable lines on stdout
    Console,
    /// CSV file
    Csv,
    /// InfluxDB time-series database
    Influx,
    /// Discards every reading
    Null,
}

impl SinkKind {
    /// Configuration name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::Csv => "csv",
            Self::Influx => "influx",
            Self::Null => "null",
        }
    }

    /// Cargo feature that compiles this kind in, if any.
    pub fn feature(self) -> Option<&'static str> {
        match self {
            Self::Csv => Some("storage_csv"),
            Self::Influx => Some("storage_influx"),
            Self::Console | Self::Null => None,
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

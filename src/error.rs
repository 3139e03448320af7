//! Custom error types for the monitor.
//!
//! This module defines the error taxonomy used across the crate. Using the
//! `thiserror` crate, each boundary gets its own error type so that the place
//! catching it can decide what to do with it:
//!
//! - **`BusError`**: raised by an [`AdcBus`](crate::hardware::AdcBus). The
//!   sampling loop classifies it with [`BusError::is_fatal`]: transient and
//!   decode failures abandon the current tick, a disconnected bus stops the loop.
//! - **`SinkError`**: raised by a [`Sink`](crate::sinks::Sink). The dispatcher
//!   logs it and moves on to the next sink; it never reaches the loop.
//! - **`WindowError`**: asking a rolling window for a mean before any sample
//!   was pushed.
//! - **`MonitorError`**: the application-level error. Only configuration
//!   problems and fatal bus failures surface here.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, MonitorError>;

/// Errors reported by the ADC bus collaborator.
#[derive(Error, Debug)]
pub enum BusError {
    /// A single transfer failed; the next tick may succeed.
    #[error("Transient bus error: {0}")]
    Transient(String),

    /// The bus is gone (device removed, permission revoked, never opened).
    #[error("Bus disconnected: {0}")]
    Disconnected(String),

    /// The converter answered with a frame or code that cannot be a sample.
    #[error("Invalid sample on channel {channel}: {message}")]
    Decode {
        /// Channel that was being read.
        channel: u8,
        /// What was wrong with the answer.
        message: String,
    },
}

impl BusError {
    /// Whether the sampling loop must stop after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }

    /// Build a decode error for `channel`.
    pub fn decode(channel: u8, message: impl Into<String>) -> Self {
        Self::Decode {
            channel,
            message: message.into(),
        }
    }
}

/// Errors reported by a single sink. Never propagated past the dispatcher.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Writing to the underlying file or stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A reading could not be serialized.
    #[error("Formatting error: {0}")]
    Format(String),

    /// The request never got a response (connect, timeout, bad URL).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("Write rejected by server (status {status}): {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, usually the server's reason.
        body: String,
    },

    /// `accept` was called after `release`.
    #[error("Sink has already been released")]
    Released,
}

#[cfg(feature = "storage_csv")]
impl From<csv::Error> for SinkError {
    fn from(err: csv::Error) -> Self {
        Self::Format(err.to_string())
    }
}

/// Errors from [`RollingWindow`](crate::data::rolling::RollingWindow).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowError {
    /// No sample has been pushed yet.
    #[error("Rolling window is empty")]
    Empty,
}

/// Application-level error.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The configuration could not be loaded or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// A configured value is out of range.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// The bus failed fatally.
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// A sink could not be constructed.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A backend was requested that this build does not include.
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl From<figment::Error> for MonitorError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_disconnect_is_fatal() {
        assert!(BusError::Disconnected("gone".into()).is_fatal());
        assert!(!BusError::Transient("glitch".into()).is_fatal());
        assert!(!BusError::decode(1, "null bit set").is_fatal());
    }

    #[test]
    fn decode_error_names_channel() {
        let err = BusError::decode(3, "code 5000 above full scale");
        assert_eq!(
            err.to_string(),
            "Invalid sample on channel 3: code 5000 above full scale"
        );
    }

    #[test]
    fn bus_error_converts_into_monitor_error() {
        let err: MonitorError = BusError::Disconnected("spidev0.0".into()).into();
        assert!(matches!(err, MonitorError::Bus(BusError::Disconnected(_))));
    }
}

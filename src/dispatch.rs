//! Ordered fan-out of readings to sinks.
//!
//! ```text
//! Sampler → SinkDispatcher → [Sink 1, Sink 2, ...]
//!                               ↓        ↓
//!                              CSV    InfluxDB
//! ```
//!
//! Sinks are invoked one after the other, in registration order, on the
//! sampling task. Each sink sees the same copied [`PhysicalReading`]; a sink
//! that fails is logged and skipped for that reading only, so one broken
//! persistence target never starves the others.

use crate::core::Sink;
use crate::measurement_types::PhysicalReading;
use tracing::{debug, error, info, warn};

/// Delivery counters for one registered sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkStats {
    /// Sink name as reported by [`Sink::name`]
    pub name: String,
    /// Readings accepted without error
    pub delivered: u64,
    /// Readings the sink failed to accept
    pub failed: u64,
}

/// Outcome of delivering one reading to every sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Sinks that accepted the reading
    pub delivered: usize,
    /// Sinks that returned an error
    pub failed: usize,
}

impl DispatchReport {
    /// True when no sink failed.
    pub fn all_delivered(&self) -> bool {
        self.failed == 0
    }
}

struct Entry {
    sink: Box<dyn Sink>,
    stats: SinkStats,
}

/// Owns the registered sinks and delivers readings to them.
#[derive(Default)]
pub struct SinkDispatcher {
    entries: Vec<Entry>,
}

impl SinkDispatcher {
    /// Dispatcher with no sinks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dispatcher from sinks already in invocation order.
    pub fn with_sinks(sinks: impl IntoIterator<Item = Box<dyn Sink>>) -> Self {
        let mut dispatcher = Self::new();
        for sink in sinks {
            dispatcher.register(sink);
        }
        dispatcher
    }

    /// Appends `sink`; it will be invoked after every sink registered before it.
    pub fn register(&mut self, sink: Box<dyn Sink>) {
        let name = sink.name().to_string();
        debug!(sink = %name, position = self.entries.len(), "Registered sink");
        self.entries.push(Entry {
            sink,
            stats: SinkStats {
                name,
                delivered: 0,
                failed: 0,
            },
        });
    }

    /// Hands `reading` to every sink in registration order.
    ///
    /// Errors are logged and counted; they never abort delivery to the
    /// remaining sinks and are never returned to the caller.
    pub async fn dispatch(&mut self, reading: PhysicalReading) -> DispatchReport {
        let mut report = DispatchReport::default();
        for entry in &mut self.entries {
            match entry.sink.accept(reading).await {
                Ok(()) => {
                    entry.stats.delivered += 1;
                    report.delivered += 1;
                }
                Err(e) => {
                    entry.stats.failed += 1;
                    report.failed += 1;
                    error!(sink = %entry.stats.name, error = %e, "Sink failed to accept reading");
                }
            }
        }
        report
    }

    /// Releases every sink in registration order and empties the dispatcher.
    ///
    /// A failing release is logged and the remaining sinks are still released.
    /// Returns the number of sinks whose release failed. Calling it again is a
    /// no-op.
    pub async fn shutdown(&mut self) -> usize {
        let mut failures = 0;
        for mut entry in self.entries.drain(..) {
            match entry.sink.release().await {
                Ok(()) => info!(
                    sink = %entry.stats.name,
                    delivered = entry.stats.delivered,
                    failed = entry.stats.failed,
                    "Sink released"
                ),
                Err(e) => {
                    failures += 1;
                    warn!(sink = %entry.stats.name, error = %e, "Sink failed to release");
                }
            }
        }
        failures
    }

    /// Number of registered sinks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no sink is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of the registered sinks in invocation order.
    pub fn sink_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.stats.name.as_str()).collect()
    }

    /// Delivery counters per sink, in invocation order.
    pub fn stats(&self) -> Vec<SinkStats> {
        self.entries.iter().map(|e| e.stats.clone()).collect()
    }
}

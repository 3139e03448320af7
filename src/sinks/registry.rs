//! Sink factory with automatic feature-based registration.
use crate::config::Settings;
use crate::core::Sink;
use crate::error::MonitorError;
use crate::sinks::{ConsoleSink, NullSink, SinkKind};
use std::collections::HashMap;

#[cfg(feature = "storage_csv")]
use crate::sinks::CsvSink;
#[cfg(feature = "storage_influx")]
use crate::sinks::InfluxSink;

type SinkFactory = Box<dyn Fn(&Settings) -> Result<Box<dyn Sink>, MonitorError> + Send + Sync>;

/// Registry for sink factories with automatic feature detection.
///
/// Console and null sinks are always available; CSV and InfluxDB depend on
/// the `storage_csv` and `storage_influx` features.
///
/// # Examples
///
/// ```
/// use batmon::config::Settings;
/// use batmon::sinks::{SinkKind, SinkRegistry};
///
/// let registry = SinkRegistry::new();
/// assert!(registry.is_available(SinkKind::Console));
///
/// let sink = registry.create(SinkKind::Null, &Settings::default())?;
/// assert_eq!(sink.name(), "null");
/// # Ok::<(), batmon::error::MonitorError>(())
/// ```
pub struct SinkRegistry {
    factories: HashMap<SinkKind, SinkFactory>,
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkRegistry {
    /// Creates a new registry and registers every sink compiled into the crate.
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };

        registry.register(SinkKind::Console, |_| Ok(Box::new(ConsoleSink::stdout())));
        registry.register(SinkKind::Null, |_| Ok(Box::new(NullSink)));

        #[cfg(feature = "storage_csv")]
        registry.register(SinkKind::Csv, |settings| {
            Ok(Box::new(CsvSink::open(&settings.csv.log_file)?))
        });

        #[cfg(feature = "storage_influx")]
        registry.register(SinkKind::Influx, |settings| {
            Ok(Box::new(InfluxSink::new(&settings.influx)?))
        });

        registry
    }

    /// Registers (or replaces) the factory for `kind`.
    pub fn register<F>(&mut self, kind: SinkKind, factory: F)
    where
        F: Fn(&Settings) -> Result<Box<dyn Sink>, MonitorError> + Send + Sync + 'static,
    {
        self.factories.insert(kind, Box::new(factory));
    }

    /// Creates one sink of `kind` from `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::FeatureNotEnabled`] if the kind was not compiled
    /// in, or the sink's own construction error (e.g. the CSV file cannot be
    /// opened).
    pub fn create(&self, kind: SinkKind, settings: &Settings) -> Result<Box<dyn Sink>, MonitorError> {
        let factory = self.factories.get(&kind).ok_or_else(|| {
            MonitorError::FeatureNotEnabled(kind.feature().unwrap_or(kind.as_str()).to_string())
        })?;
        factory(settings)
    }

    /// Creates every sink listed in `settings.sinks`, in order.
    pub fn create_configured(&self, settings: &Settings) -> Result<Vec<Box<dyn Sink>>, MonitorError> {
        settings
            .sinks
            .iter()
            .map(|kind| self.create(*kind, settings))
            .collect()
    }

    /// Returns the registered kinds, sorted by name.
    pub fn list_kinds(&self) -> Vec<SinkKind> {
        let mut kinds: Vec<SinkKind> = self.factories.keys().copied().collect();
        kinds.sort_by_key(|kind| kind.as_str());
        kinds
    }

    /// Whether `kind` has a registered factory in this build.
    pub fn is_available(&self, kind: SinkKind) -> bool {
        self.factories.contains_key(&kind)
    }
}

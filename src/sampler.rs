//! Periodic acquisition: read codes, convert, smooth, dispatch.
//!
//! [`Sampler`] performs one tick at a time and owns everything a tick
//! touches: the bus, the calibration, one rolling window per channel and the
//! sink dispatcher. [`SamplingLoop`] drives a sampler from a single tokio task
//! so ticks never overlap, and exposes its lifecycle through a watch channel.
//!
//! ```text
//! Idle --start--> Running --stop / fatal bus error--> Stopped
//! ```

use crate::config::SensorSettings;
use crate::conversion::Calibration;
use crate::core::AdcBus;
use crate::data::RollingWindow;
use crate::dispatch::SinkDispatcher;
use crate::error::{BusError, MonitorError};
use crate::measurement_types::{PhysicalReading, RawSample, BATTERY_CHANNEL, CURRENT_CHANNEL};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Lifecycle of a sampling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Created but not yet ticking.
    Idle,
    /// Ticking on every period.
    Running,
    /// Halted; the bus is closed and the sinks released.
    Stopped,
}

/// What a single tick produced.
#[derive(Debug)]
pub enum TickOutcome {
    /// A reading was built and handed to every sink.
    Emitted(PhysicalReading),
    /// The tick was dropped; windows and sinks are untouched.
    Abandoned(BusError),
    /// The bus is gone; no further ticks may run.
    Halted(BusError),
}

// =============================================================================
// Sampler - one tick at a time
// =============================================================================

/// Reads the configured channels and turns them into smoothed readings.
pub struct Sampler {
    bus: Box<dyn AdcBus>,
    calibration: Calibration,
    voltage_window: RollingWindow,
    current_window: Option<RollingWindow>,
    dispatcher: SinkDispatcher,
    emitted: u64,
    abandoned: u64,
}

impl Sampler {
    /// Create a sampler for `channels` wired inputs (1 = battery only,
    /// 2 = battery and current).
    pub fn new(
        bus: impl AdcBus + 'static,
        calibration: Calibration,
        channels: u8,
        window_capacity: usize,
        dispatcher: SinkDispatcher,
    ) -> Self {
        Self {
            bus: Box::new(bus),
            calibration,
            voltage_window: RollingWindow::new(window_capacity),
            current_window: (channels > 1).then(|| RollingWindow::new(window_capacity)),
            dispatcher,
            emitted: 0,
            abandoned: 0,
        }
    }

    /// Create a sampler wired as described by the `[sensor]` section.
    pub fn from_settings(
        bus: impl AdcBus + 'static,
        sensor: &SensorSettings,
        dispatcher: SinkDispatcher,
    ) -> Self {
        Self::new(
            bus,
            sensor.calibration(),
            sensor.channels,
            sensor.window_capacity(),
            dispatcher,
        )
    }

    /// Name of the underlying bus, for logs.
    pub fn bus_name(&self) -> String {
        self.bus.name()
    }

    /// Number of channels read on every tick.
    pub fn channels(&self) -> u8 {
        if self.current_window.is_some() {
            2
        } else {
            1
        }
    }

    /// Battery voltage smoothing window.
    pub fn voltage_window(&self) -> &RollingWindow {
        &self.voltage_window
    }

    /// Motor current smoothing window, absent for single-channel wiring.
    pub fn current_window(&self) -> Option<&RollingWindow> {
        self.current_window.as_ref()
    }

    /// Sinks fed by this sampler.
    pub fn dispatcher(&self) -> &SinkDispatcher {
        &self.dispatcher
    }

    /// Ticks that produced a reading.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Ticks dropped because of a transient or decode failure.
    pub fn abandoned(&self) -> u64 {
        self.abandoned
    }

    /// Open the bus ahead of the first tick.
    pub fn open(&mut self) -> Result<(), BusError> {
        self.bus.open()
    }

    /// Close the bus and release every sink.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.bus.close() {
            warn!(bus = %self.bus.name(), error = %e, "Failed to close bus");
        }
        let failures = self.dispatcher.shutdown().await;
        if failures > 0 {
            warn!(failures, "Some sinks failed to release");
        }
    }

    fn read(&mut self, channel: u8, captured_at: DateTime<Utc>) -> Result<RawSample, BusError> {
        let code = self.bus.read_channel(channel)?;
        if !self.calibration.accepts_code(code) {
            return Err(BusError::decode(
                channel,
                format!(
                    "code {code} outside converter range 0..{}",
                    self.calibration.full_scale_code
                ),
            ));
        }
        Ok(RawSample {
            channel,
            code,
            captured_at,
        })
    }

    /// Read every channel, then convert, smooth and dispatch.
    ///
    /// All channels are read before any window is touched, so an abandoned
    /// tick leaves no trace.
    pub async fn tick(&mut self) -> TickOutcome {
        let captured_at = Utc::now();

        let battery = match self.read(BATTERY_CHANNEL, captured_at) {
            Ok(sample) => sample,
            Err(e) => return self.fail(e),
        };
        let current = if self.current_window.is_some() {
            match self.read(CURRENT_CHANNEL, captured_at) {
                Ok(sample) => Some(sample),
                Err(e) => return self.fail(e),
            }
        } else {
            None
        };

        let voltage = self.calibration.battery_voltage(battery.code);
        self.voltage_window.push(voltage);
        // Just pushed to, so the mean cannot fail.
        let avg_voltage = self.voltage_window.mean().unwrap_or(voltage);

        let (amps, avg_amps) = match (current, self.current_window.as_mut()) {
            (Some(sample), Some(window)) => {
                let amps = self.calibration.motor_current(sample.code);
                window.push(amps);
                (amps, window.mean().unwrap_or(amps))
            }
            _ => (0.0, 0.0),
        };

        debug!(
            battery_code = battery.code,
            current_code = current.map(|s| s.code),
            battery_pin_v = self.calibration.pin_voltage(battery.code),
            current_pin_v = current.map(|s| self.calibration.pin_voltage(s.code)),
            voltage,
            current = amps,
            avg_voltage,
            avg_current = avg_amps,
            "Tick"
        );

        let reading = PhysicalReading {
            voltage: avg_voltage,
            current: avg_amps,
            timestamp: captured_at,
        };
        self.dispatcher.dispatch(reading).await;
        self.emitted += 1;
        TickOutcome::Emitted(reading)
    }

    fn fail(&mut self, error: BusError) -> TickOutcome {
        if error.is_fatal() {
            error!(bus = %self.bus.name(), error = %error, "Fatal bus error");
            TickOutcome::Halted(error)
        } else {
            self.abandoned += 1;
            warn!(bus = %self.bus.name(), error = %error, "Tick abandoned");
            TickOutcome::Abandoned(error)
        }
    }
}

// =============================================================================
// SamplingLoop - fixed-period driver
// =============================================================================

/// Handle to a running sampler task.
///
/// # Example
///
/// ```rust,no_run
/// use batmon::dispatch::SinkDispatcher;
/// use batmon::hardware::MockAdc;
/// use batmon::sampler::{Sampler, SamplingLoop};
/// use batmon::config::SensorSettings;
/// use std::time::Duration;
///
/// # async fn demo() -> Result<(), batmon::error::MonitorError> {
/// let sampler = Sampler::from_settings(
///     MockAdc::new(vec![2048, 1900]),
///     &SensorSettings::default(),
///     SinkDispatcher::new(),
/// );
/// let mut sampling = SamplingLoop::start(sampler, Duration::from_millis(200)).await?;
/// tokio::time::sleep(Duration::from_secs(1)).await;
/// sampling.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct SamplingLoop {
    state: watch::Receiver<LoopState>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SamplingLoop {
    /// Open the bus and start ticking every `period`.
    ///
    /// The first tick fires immediately. If the bus cannot be opened the loop
    /// never starts and the sampler's sinks are released.
    pub async fn start(mut sampler: Sampler, period: Duration) -> Result<Self, MonitorError> {
        if period.is_zero() {
            return Err(MonitorError::Configuration(
                "sampling period must be greater than zero".to_string(),
            ));
        }

        if let Err(e) = sampler.open() {
            error!(bus = %sampler.bus_name(), error = %e, "Failed to open bus");
            sampler.shutdown().await;
            return Err(e.into());
        }

        info!(
            bus = %sampler.bus_name(),
            channels = sampler.channels(),
            period_ms = period.as_millis() as u64,
            sinks = ?sampler.dispatcher().sink_names(),
            "Sampling started"
        );

        let (state_tx, state_rx) = watch::channel(LoopState::Idle);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        state_tx.send_replace(LoopState::Running);
        let task = tokio::spawn(run(sampler, period, state_tx, shutdown_rx));

        Ok(Self {
            state: state_rx,
            shutdown: shutdown_tx,
            task: Some(task),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Resolves once the loop has stopped, either through [`stop`](Self::stop)
    /// or after a fatal bus error.
    pub async fn stopped(&self) {
        let mut state = self.state.clone();
        // An error means the task is gone, which only happens after Stopped.
        let _ = state.wait_for(|s| *s == LoopState::Stopped).await;
    }

    /// Ask the task to stop after any in-flight tick, then wait until the bus
    /// is closed and the sinks are released. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        let _ = self.shutdown.send(true);
        if let Err(e) = task.await {
            error!(error = %e, "Sampling task failed");
        }
    }
}

async fn run(
    mut sampler: Sampler,
    period: Duration,
    state: watch::Sender<LoopState>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            // Also fires when the handle is dropped.
            _ = shutdown.changed() => {
                info!("Sampling stop requested");
                break;
            }
            _ = ticker.tick() => {
                if let TickOutcome::Halted(_) = sampler.tick().await {
                    break;
                }
            }
        }
    }

    sampler.shutdown().await;
    info!(
        emitted = sampler.emitted(),
        abandoned = sampler.abandoned(),
        "Sampling stopped"
    );
    state.send_replace(LoopState::Stopped);
}

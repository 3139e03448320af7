//! Mock ADC
//!
//! Provides a simulated converter for running the monitor without hardware.
//! The converter lives inside the sampling task once the loop starts, so all
//! state sits behind a shared handle ([`MockAdcHandle`]) that stays with the
//! caller: tests use it to change codes, queue bus failures and inspect how
//! the sampler drove the bus.

use crate::core::AdcBus;
use crate::error::BusError;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// =============================================================================
// MockAdc - Simulated converter
// =============================================================================

#[derive(Debug)]
struct MockState {
    codes: Vec<u16>,
    max_code: u16,
    noise: u16,
    failures: VecDeque<BusError>,
    open: bool,
    opens: u32,
    closes: u32,
    reads: u64,
}

/// Simulated ADC with fixed per-channel codes and optional noise.
///
/// # Example
///
/// ```rust
/// use batmon::hardware::{AdcBus, MockAdc};
///
/// let mut adc = MockAdc::new(vec![2048, 1900]);
/// adc.open()?;
/// assert_eq!(adc.read_channel(0)?, 2048);
/// # Ok::<(), batmon::error::BusError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MockAdc {
    state: Arc<Mutex<MockState>>,
}

/// Caller-side view of a [`MockAdc`] that has been moved into the sampler.
#[derive(Debug, Clone)]
pub struct MockAdcHandle {
    state: Arc<Mutex<MockState>>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockAdc {
    /// Create a 12-bit converter returning `codes[channel]` on each channel.
    pub fn new(codes: Vec<u16>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                codes,
                max_code: 4095,
                noise: 0,
                failures: VecDeque::new(),
                open: false,
                opens: 0,
                closes: 0,
                reads: 0,
            })),
        }
    }

    /// Add uniform noise of up to `amplitude` codes to every conversion.
    pub fn with_noise(self, amplitude: u16) -> Self {
        lock(&self.state).noise = amplitude;
        self
    }

    /// Largest code the simulated converter can produce.
    pub fn with_max_code(self, max_code: u16) -> Self {
        lock(&self.state).max_code = max_code;
        self
    }

    /// Shared handle for steering and inspecting this converter.
    pub fn handle(&self) -> MockAdcHandle {
        MockAdcHandle {
            state: self.state.clone(),
        }
    }
}

impl MockAdcHandle {
    /// Change the code returned on `channel`.
    pub fn set_code(&self, channel: u8, code: u16) {
        let mut state = lock(&self.state);
        let index = usize::from(channel);
        if state.codes.len() <= index {
            state.codes.resize(index + 1, 0);
        }
        state.codes[index] = code;
    }

    /// Make the next read fail with `error`. Queued failures are consumed in
    /// order, one per read.
    pub fn fail_next(&self, error: BusError) {
        lock(&self.state).failures.push_back(error);
    }

    /// Whether the bus is currently open.
    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    /// Number of `open` calls.
    pub fn open_count(&self) -> u32 {
        lock(&self.state).opens
    }

    /// `close` calls that closed an open bus.
    pub fn close_count(&self) -> u32 {
        lock(&self.state).closes
    }

    /// Number of read attempts, failed ones included.
    pub fn reads(&self) -> u64 {
        lock(&self.state).reads
    }
}

impl AdcBus for MockAdc {
    fn name(&self) -> String {
        "mock ADC".to_string()
    }

    fn open(&mut self) -> Result<(), BusError> {
        let mut state = lock(&self.state);
        state.open = true;
        state.opens += 1;
        Ok(())
    }

    fn read_channel(&mut self, channel: u8) -> Result<u16, BusError> {
        let mut state = lock(&self.state);
        state.reads += 1;

        if !state.open {
            return Err(BusError::Disconnected("mock ADC is not open".to_string()));
        }
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }

        let code = *state
            .codes
            .get(usize::from(channel))
            .ok_or_else(|| BusError::decode(channel, "channel not wired"))?;

        if state.noise == 0 {
            return Ok(code);
        }
        let noise = i32::from(state.noise);
        let jitter = rand::thread_rng().gen_range(-noise..=noise);
        let noisy = (i32::from(code) + jitter).clamp(0, i32::from(state.max_code));
        // Clamped into 0..=u16::MAX above.
        Ok(noisy as u16)
    }

    fn close(&mut self) -> Result<(), BusError> {
        let mut state = lock(&self.state);
        if state.open {
            state.open = false;
            state.closes += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_require_open_bus() {
        let mut adc = MockAdc::new(vec![100]);
        assert!(matches!(
            adc.read_channel(0),
            Err(BusError::Disconnected(_))
        ));
        adc.open().unwrap();
        assert_eq!(adc.read_channel(0).unwrap(), 100);
    }

    #[test]
    fn queued_failures_are_consumed_in_order() {
        let mut adc = MockAdc::new(vec![1, 2]);
        let handle = adc.handle();
        adc.open().unwrap();

        handle.fail_next(BusError::Transient("crc".into()));
        handle.fail_next(BusError::decode(1, "null bit"));

        assert!(matches!(adc.read_channel(0), Err(BusError::Transient(_))));
        assert!(matches!(adc.read_channel(1), Err(BusError::Decode { .. })));
        assert_eq!(adc.read_channel(1).unwrap(), 2);
        assert_eq!(handle.reads(), 3);
    }

    #[test]
    fn unwired_channel_is_a_decode_error() {
        let mut adc = MockAdc::new(vec![1]);
        adc.open().unwrap();
        assert!(matches!(
            adc.read_channel(3),
            Err(BusError::Decode { channel: 3, .. })
        ));
    }

    #[test]
    fn noise_stays_within_amplitude_and_range() {
        let mut adc = MockAdc::new(vec![2, 2000]).with_noise(5);
        adc.open().unwrap();
        for _ in 0..200 {
            let low = adc.read_channel(0).unwrap();
            assert!(low <= 7);
            let mid = adc.read_channel(1).unwrap();
            assert!((1995..=2005).contains(&mid));
        }
    }

    #[test]
    fn close_is_idempotent() {
        let mut adc = MockAdc::new(vec![]);
        let handle = adc.handle();
        adc.open().unwrap();
        adc.close().unwrap();
        adc.close().unwrap();
        assert!(!handle.is_open());
        assert_eq!(handle.open_count(), 1);
        assert_eq!(handle.close_count(), 1);
    }

    #[test]
    fn handle_updates_codes_after_move() {
        let adc = MockAdc::new(vec![0]);
        let handle = adc.handle();
        let mut moved = adc;
        moved.open().unwrap();
        handle.set_code(1, 1234);
        assert_eq!(moved.read_channel(1).unwrap(), 1234);
    }
}

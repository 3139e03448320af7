//! Integration tests for the periodic sampling loop.
//!
//! Time is paused so the interval advances deterministically.

use async_trait::async_trait;
use batmon::conversion::Calibration;
use batmon::core::Sink;
use batmon::dispatch::SinkDispatcher;
use batmon::error::{BusError, MonitorError, SinkError};
use batmon::hardware::{MockAdc, MockAdcHandle};
use batmon::measurement_types::PhysicalReading;
use batmon::sampler::{LoopState, Sampler, SamplingLoop};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const PERIOD: Duration = Duration::from_millis(100);

#[derive(Default)]
struct Recorded {
    readings: Vec<PhysicalReading>,
    released: u32,
}

/// Keeps every reading it accepts.
struct Recorder {
    shared: Arc<Mutex<Recorded>>,
}

#[async_trait]
impl Sink for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    async fn accept(&mut self, reading: PhysicalReading) -> Result<(), SinkError> {
        self.shared.lock().unwrap().readings.push(reading);
        Ok(())
    }

    async fn release(&mut self) -> Result<(), SinkError> {
        self.shared.lock().unwrap().released += 1;
        Ok(())
    }
}

fn setup(window: usize) -> (Sampler, MockAdcHandle, Arc<Mutex<Recorded>>) {
    let adc = MockAdc::new(vec![2048, 1900]);
    let handle = adc.handle();
    let shared = Arc::new(Mutex::new(Recorded::default()));
    let dispatcher = SinkDispatcher::with_sinks([Box::new(Recorder {
        shared: shared.clone(),
    }) as Box<dyn Sink>]);
    let sampler = Sampler::new(adc, Calibration::default(), 2, window, dispatcher);
    (sampler, handle, shared)
}

fn reading_count(shared: &Arc<Mutex<Recorded>>) -> usize {
    shared.lock().unwrap().readings.len()
}

#[tokio::test(start_paused = true)]
async fn test_loop_emits_one_reading_per_period() {
    let (sampler, handle, shared) = setup(1);
    let mut sampling = SamplingLoop::start(sampler, PERIOD).await.unwrap();
    assert_eq!(sampling.state(), LoopState::Running);
    assert!(handle.is_open());

    tokio::time::sleep(Duration::from_millis(350)).await;
    let count = reading_count(&shared);
    assert!((3..=4).contains(&count), "unexpected reading count {count}");

    sampling.stop().await;
    assert_eq!(sampling.state(), LoopState::Stopped);
    assert!(!handle.is_open());
    assert_eq!(shared.lock().unwrap().released, 1);

    let recorded = shared.lock().unwrap();
    let readings = &recorded.readings;
    assert!(readings.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test(start_paused = true)]
async fn test_fatal_bus_error_stops_loop() {
    let (sampler, handle, shared) = setup(1);
    handle.fail_next(BusError::Disconnected("spidev0.0 removed".into()));

    let sampling = SamplingLoop::start(sampler, PERIOD).await.unwrap();
    sampling.stopped().await;

    assert_eq!(sampling.state(), LoopState::Stopped);
    assert!(!handle.is_open());
    assert_eq!(shared.lock().unwrap().released, 1);
    assert_eq!(reading_count(&shared), 0);

    // No further ticks after the halt.
    let reads = handle.reads();
    tokio::time::sleep(PERIOD * 5).await;
    assert_eq!(handle.reads(), reads);
}

#[tokio::test(start_paused = true)]
async fn test_transient_error_skips_only_that_tick() {
    let (sampler, handle, shared) = setup(4);
    handle.fail_next(BusError::Transient("short transfer".into()));

    let mut sampling = SamplingLoop::start(sampler, PERIOD).await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(sampling.state(), LoopState::Running);
    let count = reading_count(&shared);
    assert!((1..=2).contains(&count), "unexpected reading count {count}");

    sampling.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let (sampler, handle, shared) = setup(1);
    let mut sampling = SamplingLoop::start(sampler, PERIOD).await.unwrap();

    sampling.stop().await;
    sampling.stop().await;
    sampling.stopped().await;

    assert_eq!(handle.close_count(), 1);
    assert_eq!(shared.lock().unwrap().released, 1);
}

#[tokio::test(start_paused = true)]
async fn test_rolling_average_across_ticks() {
    let (sampler, handle, shared) = setup(2);
    let calibration = Calibration::default();
    let mut sampling = SamplingLoop::start(sampler, PERIOD).await.unwrap();

    // First tick fires immediately with code 2048.
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.set_code(0, 1024);
    tokio::time::sleep(PERIOD).await;
    sampling.stop().await;

    let recorded = shared.lock().unwrap();
    let readings = &recorded.readings;
    assert_eq!(readings.len(), 2);
    let expected = (calibration.battery_voltage(2048) + calibration.battery_voltage(1024)) / 2.0;
    assert!((readings[1].voltage - expected).abs() < 1e-9);
}

#[tokio::test]
async fn test_open_failure_prevents_start() {
    struct DeadBus;

    impl batmon::core::AdcBus for DeadBus {
        fn name(&self) -> String {
            "dead bus".to_string()
        }

        fn open(&mut self) -> Result<(), BusError> {
            Err(BusError::Disconnected("no such device".into()))
        }

        fn read_channel(&mut self, _channel: u8) -> Result<u16, BusError> {
            unreachable!("never opened")
        }

        fn close(&mut self) -> Result<(), BusError> {
            Ok(())
        }
    }

    let shared = Arc::new(Mutex::new(Recorded::default()));
    let dispatcher = SinkDispatcher::with_sinks([Box::new(Recorder {
        shared: shared.clone(),
    }) as Box<dyn Sink>]);
    let sampler = Sampler::new(DeadBus, Calibration::default(), 1, 1, dispatcher);

    let result = SamplingLoop::start(sampler, PERIOD).await;
    assert!(matches!(result, Err(MonitorError::Bus(BusError::Disconnected(_)))));
    assert_eq!(shared.lock().unwrap().released, 1);
}

//! End-to-end: configuration → registry → sampling loop → CSV file.
#![cfg(feature = "storage_csv")]

use batmon::config::Settings;
use batmon::dispatch::SinkDispatcher;
use batmon::hardware::MockAdc;
use batmon::sampler::{LoopState, Sampler, SamplingLoop};
use batmon::sinks::{SinkKind, SinkRegistry};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_reference_scenario_lands_in_csv() {
    let dir = tempfile::tempdir().unwrap();
    let log_file = dir.path().join("log.csv");

    let mut settings = Settings::from_toml_str(
        r#"
        sinks = ["null", "csv"]

        [sensor]
        sample_interval_ms = 100
        rolling_average_samples = 3
        "#,
    )
    .unwrap();
    settings.csv.log_file = log_file.clone();
    settings.validate().unwrap();

    let sinks = SinkRegistry::new().create_configured(&settings).unwrap();
    let dispatcher = SinkDispatcher::with_sinks(sinks);
    assert_eq!(dispatcher.sink_names(), vec!["null", "csv"]);

    let adc = MockAdc::new(vec![2048, 2048]);
    let sampler = Sampler::from_settings(adc, &settings.sensor, dispatcher);
    let mut sampling = SamplingLoop::start(sampler, settings.sensor.sample_interval())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;
    sampling.stop().await;
    assert_eq!(sampling.state(), LoopState::Stopped);

    let mut reader = csv::Reader::from_path(&log_file).unwrap();
    let rows: Vec<(f64, f64)> = reader
        .records()
        .map(|r| {
            let r = r.unwrap();
            (r[1].parse().unwrap(), r[2].parse().unwrap())
        })
        .collect();

    assert!(!rows.is_empty());
    for (voltage, current) in rows {
        assert!((voltage - 6.9318).abs() < 1e-3, "voltage {voltage}");
        assert!((current - 177.78).abs() < 1e-2, "current {current}");
    }
}

#[test]
fn test_registry_rejects_disabled_kind() {
    let mut registry = SinkRegistry::new();
    registry.register(SinkKind::Null, |_| {
        Err(batmon::error::MonitorError::FeatureNotEnabled("null".into()))
    });
    assert!(registry.create(SinkKind::Null, &Settings::default()).is_err());
}

//! Integration tests for the CSV sink across restarts.
#![cfg(feature = "storage_csv")]

use batmon::core::Sink;
use batmon::measurement_types::PhysicalReading;
use batmon::sinks::CsvSink;
use chrono::{TimeZone, Utc};
use tempfile::tempdir;

fn reading(seconds: i64, voltage: f64) -> PhysicalReading {
    PhysicalReading {
        voltage,
        current: 1.5,
        timestamp: Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap(),
    }
}

#[tokio::test]
async fn test_header_written_once_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.csv");

    let mut first = CsvSink::open(&path).unwrap();
    first.accept(reading(0, 12.0)).await.unwrap();
    first.release().await.unwrap();

    let mut second = CsvSink::open(&path).unwrap();
    second.accept(reading(1, 12.5)).await.unwrap();
    second.release().await.unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Time,Voltage,Current");
    assert_eq!(contents.matches("Time,Voltage,Current").count(), 1);
    assert_eq!(lines[1], "2023-11-14T22:13:20.000000Z,12,1.5");
    assert_eq!(lines[2], "2023-11-14T22:13:21.000000Z,12.5,1.5");
}

#[tokio::test]
async fn test_existing_file_is_appended_without_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.csv");
    std::fs::write(&path, "Time,Voltage,Current\nold,1,2\n").unwrap();

    let mut sink = CsvSink::open(&path).unwrap();
    sink.accept(reading(0, 11.0)).await.unwrap();
    sink.release().await.unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with("Time,Voltage,Current\nold,1,2\n"));
    assert_eq!(contents.lines().count(), 3);
}

#[tokio::test]
async fn test_rows_are_readable_as_csv() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.csv");

    let mut sink = CsvSink::open(&path).unwrap();
    for i in 0..5 {
        sink.accept(reading(i, 12.0 + i as f64)).await.unwrap();
    }
    sink.release().await.unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers, vec!["Time", "Voltage", "Current"]);

    let voltages: Vec<f64> = reader
        .records()
        .map(|r| r.unwrap()[1].parse().unwrap())
        .collect();
    assert_eq!(voltages, vec![12.0, 13.0, 14.0, 15.0, 16.0]);
}

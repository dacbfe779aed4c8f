//! Integration tests for dendro-core.
//!
//! These tests drive the full pipeline:
//! config text → station with a stand-in reader → conversion → log files.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use dendro_core::{
    Acquisition, ChannelReader, Clamp, CsvLogWriter, LogFormat, ReadError, RecordWriter,
    Settings, SimulatedReader, Station, TextLogWriter, writer_for,
};

const FIELD_CONFIG: &str = "\
TREE_IDS=(A B C D)
MICRON_SCALES=(15000 15000 25400 25400)
";

fn june_11(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 11)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn station<R: ChannelReader>(reader: R, config: &str) -> Station<R> {
    let settings = Settings::parse(config, Path::new(".")).unwrap();
    let mut acquisition = Acquisition::from(&settings);
    acquisition.sample_delay = Duration::ZERO;
    Station::new(reader, settings.channels, acquisition)
}

/// Fails the first `k` reads on each listed channel, then returns `volts`.
struct FlakyReader {
    volts: f64,
    failures_left: HashMap<usize, usize>,
}

impl ChannelReader for FlakyReader {
    fn read_voltage(&mut self, channel: usize) -> Result<f64, ReadError> {
        if let Some(left) = self.failures_left.get_mut(&channel) {
            if *left > 0 {
                *left -= 1;
                return Err(std::io::Error::other("arbitration lost").into());
            }
        }
        Ok(self.volts)
    }

    fn describe(&self) -> String {
        "flaky".to_string()
    }
}

#[test]
fn half_scale_end_to_end() {
    let mut station = station(SimulatedReader::constant(1.65), FIELD_CONFIG);
    let cycle = station.acquire_at(june_11(8, 0));

    assert_eq!(cycle.readings.len(), 4);
    for r in &cycle.readings {
        assert_eq!(r.sample_count, 10);
    }
    let microns: Vec<String> = cycle
        .readings
        .iter()
        .map(|r| format!("{:.2}", r.microns.unwrap()))
        .collect();
    assert_eq!(microns, vec!["7500.00", "7500.00", "12700.00", "12700.00"]);
}

#[test]
fn text_log_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let mut station = station(SimulatedReader::constant(1.65), FIELD_CONFIG);
    let writer = TextLogWriter::new(tmp.path());

    writer.write_cycle(&station.acquire_at(june_11(8, 0))).unwrap();
    writer.write_cycle(&station.acquire_at(june_11(8, 15))).unwrap();

    let c = fs::read_to_string(tmp.path().join("C_ch3_2025-06-11.txt")).unwrap();
    assert_eq!(
        c,
        "2025-06-11 08:00:00, 12700.00\n2025-06-11 08:15:00, 12700.00\n"
    );
    let a = fs::read_to_string(tmp.path().join("A_ch1_2025-06-11.txt")).unwrap();
    assert_eq!(a.lines().count(), 2);
}

#[test]
fn csv_log_end_to_end_with_dead_channel() {
    let tmp = tempfile::tempdir().unwrap();
    let reader = FlakyReader {
        volts: 1.65,
        // channel 1 fails every attempt of the first cycle only
        failures_left: HashMap::from([(1, 10)]),
    };
    let mut station = station(reader, FIELD_CONFIG);
    let writer = CsvLogWriter::new(tmp.path(), "dendro_data");

    for minute in [0, 15, 30] {
        writer
            .write_cycle(&station.acquire_at(june_11(9, minute)))
            .unwrap();
    }

    let content = fs::read_to_string(tmp.path().join("dendro_data_2025-06-11.csv")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("Timestamp,Ch1 µm (Tree: A)"));
    assert_eq!(
        lines[1],
        "2025-06-11 09:00:00,7500.00,NaN,12700.00,12700.00"
    );
    assert_eq!(
        lines[2],
        "2025-06-11 09:15:00,7500.00,7500.00,12700.00,12700.00"
    );
    for line in &lines {
        assert_eq!(line.split(',').count(), 5);
    }
}

#[test]
fn partial_failures_keep_successful_samples() {
    let reader = FlakyReader {
        volts: 3.3,
        failures_left: HashMap::from([(0, 4)]),
    };
    let mut station = station(reader, FIELD_CONFIG);
    let cycle = station.acquire_at(june_11(10, 0));

    assert_eq!(cycle.readings[0].sample_count, 6);
    assert_eq!(cycle.readings[0].failures.len(), 4);
    assert!((cycle.readings[0].microns.unwrap() - 15000.0).abs() < 1e-6);
    assert_eq!(cycle.readings[1].sample_count, 10);
}

#[test]
fn fewer_channels_narrow_the_csv() {
    let tmp = tempfile::tempdir().unwrap();
    let mut station = station(
        SimulatedReader::constant(1.0),
        "TREE_IDS=(elm)\nMICRON_SCALES=(3300 3300)",
    );
    let cycle = station.acquire_at(june_11(11, 0));
    writer_for(LogFormat::Csv, tmp.path(), "plot")
        .write_cycle(&cycle)
        .unwrap();

    let content = fs::read_to_string(tmp.path().join("plot_2025-06-11.csv")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "Timestamp,Ch1 µm (Tree: elm),Ch2 µm (Tree: ch2)");
    assert_eq!(lines[1], "2025-06-11 11:00:00,1000.00,1000.00");
}

#[test]
fn clamping_applies_to_both_formats() {
    let tmp = tempfile::tempdir().unwrap();
    let config = "MICRON_SCALES=(15000)\nCLAMP_NEGATIVE=true";
    let mut station = station(SimulatedReader::constant(-0.1), config);
    assert_eq!(station.acquisition().clamp, Clamp::Negative);
    let cycle = station.acquire_at(june_11(12, 0));

    writer_for(LogFormat::Text, tmp.path(), "x")
        .write_cycle(&cycle)
        .unwrap();
    writer_for(LogFormat::Csv, tmp.path(), "x")
        .write_cycle(&cycle)
        .unwrap();

    let text = fs::read_to_string(tmp.path().join("ch1_ch1_2025-06-11.txt")).unwrap();
    assert_eq!(text, "2025-06-11 12:00:00, 0.00\n");
    let csv = fs::read_to_string(tmp.path().join("x_2025-06-11.csv")).unwrap();
    assert!(csv.lines().nth(1).unwrap().ends_with(",0.00"));
}

#[test]
fn negative_readings_kept_without_clamp() {
    let mut station = station(SimulatedReader::constant(-0.1), "MICRON_SCALES=(15000)");
    let cycle = station.acquire_at(june_11(12, 0));
    assert!(cycle.readings[0].microns.unwrap() < 0.0);
}

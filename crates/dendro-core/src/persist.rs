//! Append-only persistence of acquisition cycles.
//!
//! Two interchangeable layouts, both behind [`RecordWriter`]:
//! - [`TextLogWriter`] — one file per tree, channel and day:
//!   `{tree}_ch{n}_{date}.txt`, one `"{timestamp}, {microns}"` line per cycle.
//! - [`CsvLogWriter`] — one file per day: `{folder}_{date}.csv`, one row per
//!   cycle with a column per channel, header written on first use.
//!
//! Each call opens its files in append mode, writes, and drops the handle.
//! Existing content is never rewritten. A channel without valid samples is
//! recorded as `NaN` in both layouts.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::pipeline::Cycle;

/// Text used for a channel with no valid samples.
pub const MISSING_VALUE: &str = "NaN";

/// Output layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Per-tree text files.
    #[default]
    Text,
    /// Wide CSV, one row per cycle.
    Csv,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" | "txt" => Ok(Self::Text),
            "csv" => Ok(Self::Csv),
            other => Err(format!("unknown log format '{other}' (expected text or csv)")),
        }
    }
}

/// Persists one cycle.
pub trait RecordWriter {
    /// Append `cycle`, returning the files touched.
    fn write_cycle(&self, cycle: &Cycle) -> Result<Vec<PathBuf>>;
}

/// Build the writer for `format`.
pub fn writer_for(format: LogFormat, data_dir: &Path, folder: &str) -> Box<dyn RecordWriter> {
    match format {
        LogFormat::Text => Box::new(TextLogWriter::new(data_dir)),
        LogFormat::Csv => Box::new(CsvLogWriter::new(data_dir, folder)),
    }
}

/// Format a displacement for a record: two decimals, or [`MISSING_VALUE`].
pub fn format_microns(microns: Option<f64>) -> String {
    match microns {
        Some(m) => format!("{m:.2}"),
        None => MISSING_VALUE.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Per-tree text files
// ---------------------------------------------------------------------------

/// One text file per (tree, channel, day).
#[derive(Debug, Clone)]
pub struct TextLogWriter {
    data_dir: PathBuf,
}

impl TextLogWriter {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// `{data_dir}/{tree}_ch{n}_{date}.txt`
    pub fn path_for(&self, tree_id: &str, hardware_channel: usize, date: &str) -> PathBuf {
        self.data_dir
            .join(format!("{tree_id}_ch{hardware_channel}_{date}.txt"))
    }
}

impl RecordWriter for TextLogWriter {
    fn write_cycle(&self, cycle: &Cycle) -> Result<Vec<PathBuf>> {
        ensure_dir(&self.data_dir)?;
        let timestamp = cycle.timestamp_string();
        let date = cycle.date_string();

        let mut written = Vec::with_capacity(cycle.readings.len());
        for (ch, reading) in cycle.entries() {
            let path = self.path_for(&ch.tree_id, ch.hardware_channel(), &date);
            let line = format!("{timestamp}, {}\n", format_microns(reading.microns));
            let mut file = open_append(&path)?;
            file.write_all(line.as_bytes())
                .map_err(|source| Error::Persist {
                    path: path.clone(),
                    source,
                })?;
            log::info!("appended Ch{} to {}", ch.hardware_channel(), path.display());
            written.push(path);
        }
        Ok(written)
    }
}

// ---------------------------------------------------------------------------
// Wide CSV
// ---------------------------------------------------------------------------

/// One CSV per day, a column per channel.
#[derive(Debug, Clone)]
pub struct CsvLogWriter {
    data_dir: PathBuf,
    folder: String,
}

impl CsvLogWriter {
    pub fn new(data_dir: impl Into<PathBuf>, folder: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            folder: folder.into(),
        }
    }

    /// `{data_dir}/{folder}_{date}.csv`
    pub fn path_for(&self, date: &str) -> PathBuf {
        self.data_dir.join(format!("{}_{date}.csv", self.folder))
    }
}

/// Header row naming each column by channel and tree.
pub fn csv_header(cycle: &Cycle) -> Vec<String> {
    std::iter::once("Timestamp".to_string())
        .chain(cycle.channels.iter().map(|ch| {
            format!("Ch{} µm (Tree: {})", ch.hardware_channel(), ch.tree_id)
        }))
        .collect()
}

/// Data row: timestamp then one value per channel.
pub fn csv_row(cycle: &Cycle) -> Vec<String> {
    std::iter::once(cycle.timestamp_string())
        .chain(cycle.readings.iter().map(|r| format_microns(r.microns)))
        .collect()
}

impl RecordWriter for CsvLogWriter {
    fn write_cycle(&self, cycle: &Cycle) -> Result<Vec<PathBuf>> {
        ensure_dir(&self.data_dir)?;
        let path = self.path_for(&cycle.date_string());
        let file = open_append(&path)?;

        // A zero-length file counts as new, so an interrupted first write
        // still gets its header.
        let needs_header = file
            .metadata()
            .map_err(|source| Error::Persist {
                path: path.clone(),
                source,
            })?
            .len()
            == 0;

        let csv_err = |source| Error::Csv {
            path: path.clone(),
            source,
        };
        let mut writer = csv::Writer::from_writer(file);
        if needs_header {
            writer.write_record(csv_header(cycle)).map_err(csv_err)?;
        }
        writer.write_record(csv_row(cycle)).map_err(csv_err)?;
        writer.flush().map_err(|source| Error::Persist {
            path: path.clone(),
            source,
        })?;

        log::info!("appended row to {}", path.display());
        Ok(vec![path])
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| Error::Persist {
        path: dir.to_path_buf(),
        source,
    })
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| Error::Persist {
            path: path.to_path_buf(),
            source,
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelConfig;
    use crate::sampling::ChannelReading;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 11)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn reading(channel: usize, microns: Option<f64>) -> ChannelReading {
        ChannelReading {
            channel,
            average_voltage: microns.map(|_| 1.0),
            sample_count: if microns.is_some() { 10 } else { 0 },
            microns,
            failures: Vec::new(),
        }
    }

    fn cycle(timestamp: NaiveDateTime, values: &[Option<f64>]) -> Cycle {
        let ids = ["A", "B", "C", "D"];
        Cycle {
            timestamp,
            channels: values
                .iter()
                .enumerate()
                .map(|(i, _)| ChannelConfig {
                    index: i,
                    tree_id: ids[i].to_string(),
                    micron_scale: 15000,
                })
                .collect(),
            readings: values
                .iter()
                .enumerate()
                .map(|(i, &v)| reading(i, v))
                .collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Formatting
    // -----------------------------------------------------------------------

    #[test]
    fn test_format_microns() {
        assert_eq!(format_microns(Some(7500.0)), "7500.00");
        assert_eq!(format_microns(Some(-3.456)), "-3.46");
        assert_eq!(format_microns(None), "NaN");
    }

    #[test]
    fn test_parse_log_format() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("csv".parse::<LogFormat>().unwrap(), LogFormat::Csv);
        assert!("json".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_csv_header_names_trees() {
        let c = cycle(at(8, 0, 0), &[Some(1.0), Some(2.0)]);
        assert_eq!(
            csv_header(&c),
            vec!["Timestamp", "Ch1 µm (Tree: A)", "Ch2 µm (Tree: B)"]
        );
    }

    // -----------------------------------------------------------------------
    // Text writer
    // -----------------------------------------------------------------------

    #[test]
    fn test_text_writer_creates_dir_and_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("data");
        let w = TextLogWriter::new(&dir);
        let paths = w
            .write_cycle(&cycle(at(8, 0, 0), &[Some(7500.0), Some(12700.0)]))
            .unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0], dir.join("A_ch1_2025-06-11.txt"));
        assert_eq!(
            fs::read_to_string(&paths[1]).unwrap(),
            "2025-06-11 08:00:00, 12700.00\n"
        );
    }

    #[test]
    fn test_text_writer_appends_across_invocations() {
        let tmp = tempfile::tempdir().unwrap();
        TextLogWriter::new(tmp.path())
            .write_cycle(&cycle(at(8, 0, 0), &[Some(1.0)]))
            .unwrap();
        TextLogWriter::new(tmp.path())
            .write_cycle(&cycle(at(8, 15, 0), &[Some(2.0)]))
            .unwrap();
        let content = fs::read_to_string(tmp.path().join("A_ch1_2025-06-11.txt")).unwrap();
        assert_eq!(
            content,
            "2025-06-11 08:00:00, 1.00\n2025-06-11 08:15:00, 2.00\n"
        );
    }

    #[test]
    fn test_text_writer_records_missing_channel() {
        let tmp = tempfile::tempdir().unwrap();
        TextLogWriter::new(tmp.path())
            .write_cycle(&cycle(at(9, 0, 0), &[Some(1.0), None]))
            .unwrap();
        let content = fs::read_to_string(tmp.path().join("B_ch2_2025-06-11.txt")).unwrap();
        assert_eq!(content, "2025-06-11 09:00:00, NaN\n");
    }

    #[test]
    fn test_text_writer_unwritable_dir_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("data");
        fs::write(&blocker, "not a directory").unwrap();
        let err = TextLogWriter::new(&blocker)
            .write_cycle(&cycle(at(9, 0, 0), &[Some(1.0)]))
            .unwrap_err();
        assert!(matches!(err, Error::Persist { .. }));
        // the blocking file is untouched
        assert_eq!(fs::read_to_string(&blocker).unwrap(), "not a directory");
    }

    // -----------------------------------------------------------------------
    // CSV writer
    // -----------------------------------------------------------------------

    #[test]
    fn test_csv_writer_one_header_three_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let w = CsvLogWriter::new(tmp.path(), "plot7");
        for minute in 0..3 {
            w.write_cycle(&cycle(
                at(10, minute, 0),
                &[Some(1.0), None, Some(3.0), Some(4.0)],
            ))
            .unwrap();
        }
        let content = fs::read_to_string(tmp.path().join("plot7_2025-06-11.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            "Timestamp,Ch1 µm (Tree: A),Ch2 µm (Tree: B),Ch3 µm (Tree: C),Ch4 µm (Tree: D)"
        );
        for line in &lines[1..] {
            assert_eq!(line.split(',').count(), 5);
        }
        assert_eq!(lines[1], "2025-06-11 10:00:00,1.00,NaN,3.00,4.00");
        assert!(lines.iter().skip(1).all(|l| !l.starts_with("Timestamp")));
    }

    #[test]
    fn test_csv_writer_header_for_empty_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let w = CsvLogWriter::new(tmp.path(), "plot7");
        fs::write(w.path_for("2025-06-11"), "").unwrap();
        w.write_cycle(&cycle(at(10, 0, 0), &[Some(1.0)])).unwrap();
        let content = fs::read_to_string(w.path_for("2025-06-11")).unwrap();
        assert!(content.starts_with("Timestamp,"));
    }

    #[test]
    fn test_csv_writer_preserves_existing_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let w = CsvLogWriter::new(tmp.path(), "plot7");
        let path = w.path_for("2025-06-11");
        fs::write(&path, "Timestamp,Ch1 µm (Tree: A)\n2025-06-11 07:00:00,0.50\n").unwrap();
        w.write_cycle(&cycle(at(10, 0, 0), &[Some(1.0)])).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content.lines().collect::<Vec<_>>(),
            vec![
                "Timestamp,Ch1 µm (Tree: A)",
                "2025-06-11 07:00:00,0.50",
                "2025-06-11 10:00:00,1.00",
            ]
        );
    }

    #[test]
    fn test_csv_new_file_per_day() {
        let tmp = tempfile::tempdir().unwrap();
        let w = CsvLogWriter::new(tmp.path(), "dendro_data");
        w.write_cycle(&cycle(at(23, 59, 59), &[Some(1.0)])).unwrap();
        let next = NaiveDate::from_ymd_opt(2025, 6, 12)
            .unwrap()
            .and_hms_opt(0, 0, 1)
            .unwrap();
        let paths = w.write_cycle(&cycle(next, &[Some(1.0)])).unwrap();
        assert_eq!(paths[0], tmp.path().join("dendro_data_2025-06-12.csv"));
        assert_eq!(fs::read_to_string(&paths[0]).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_writer_for_selects_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let c = cycle(at(12, 0, 0), &[Some(1.0), Some(2.0)]);
        let text = writer_for(LogFormat::Text, tmp.path(), "x").write_cycle(&c).unwrap();
        let csv = writer_for(LogFormat::Csv, tmp.path(), "x").write_cycle(&c).unwrap();
        assert_eq!(text.len(), 2);
        assert_eq!(csv, vec![tmp.path().join("x_2025-06-11.csv")]);
    }
}

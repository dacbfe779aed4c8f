//! Station configuration: channel calibration plus runtime settings.
//!
//! The configuration source is a shell-style `KEY=VALUE` file, the same one
//! the field deployment scripts source:
//!
//! ```text
//! # dendro_config.env
//! TREE_IDS=(A B C D)
//! MICRON_SCALES=(15000 15000 25400 25400)
//! DROPBOX_FOLDER=plot7
//! ```
//!
//! Everything is validated once, up front, into [`Settings`]. A bad
//! calibration entry is fatal here rather than per cycle.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::convert::{Clamp, DEFAULT_REFERENCE_VOLTAGE};
use crate::error::{Error, Result};

/// Number of single-ended inputs on the converter.
pub const MAX_CHANNELS: usize = 4;

pub const DEFAULT_FOLDER: &str = "dendro_data";
pub const DEFAULT_SAMPLES: usize = 10;
/// Upper bound on samples per channel.
pub const MAX_SAMPLES: usize = 10_000;
pub const DEFAULT_SAMPLE_DELAY: Duration = Duration::from_millis(10);
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_I2C_BUS: &str = "/dev/i2c-1";
pub const DEFAULT_ADC_ADDRESS: u16 = 0x48;

/// Calibration and labelling for one converter input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelConfig {
    /// Software index, 0-based.
    pub index: usize,
    /// Tree label used in file names and headers.
    pub tree_id: String,
    /// Displacement in microns at full-scale voltage.
    pub micron_scale: u32,
}

impl ChannelConfig {
    /// 1-based hardware channel number printed on the board.
    pub fn hardware_channel(&self) -> usize {
        self.index + 1
    }

    /// Tree label used when none is configured for `index`.
    pub fn fallback_tree_id(index: usize) -> String {
        format!("ch{}", index + 1)
    }
}

/// Validated station settings.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub channels: Vec<ChannelConfig>,
    /// CSV file stem (`DROPBOX_FOLDER`).
    pub folder: String,
    pub data_dir: PathBuf,
    pub samples: usize,
    pub sample_delay: Duration,
    pub refresh_interval: Duration,
    pub reference_voltage: f64,
    pub clamp: Clamp,
    pub i2c_bus: PathBuf,
    pub adc_address: u16,
}

impl Settings {
    /// Load settings from a config file. Relative paths inside it resolve
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        log::debug!("loaded config from {}", path.display());
        Self::parse(&text, base_dir)
    }

    /// Parse settings from config text.
    pub fn parse(text: &str, base_dir: &Path) -> Result<Self> {
        let entries = parse_entries(text);
        for key in entries.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                log::debug!("ignoring unknown config key {key}");
            }
        }
        let get = |key: &str| entries.get(key).map(String::as_str);

        let channels = resolve_channels(get("TREE_IDS"), get("MICRON_SCALES"))?;

        let folder = match get("DROPBOX_FOLDER") {
            Some(v) => {
                let v = strip_wrapping(v);
                if !is_file_stem(v) {
                    return Err(Error::config(
                        "DROPBOX_FOLDER",
                        format!("'{v}' is not a usable file stem"),
                    ));
                }
                v.to_string()
            }
            None => DEFAULT_FOLDER.to_string(),
        };

        let data_dir = match get("DATA_DIR") {
            Some(v) => base_dir.join(strip_wrapping(v)),
            None => base_dir.join("data"),
        };

        let samples = match get("SAMPLES") {
            Some(v) => match strip_wrapping(v).parse::<usize>() {
                Ok(n) if (1..=MAX_SAMPLES).contains(&n) => n,
                _ => {
                    return Err(Error::config(
                        "SAMPLES",
                        format!("'{v}' is not an integer between 1 and {MAX_SAMPLES}"),
                    ));
                }
            },
            None => DEFAULT_SAMPLES,
        };

        let sample_delay = match get("SAMPLE_DELAY") {
            Some(v) => parse_seconds("SAMPLE_DELAY", v)?,
            None => DEFAULT_SAMPLE_DELAY,
        };

        let refresh_interval = match get("REFRESH_INTERVAL") {
            Some(v) => parse_seconds("REFRESH_INTERVAL", v)?,
            None => DEFAULT_REFRESH_INTERVAL,
        };

        let reference_voltage = match get("REFERENCE_VOLTAGE") {
            Some(v) => match strip_wrapping(v).parse::<f64>() {
                Ok(x) if x.is_finite() && x > 0.0 => x,
                _ => {
                    return Err(Error::config(
                        "REFERENCE_VOLTAGE",
                        format!("'{v}' is not a positive voltage"),
                    ));
                }
            },
            None => DEFAULT_REFERENCE_VOLTAGE,
        };

        let clamp = match get("CLAMP_NEGATIVE") {
            Some(v) => {
                if parse_bool("CLAMP_NEGATIVE", v)? {
                    Clamp::Negative
                } else {
                    Clamp::None
                }
            }
            None => Clamp::None,
        };

        let i2c_bus = match get("I2C_BUS") {
            Some(v) => PathBuf::from(strip_wrapping(v)),
            None => PathBuf::from(DEFAULT_I2C_BUS),
        };

        let adc_address = match get("ADC_ADDRESS") {
            Some(v) => parse_address(v)?,
            None => DEFAULT_ADC_ADDRESS,
        };

        Ok(Self {
            channels,
            folder,
            data_dir,
            samples,
            sample_delay,
            refresh_interval,
            reference_voltage,
            clamp,
            i2c_bus,
            adc_address,
        })
    }
}

const KNOWN_KEYS: &[&str] = &[
    "TREE_IDS",
    "MICRON_SCALES",
    "DROPBOX_FOLDER",
    "DATA_DIR",
    "SAMPLES",
    "SAMPLE_DELAY",
    "REFRESH_INTERVAL",
    "REFERENCE_VOLTAGE",
    "CLAMP_NEGATIVE",
    "I2C_BUS",
    "ADC_ADDRESS",
];

/// Build the channel table from the raw `TREE_IDS` and `MICRON_SCALES`
/// values. The scale list decides how many channels exist; missing tree
/// labels fall back to `ch{n}`.
pub fn resolve_channels(tree_ids: Option<&str>, scales: Option<&str>) -> Result<Vec<ChannelConfig>> {
    let scales = match scales {
        Some(v) => split_list(v),
        None => return Err(Error::config("MICRON_SCALES", "key is missing")),
    };
    if scales.is_empty() {
        return Err(Error::config("MICRON_SCALES", "no entries"));
    }
    if scales.len() > MAX_CHANNELS {
        return Err(Error::config(
            "MICRON_SCALES",
            format!("{} entries, the converter has {MAX_CHANNELS} channels", scales.len()),
        ));
    }

    let tree_ids = tree_ids.map(split_list).unwrap_or_default();
    if tree_ids.len() > scales.len() {
        log::warn!(
            "TREE_IDS has {} entries but only {} channels are calibrated; extra labels ignored",
            tree_ids.len(),
            scales.len()
        );
    }

    scales
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            let micron_scale = match raw.parse::<u32>() {
                Ok(s) if s > 0 => s,
                _ => {
                    return Err(Error::config(
                        "MICRON_SCALES",
                        format!(
                            "entry for Ch{} is '{raw}', expected a positive integer",
                            index + 1
                        ),
                    ));
                }
            };
            let tree_id = match tree_ids.get(index) {
                Some(id) if !is_file_stem(id) => {
                    return Err(Error::config(
                        "TREE_IDS",
                        format!("label for Ch{} is '{id}', not a usable file stem", index + 1),
                    ));
                }
                Some(id) => id.clone(),
                None => ChannelConfig::fallback_tree_id(index),
            };
            Ok(ChannelConfig {
                index,
                tree_id,
                micron_scale,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Split `KEY=VALUE` lines. Later keys win, matching shell `source`.
fn parse_entries(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// Strip surrounding quotes and parentheses: `"(A B)"` -> `A B`.
fn strip_wrapping(value: &str) -> &str {
    value
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim_start_matches('(')
        .trim_end_matches(')')
        .trim()
}

fn split_list(value: &str) -> Vec<String> {
    strip_wrapping(value)
        .split_whitespace()
        .map(|s| s.trim_matches(|c| c == '"' || c == '\'').to_string())
        .collect()
}

/// Labels end up in file names, so they must stay inside the data directory.
fn is_file_stem(value: &str) -> bool {
    !value.is_empty() && !value.contains('/') && !value.contains('\\') && !value.contains("..")
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration> {
    let v = strip_wrapping(value);
    match v.parse::<f64>() {
        Ok(secs) => seconds(key, secs),
        Err(_) => Err(Error::config(key, format!("'{v}' is not a duration in seconds"))),
    }
}

/// Convert seconds to a [`Duration`], rejecting negative, non-finite and
/// out-of-range values.
pub fn seconds(key: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| Error::config(key, format!("'{secs}' is not a duration in seconds")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    let v = strip_wrapping(value);
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config(key, format!("'{v}' is not a boolean"))),
    }
}

fn parse_address(value: &str) -> Result<u16> {
    let v = strip_wrapping(value);
    let parsed = match v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => v.parse::<u16>().ok(),
    };
    match parsed {
        Some(addr) if (0x08..=0x77).contains(&addr) => Ok(addr),
        _ => Err(Error::config(
            "ADC_ADDRESS",
            format!("'{v}' is not a 7-bit I2C address"),
        )),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

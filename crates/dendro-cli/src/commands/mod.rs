pub mod channels;
pub mod log;
pub mod monitor;

use std::path::{Path, PathBuf};
use std::time::Duration;

use dendro_core::{Ads1115, ChannelReader, Settings, SimulatedReader};

/// Config location used by the field install scripts.
const DEFAULT_CONFIG_RELATIVE: &str = "dendro-pi-main/dendro-logger/dendro_config.env";

/// `~/dendro-pi-main/dendro-logger/dendro_config.env`, or the relative path
/// if `$HOME` is unset.
pub fn default_config_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(DEFAULT_CONFIG_RELATIVE),
        None => PathBuf::from(DEFAULT_CONFIG_RELATIVE),
    }
}

/// Where voltage samples come from for this run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReaderSource {
    Adc,
    Simulated(f64),
}

impl ReaderSource {
    pub fn from_simulate(volts: Option<f64>) -> Self {
        volts.map_or(Self::Adc, Self::Simulated)
    }
}

/// Load and validate settings, exiting on any configuration error.
pub fn load_settings(path: &Path) -> Settings {
    match Settings::load(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Open the configured reader, exiting if the ADC cannot be opened.
pub fn open_reader(settings: &Settings, source: ReaderSource) -> Box<dyn ChannelReader> {
    match source {
        ReaderSource::Simulated(volts) => Box::new(SimulatedReader::constant(volts)),
        ReaderSource::Adc => match Ads1115::open(&settings.i2c_bus, settings.adc_address) {
            Ok(adc) => Box::new(adc),
            Err(e) => {
                eprintln!("Error: {e}");
                eprintln!("Hint: use --simulate <volts> to run without hardware.");
                std::process::exit(1);
            }
        },
    }
}

/// Apply per-run `--samples` / `--delay` overrides.
pub fn apply_sampling_overrides(settings: &mut Settings, samples: Option<u32>, delay: Option<f64>) {
    if let Some(n) = samples {
        settings.samples = n as usize;
    }
    if let Some(secs) = delay {
        settings.sample_delay = parse_seconds("--delay", secs);
    }
}

/// Seconds from the command line, exiting on anything that is not a
/// representable non-negative duration.
pub fn parse_seconds(flag: &str, secs: f64) -> Duration {
    match dendro_core::config::seconds(flag, secs) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

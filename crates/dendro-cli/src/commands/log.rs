//! `dendrologger log` — one acquisition cycle, appended to disk.

use std::path::Path;

use dendro_core::persist::{LogFormat, writer_for};
use dendro_core::{Acquisition, Clamp, Station};

use super::{ReaderSource, apply_sampling_overrides, load_settings, open_reader};

pub struct LogCommandConfig<'a> {
    pub config_path: &'a Path,
    pub source: ReaderSource,
    pub format: LogFormat,
    pub samples: Option<u32>,
    pub delay: Option<f64>,
    pub data_dir: Option<&'a Path>,
    pub clamp: bool,
    pub json: bool,
}

/// Run the log command.
pub fn run(cfg: LogCommandConfig<'_>) {
    let mut settings = load_settings(cfg.config_path);
    apply_sampling_overrides(&mut settings, cfg.samples, cfg.delay);
    if let Some(dir) = cfg.data_dir {
        settings.data_dir = dir.to_path_buf();
    }
    if cfg.clamp {
        settings.clamp = Clamp::Negative;
    }

    let reader = open_reader(&settings, cfg.source);
    let mut station = Station::new(reader, settings.channels.clone(), Acquisition::from(&settings));
    let cycle = station.acquire();

    for line in cycle.status_lines() {
        println!("{line}");
    }

    if cfg.json {
        match serde_json::to_string_pretty(&cycle) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Warning: could not encode cycle as JSON: {e}"),
        }
    }

    let writer = writer_for(cfg.format, &settings.data_dir, &settings.folder);
    match writer.write_cycle(&cycle) {
        Ok(paths) => {
            for path in paths {
                println!("  → {}", path.display());
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Reading taken at {} was not saved.", cycle.timestamp_string());
            std::process::exit(1);
        }
    }

    let missing = cycle.readings.len() - cycle.valid_count();
    if missing > 0 {
        eprintln!("Warning: {missing} channel(s) recorded as NaN (no valid samples)");
    }
}

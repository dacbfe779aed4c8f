//! # dendro-core
//!
//! Unattended dendrometer logging: sample four analog displacement sensors
//! through an ADS1115, convert the averaged voltage to microns, and append
//! timestamped records to disk.
//!
//! ## Quick Start
//!
//! ```no_run
//! use dendro_core::{Acquisition, Settings, SimulatedReader, Station, TextLogWriter, RecordWriter};
//!
//! let settings = Settings::parse("MICRON_SCALES=(15000 15000 25400 25400)", "/tmp".as_ref())?;
//! let mut station = Station::new(
//!     SimulatedReader::constant(1.65),
//!     settings.channels.clone(),
//!     Acquisition::from(&settings),
//! );
//! let cycle = station.acquire();
//! TextLogWriter::new(&settings.data_dir).write_cycle(&cycle)?;
//! # Ok::<(), dendro_core::Error>(())
//! ```
//!
//! ## Architecture
//!
//! Settings → Station (reader → sampling → conversion) → Cycle → RecordWriter
//!
//! A failed sample never aborts a channel, and a dead channel never aborts
//! a cycle: it is carried through as `None` and written as `NaN`.

pub mod config;
pub mod convert;
pub mod device;
pub mod error;
pub mod persist;
pub mod pipeline;
pub mod sampling;

pub use config::{ChannelConfig, MAX_CHANNELS, Settings, resolve_channels};
pub use convert::{Clamp, DEFAULT_REFERENCE_VOLTAGE, convert_reading, to_microns};
pub use device::{Ads1115, ChannelReader, SimulatedReader};
pub use error::{Error, ReadError, Result};
pub use persist::{CsvLogWriter, LogFormat, RecordWriter, TextLogWriter, writer_for};
pub use pipeline::{Acquisition, Cycle, Station, status_line};
pub use sampling::{ChannelReading, sample_channel};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
